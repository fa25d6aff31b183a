//! # Platform Adapters / 平台适配器
//!
//! - `replay_source` - Scan source that replays a recorded JSON script
//! - `log_presentation` - Device picker rendered into the tracing log

pub mod log_presentation;
pub mod replay_source;

pub use log_presentation::{LogPresentation, PickerState};
pub use replay_source::{ReplayScanSource, ReplayScript, ReplayStep};
