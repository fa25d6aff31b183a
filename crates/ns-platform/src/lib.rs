//! # ns-platform
//!
//! Platform-side implementations of the `ns-core` ports.
//!
//! Radio backends plug in here behind [`ns_core::ports::ScanSourcePort`];
//! the replay source stands in for a radio when driving the CLI or tests.

pub mod adapters;

pub use adapters::{LogPresentation, ReplayScanSource, ReplayScript, ReplayStep};
