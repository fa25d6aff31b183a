pub mod config;
pub mod run;
pub mod tracing;
pub mod wiring;

pub use config::{load_config, resolve_config};
pub use run::{run_pick, run_stream, PickAction, PickOptions, StreamOptions};
pub use wiring::{wire_dependencies, AppRuntime};
