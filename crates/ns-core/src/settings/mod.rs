pub mod defaults;
pub mod model;

pub use model::{DiscoverySettings, DisplayStrings, LoggingSettings};
