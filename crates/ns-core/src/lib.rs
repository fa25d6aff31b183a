//! # ns-core
//!
//! Core domain models and discovery state machines for nearscan.
//!
//! This crate contains pure business logic without any infrastructure dependencies.
//! Radio access and UI rendering live behind the traits in [`ports`].

// Public module exports
pub mod config;
pub mod device;
pub mod ids;
pub mod ports;
pub mod scan;
pub mod settings;

// Re-export commonly used types at the crate root
pub use config::AppConfig;
pub use device::{DeviceAddress, DeviceIdentity, DeviceRegistry, Sighting, SightingMetadata};
pub use ids::ScanSessionId;
pub use scan::{
    ResultMode, ScanAction, ScanConfig, ScanEvent, ScanFailure, ScanOutcome, ScanSession,
    ScanState, SelectionController, SelectionError, SelectionOutcome, StartOutcome,
};
