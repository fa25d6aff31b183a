//! nearscan application orchestration layer
//!
//! This crate drives the discovery state machines from `ns-core` against
//! real ports: it owns the active session, the deadline timer and the
//! channels that carry sightings and results to callers.

pub mod usecases;

pub use usecases::scan::{
    RequestDevice, RequestDeviceError, ScanHandle, ScanOrchestrator, StartScan,
};
