//! Port interfaces for the application layer
//!
//! Ports define the contract between the discovery logic and the platform:
//! the radio side ([`ScanSourcePort`]) and the picker UI
//! ([`PresentationPort`]). Both are implemented outside this crate.

pub mod presentation;
pub mod scan_source;

pub use presentation::{NoopPresentation, PresentationPort};
pub use scan_source::{
    scan_event_channel, ScanEventReceiver, ScanEventSender, ScanSourceError, ScanSourceEvent,
    ScanSourcePort,
};
