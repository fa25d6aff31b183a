use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::device::RawSighting;
use crate::scan::ScanCriteria;

/// Events pushed by a scan source while it runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanSourceEvent {
    Sighting(RawSighting),
    /// The source stopped on its own (e.g. a classic inquiry cycle ended)
    Finished,
    /// Asynchronous failure; reported at most once, the source is dead after it
    Failed(String),
}

/// Producer side handed to the source. Sending never blocks, so it is safe to
/// call from platform callback threads.
pub type ScanEventSender = mpsc::UnboundedSender<ScanSourceEvent>;
pub type ScanEventReceiver = mpsc::UnboundedReceiver<ScanSourceEvent>;

pub fn scan_event_channel() -> (ScanEventSender, ScanEventReceiver) {
    mpsc::unbounded_channel()
}

#[derive(Debug, Error)]
pub enum ScanSourceError {
    #[error("scan adapter unavailable: {0}")]
    Unavailable(String),

    #[error("scan source already running")]
    Busy,

    #[error("scan source error: {0}")]
    Other(String),
}

/// Radio-side scanner.
#[async_trait]
pub trait ScanSourcePort: Send + Sync {
    /// Begin emitting events into `events` until [`stop_scanning`] is called.
    ///
    /// [`stop_scanning`]: ScanSourcePort::stop_scanning
    async fn start_scanning(
        &self,
        criteria: ScanCriteria,
        events: ScanEventSender,
    ) -> Result<(), ScanSourceError>;

    /// Request the source to halt. Must not wait for the radio to confirm.
    async fn stop_scanning(&self) -> Result<(), ScanSourceError>;
}
