use crate::device::DeviceIdentity;
use crate::scan::ListStatus;
use crate::settings::DisplayStrings;

/// Device picker UI.
///
/// Calls arrive with owned snapshots and must return quickly; implementations
/// hand them to their own UI thread. User actions travel the other way,
/// through the orchestrator's `select` / `cancel`.
pub trait PresentationPort: Send + Sync {
    /// The ordered list changed. Position `i` is what `select(i)` resolves to.
    fn list_updated(&self, devices: &[DeviceIdentity]);

    fn status_changed(&self, status: ListStatus, strings: &DisplayStrings);

    /// The pick is over; close the list.
    fn dismissed(&self);
}

/// Used when single-pick runs headless (tests, scripted selection).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPresentation;

impl PresentationPort for NoopPresentation {
    fn list_updated(&self, _devices: &[DeviceIdentity]) {}

    fn status_changed(&self, _status: ListStatus, _strings: &DisplayStrings) {}

    fn dismissed(&self) {}
}
