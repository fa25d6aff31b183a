//! Device picker rendered into the log
//! 将设备选择列表输出到日志

use tokio::sync::watch;
use tracing::info;

use ns_core::device::DeviceIdentity;
use ns_core::ports::PresentationPort;
use ns_core::scan::ListStatus;
use ns_core::settings::DisplayStrings;

/// Headless [`PresentationPort`]: logs every list change and publishes the
/// latest state so a scripted caller can inspect it, or wait for it to change,
/// before selecting.
#[derive(Debug)]
pub struct LogPresentation {
    state: watch::Sender<PickerState>,
}

impl Default for LogPresentation {
    fn default() -> Self {
        let (state, _) = watch::channel(PickerState::default());
        Self { state }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PickerState {
    pub title: String,
    pub labels: Vec<String>,
    pub open: bool,
}

impl LogPresentation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> PickerState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every list, title or visibility change.
    pub fn subscribe(&self) -> watch::Receiver<PickerState> {
        self.state.subscribe()
    }
}

impl PresentationPort for LogPresentation {
    fn list_updated(&self, devices: &[DeviceIdentity]) {
        let labels: Vec<String> = devices.iter().map(DeviceIdentity::label).collect();
        for (index, label) in labels.iter().enumerate() {
            info!(index, device = %label, "Device list entry");
        }
        self.state.send_modify(|state| {
            state.labels = labels;
            state.open = true;
        });
    }

    fn status_changed(&self, status: ListStatus, strings: &DisplayStrings) {
        let title = status.title(strings).to_string();
        info!(status = ?status, title = %title, "Device list title changed");
        self.state.send_modify(|state| {
            state.title = title;
            state.open = true;
        });
    }

    fn dismissed(&self) {
        info!("Device list dismissed");
        self.state.send_modify(|state| state.open = false);
    }
}
