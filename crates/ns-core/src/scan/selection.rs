//! Pick-exactly-one interaction used by single-pick sessions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::outcome::{SelectionOutcome, USER_CANCELLED_REASON};
use crate::device::{DeviceIdentity, DeviceRegistry, RegistryError};
use crate::settings::DisplayStrings;

/// Errors returned to the presentation layer. None of them end the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("index {index} out of range ({count} devices listed)")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("no selection is pending")]
    NoPendingSelection,
}

impl From<RegistryError> for SelectionError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::IndexOutOfRange { index, count } => {
                SelectionError::IndexOutOfRange { index, count }
            }
        }
    }
}

/// Title state of the device list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListStatus {
    Scanning,
    AvailableDevices,
    NoDeviceFound,
}

impl ListStatus {
    /// Status once scanning is over for a registry of `count` devices.
    pub fn after_scan(count: usize) -> Self {
        if count == 0 {
            ListStatus::NoDeviceFound
        } else {
            ListStatus::AvailableDevices
        }
    }

    pub fn title<'a>(&self, strings: &'a DisplayStrings) -> &'a str {
        match self {
            ListStatus::Scanning => &strings.scanning,
            ListStatus::AvailableDevices => &strings.available_devices,
            ListStatus::NoDeviceFound => &strings.no_device_found,
        }
    }
}

/// Keeps the ordered, user-visible list and decides which terminal event
/// wins. After the first resolution every later call is ignored.
#[derive(Debug, Clone, Default)]
pub struct SelectionController {
    entries: Vec<DeviceIdentity>,
    resolved: bool,
}

impl SelectionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[DeviceIdentity] {
        &self.entries
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Returns the refreshed list when a new device should be shown.
    ///
    /// Each distinct device is listed once regardless of the dedup flag.
    pub fn on_sighting(
        &mut self,
        is_new: bool,
        device: &DeviceIdentity,
    ) -> Option<Vec<DeviceIdentity>> {
        if self.resolved || !is_new {
            return None;
        }
        self.entries.push(device.clone());
        Some(self.entries.clone())
    }

    pub fn select(
        &mut self,
        registry: &DeviceRegistry,
        index: usize,
    ) -> Result<SelectionOutcome, SelectionError> {
        if self.resolved {
            return Err(SelectionError::NoPendingSelection);
        }
        let device = registry.get_by_index(index)?.clone();
        self.resolved = true;
        Ok(SelectionOutcome::DeviceChosen(device))
    }

    pub fn cancel(&mut self) -> Option<SelectionOutcome> {
        self.resolve_with(SelectionOutcome::Cancelled(USER_CANCELLED_REASON.to_string()))
    }

    /// Scan deadline reached without a pick.
    pub fn on_deadline(&mut self, registry: &DeviceRegistry) -> Option<SelectionOutcome> {
        if registry.is_empty() {
            self.resolve_with(SelectionOutcome::NoDevicesFound)
        } else {
            self.resolve_with(SelectionOutcome::TimedOut)
        }
    }

    /// Forced resolution (superseded, preempted, source failure).
    pub fn abandon(&mut self) -> bool {
        !std::mem::replace(&mut self.resolved, true)
    }

    fn resolve_with(&mut self, outcome: SelectionOutcome) -> Option<SelectionOutcome> {
        if self.resolved {
            return None;
        }
        self.resolved = true;
        Some(outcome)
    }
}
