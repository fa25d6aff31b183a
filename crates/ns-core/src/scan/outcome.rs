use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::device::DeviceIdentity;

/// Reason given when the user dismisses the picker.
pub const USER_CANCELLED_REASON: &str = "user cancelled";
/// Reason given when a newer request replaces a pick that is still open.
pub const SUPERSEDED_REASON: &str = "superseded by a new scan request";

/// Terminal failures of a discovery session.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ScanFailure {
    #[error("already scanning, the running scan was stopped")]
    AlreadyScanning,

    #[error("selection cancelled: {reason}")]
    SelectionCancelled { reason: String },

    #[error("no device was selected before the scan deadline")]
    SelectionTimedOut,

    #[error("no devices found")]
    NoDevicesFound,

    #[error("scan source failure: {0}")]
    ScanSourceFailure(String),
}

/// The single value delivered to a session's result receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanOutcome {
    /// Stream sessions complete with `device: None`
    Success { device: Option<DeviceIdentity> },
    Failure(ScanFailure),
    /// The session was aborted by an overlapping start request
    AlreadyActive,
}

impl ScanOutcome {
    pub fn completed() -> Self {
        Self::Success { device: None }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn into_result(self) -> Result<Option<DeviceIdentity>, ScanFailure> {
        match self {
            Self::Success { device } => Ok(device),
            Self::Failure(failure) => Err(failure),
            Self::AlreadyActive => Err(ScanFailure::AlreadyScanning),
        }
    }
}

/// How a single-pick interaction ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionOutcome {
    DeviceChosen(DeviceIdentity),
    Cancelled(String),
    TimedOut,
    NoDevicesFound,
}

impl From<SelectionOutcome> for ScanOutcome {
    fn from(outcome: SelectionOutcome) -> Self {
        match outcome {
            SelectionOutcome::DeviceChosen(device) => ScanOutcome::Success {
                device: Some(device),
            },
            SelectionOutcome::Cancelled(reason) => {
                ScanOutcome::Failure(ScanFailure::SelectionCancelled { reason })
            }
            SelectionOutcome::TimedOut => ScanOutcome::Failure(ScanFailure::SelectionTimedOut),
            SelectionOutcome::NoDevicesFound => ScanOutcome::Failure(ScanFailure::NoDevicesFound),
        }
    }
}

/// Immediate answer to a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartOutcome {
    /// Stream mode: scanning, sightings will follow
    Started,
    /// Single-pick mode: scanning, result arrives after the user decides
    AwaitingSelection,
    /// A scan was already running; it was stopped and nothing new started
    AlreadyActive,
}
