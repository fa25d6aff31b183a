use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::settings::DiscoverySettings;

/// How results reach the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultMode {
    /// Every sighting passing the filter/dedup gate is forwarded as it happens
    Stream,
    /// Sightings build a list; the session resolves to one picked device
    SinglePick,
}

/// Radio technology requested from the scan source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanKind {
    #[default]
    LowEnergy,
    /// Classic inquiry. Reports every found device, unfiltered.
    Classic,
}

/// Power/latency trade-off hint passed to the scan source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    LowPower,
    #[default]
    Balanced,
    LowLatency,
}

/// Filter criteria handed to the scan source unmodified.
///
/// The name prefix is not part of it: prefix filtering always happens in
/// the session so every source behaves the same.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanCriteria {
    pub kind: ScanKind,
    pub service_uuids: Vec<String>,
    pub scan_mode: ScanMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanConfigError {
    #[error("classic discovery only supports stream mode")]
    ClassicRequiresStream,
    #[error("scan deadline must be greater than zero")]
    ZeroDeadline,
}

/// Per-request session configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    pub name_prefix: String,
    /// Suppress repeat notifications for already-seen devices (stream mode)
    pub deduplicate: bool,
    /// `None` scans until explicitly stopped
    pub deadline: Option<Duration>,
    pub result_mode: ResultMode,
    pub criteria: ScanCriteria,
}

impl ScanConfig {
    pub fn new(result_mode: ResultMode) -> Self {
        Self {
            name_prefix: String::new(),
            deduplicate: true,
            deadline: None,
            result_mode,
            criteria: ScanCriteria::default(),
        }
    }

    pub fn from_settings(settings: &DiscoverySettings, result_mode: ResultMode) -> Self {
        Self {
            name_prefix: settings.name_prefix.clone(),
            deduplicate: settings.deduplicate,
            deadline: settings.scan_timeout_ms.map(Duration::from_millis),
            result_mode,
            criteria: ScanCriteria {
                scan_mode: settings.scan_mode,
                ..ScanCriteria::default()
            },
        }
    }

    pub fn with_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    pub fn with_deduplicate(mut self, deduplicate: bool) -> Self {
        self.deduplicate = deduplicate;
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_criteria(mut self, criteria: ScanCriteria) -> Self {
        self.criteria = criteria;
        self
    }

    pub fn is_classic(&self) -> bool {
        self.criteria.kind == ScanKind::Classic
    }

    pub fn validate(&self) -> Result<(), ScanConfigError> {
        if self.is_classic() && self.result_mode != ResultMode::Stream {
            return Err(ScanConfigError::ClassicRequiresStream);
        }
        if self.deadline.is_some_and(|deadline| deadline.is_zero()) {
            return Err(ScanConfigError::ZeroDeadline);
        }
        Ok(())
    }
}
