use super::model::*;
use crate::scan::ScanMode;

impl Default for DisplayStrings {
    fn default() -> Self {
        Self {
            scanning: "Scanning...".to_string(),
            cancel: "Cancel".to_string(),
            available_devices: "Available devices".to_string(),
            no_device_found: "No device found".to_string(),
        }
    }
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            scan_timeout_ms: None,
            deduplicate: true,
            name_prefix: String::new(),
            scan_mode: ScanMode::Balanced,
            display: DisplayStrings::default(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: None,
            file: true,
        }
    }
}
