pub mod orchestrator;
pub mod request_device;
pub mod start_scan;

pub use orchestrator::{ScanHandle, ScanOrchestrator};
pub use request_device::{RequestDevice, RequestDeviceError};
pub use start_scan::StartScan;
