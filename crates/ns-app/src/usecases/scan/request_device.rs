//! 请求用户从扫描列表中选择一个设备的用例

use tracing::{info, info_span, warn, Instrument};

use ns_core::device::DeviceIdentity;
use ns_core::scan::{ResultMode, ScanConfig, ScanFailure};
use ns_core::settings::DiscoverySettings;

use super::orchestrator::ScanOrchestrator;

/// Error type for a single-pick request.
#[derive(Debug, thiserror::Error)]
pub enum RequestDeviceError {
    #[error(transparent)]
    Scan(#[from] ScanFailure),

    #[error(transparent)]
    Start(#[from] anyhow::Error),

    /// The orchestrator went away before delivering an outcome
    #[error("scan ended without a result")]
    Abandoned,
}

/// Use case for a single-pick scan: starts scanning, waits until the user
/// selects a device (via [`ScanOrchestrator::select`]), cancels, or the
/// deadline fires.
pub struct RequestDevice {
    orchestrator: ScanOrchestrator,
    settings: DiscoverySettings,
}

impl RequestDevice {
    pub fn new(orchestrator: ScanOrchestrator, settings: DiscoverySettings) -> Self {
        Self {
            orchestrator,
            settings,
        }
    }

    pub fn default_config(&self) -> ScanConfig {
        ScanConfig::from_settings(&self.settings, ResultMode::SinglePick)
    }

    /// Execute the use case. The result mode is forced to single-pick.
    pub async fn execute(&self, mut config: ScanConfig) -> Result<DeviceIdentity, RequestDeviceError> {
        let span = info_span!("usecase.request_device.execute");

        async {
            config.result_mode = ResultMode::SinglePick;
            let handle = self.orchestrator.start(config).await?;
            info!(session_id = %handle.session_id, "Waiting for device selection");

            let outcome = handle
                .result
                .await
                .map_err(|_| RequestDeviceError::Abandoned)?;

            match outcome.into_result() {
                Ok(Some(device)) => {
                    info!(address = %device.address, "Device selected");
                    Ok(device)
                }
                Ok(None) => Err(RequestDeviceError::Abandoned),
                Err(failure) => {
                    warn!(error = %failure, "Device request failed");
                    Err(failure.into())
                }
            }
        }
        .instrument(span)
        .await
    }
}
