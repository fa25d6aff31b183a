//! 启动流式扫描的用例

use anyhow::Result;
use tracing::{info, info_span, Instrument};

use ns_core::scan::{ResultMode, ScanConfig};
use ns_core::settings::DiscoverySettings;

use super::orchestrator::{ScanHandle, ScanOrchestrator};

/// Use case for a stream-mode scan: every accepted sighting is delivered to
/// the handle's `sightings` receiver until the scan stops.
pub struct StartScan {
    orchestrator: ScanOrchestrator,
    settings: DiscoverySettings,
}

impl StartScan {
    pub fn new(orchestrator: ScanOrchestrator, settings: DiscoverySettings) -> Self {
        Self {
            orchestrator,
            settings,
        }
    }

    /// Request built from the configured discovery defaults.
    pub fn default_config(&self) -> ScanConfig {
        ScanConfig::from_settings(&self.settings, ResultMode::Stream)
    }

    /// Execute the use case. The result mode is forced to stream.
    pub async fn execute(&self, mut config: ScanConfig) -> Result<ScanHandle> {
        let span = info_span!("usecase.start_scan.execute");

        async {
            config.result_mode = ResultMode::Stream;
            let handle = self.orchestrator.start(config).await?;
            info!(session_id = %handle.session_id, start = ?handle.start, "Stream scan requested");
            Ok(handle)
        }
        .instrument(span)
        .await
    }
}
