//! # Dependency Injection / 依赖注入模块
//!
//! ## Responsibilities / 职责
//!
//! - ✅ Create platform implementations (scan source, presentation) / 创建 platform 层具体实现
//! - ✅ Inject them into the orchestrator and use cases / 注入到编排器与用例
//!
//! ## Prohibited / 禁止事项
//!
//! ❌ **No business logic / 禁止包含任何业务逻辑**
//!
//! > **This is the only place allowed to depend on ns-platform + ns-app simultaneously.**
//! > **这是唯一允许同时依赖 ns-platform 和 ns-app 的地方。**

use std::sync::Arc;

use ns_app::{RequestDevice, ScanOrchestrator, StartScan};
use ns_core::config::AppConfig;
use ns_core::ports::{PresentationPort, ScanSourcePort};
use ns_platform::{LogPresentation, ReplayScanSource, ReplayScript};

/// Assembled application
pub struct AppRuntime {
    pub orchestrator: ScanOrchestrator,
    pub start_scan: StartScan,
    pub request_device: RequestDevice,
    pub presentation: Arc<LogPresentation>,
}

/// Wire the replay scan source and log presentation into the orchestrator.
///
/// Must be called from within a Tokio runtime.
pub fn wire_dependencies(config: &AppConfig, script: ReplayScript) -> AppRuntime {
    let source: Arc<dyn ScanSourcePort> = Arc::new(ReplayScanSource::new(script));
    let presentation = Arc::new(LogPresentation::new());
    let presentation_port: Arc<dyn PresentationPort> = presentation.clone();

    let orchestrator = ScanOrchestrator::new(
        source,
        presentation_port,
        config.discovery.display.clone(),
    );

    AppRuntime {
        start_scan: StartScan::new(orchestrator.clone(), config.discovery.clone()),
        request_device: RequestDevice::new(orchestrator.clone(), config.discovery.clone()),
        orchestrator,
        presentation,
    }
}
