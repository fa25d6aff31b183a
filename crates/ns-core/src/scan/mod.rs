//! Discovery session domain: configuration, outcomes and the two pure state
//! machines that decide when a sighting is novel and when a result is due.
//!
//! # Architecture / 架构
//!
//! ```text
//! ScanOrchestrator (ns-app)
//!   ├── 接收扫描源/定时器/用户输入
//!   ├── 转换为 ScanEvent
//!   ├── 调用 ScanSession 获取 actions
//!   └── 执行 actions (启停扫描源/定时器/投递结果)
//! ```

pub mod config;
pub mod outcome;
pub mod selection;
pub mod session;

pub use config::{ResultMode, ScanConfig, ScanConfigError, ScanCriteria, ScanKind, ScanMode};
pub use outcome::{ScanFailure, ScanOutcome, SelectionOutcome, StartOutcome};
pub use selection::{ListStatus, SelectionController, SelectionError};
pub use session::{ScanAction, ScanEvent, ScanSession, ScanState};
