//! Discovery session state machine
//!
//! 一次扫描请求对应一个 `ScanSession`,状态只前进一次: `Idle → Scanning → Stopped`。
//!
//! # Design Principles / 设计原则
//!
//! - **纯函数式**: `(state, event) -> (new_state, actions[])`,不做任何 I/O
//! - **结果只投递一次**: `DeliverResult` 在一个会话内最多出现一次
//! - **停止后静默**: 停止后到达的扫描结果与定时器事件全部忽略
//!
//! The orchestrator in `ns-app` feeds events in, one at a time, and executes
//! the returned actions against the scan source, the deadline timer, the
//! presentation sink and the result receiver.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::config::{ResultMode, ScanConfig, ScanCriteria};
use super::outcome::{ScanFailure, ScanOutcome, StartOutcome, SUPERSEDED_REASON};
use super::selection::{ListStatus, SelectionController, SelectionError};
use crate::device::{DeviceIdentity, DeviceRegistry, RawSighting, Sighting};
use crate::ids::ScanSessionId;

/// Lifecycle of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Scanning,
    /// Terminal. A single-pick session may still hold an open pick here.
    Stopped,
}

/// Inputs to the state machine
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    /// Begin scanning with the given configuration
    Start(ScanConfig),
    /// Raw detection from the scan source
    Sighting(RawSighting),
    /// Caller asked to stop
    Stop,
    /// Scan deadline timer fired
    DeadlineElapsed,
    /// The scan source ended on its own
    SourceFinished,
    /// The scan source reported an error
    SourceFailed { message: String },
    /// An overlapping start request arrived while scanning
    Preempted,
    /// A new request replaces this (stopped) session
    Superseded,
}

/// Side effects requested by a transition
#[derive(Debug, Clone, PartialEq)]
pub enum ScanAction {
    /// 启动扫描源
    StartSource(ScanCriteria),
    /// 停止扫描源 (不等待确认)
    StopSource,
    /// 启动截止定时器
    ArmDeadline(Duration),
    /// 取消截止定时器
    CancelDeadline,
    /// 流模式: 转发一次扫描结果
    EmitSighting(Sighting),
    /// 选择模式: 刷新设备列表 (快照)
    PublishList(Vec<DeviceIdentity>),
    /// 选择模式: 更新列表标题
    SetListStatus(ListStatus),
    /// 选择模式: 关闭设备列表
    DismissList,
    /// 投递最终结果
    DeliverResult(ScanOutcome),
}

/// Pure discovery session.
#[derive(Debug, Clone)]
pub struct ScanSession {
    id: ScanSessionId,
    state: ScanState,
    config: Option<ScanConfig>,
    registry: DeviceRegistry,
    selection: Option<SelectionController>,
    result_delivered: bool,
    next_sequence: u64,
}

impl Default for ScanSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanSession {
    pub fn new() -> Self {
        Self::with_id(ScanSessionId::new())
    }

    pub fn with_id(id: ScanSessionId) -> Self {
        Self {
            id,
            state: ScanState::Idle,
            config: None,
            registry: DeviceRegistry::new(),
            selection: None,
            result_delivered: false,
            next_sequence: 0,
        }
    }

    pub fn id(&self) -> &ScanSessionId {
        &self.id
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn config(&self) -> Option<&ScanConfig> {
        self.config.as_ref()
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn result_delivered(&self) -> bool {
        self.result_delivered
    }

    pub fn is_scanning(&self) -> bool {
        self.state == ScanState::Scanning
    }

    /// A single-pick session that stopped but still waits for the user.
    pub fn has_pending_selection(&self) -> bool {
        !self.result_delivered
            && self
                .selection
                .as_ref()
                .is_some_and(|selection| !selection.is_resolved())
    }

    /// Stopped and the outcome has been handed out. Nothing can happen anymore.
    pub fn is_finished(&self) -> bool {
        self.state == ScanState::Stopped && self.result_delivered
    }

    /// Immediate answer for the start request that created this session.
    pub fn start_outcome(&self) -> StartOutcome {
        match self.config.as_ref().map(|config| config.result_mode) {
            Some(ResultMode::SinglePick) => StartOutcome::AwaitingSelection,
            _ => StartOutcome::Started,
        }
    }

    /// 处理事件并返回新状态和动作列表
    pub fn handle_event(
        &mut self,
        event: ScanEvent,
        now: DateTime<Utc>,
    ) -> (ScanState, Vec<ScanAction>) {
        let old_state = self.state;
        #[cfg(feature = "tracing")]
        let event_name = event_name(&event);

        let actions = self.transition(event, now);

        #[cfg(feature = "tracing")]
        if old_state != self.state {
            tracing::debug!(
                session_id = %self.id,
                old_state = ?old_state,
                event = event_name,
                new_state = ?self.state,
                "scan session transition"
            );
        }
        #[cfg(not(feature = "tracing"))]
        let _ = old_state;

        (self.state, actions)
    }

    /// User picked the list entry at `index`.
    ///
    /// An out-of-range index is reported to the caller and leaves the session
    /// untouched.
    pub fn select(&mut self, index: usize) -> Result<(ScanState, Vec<ScanAction>), SelectionError> {
        if self.result_delivered {
            return Err(SelectionError::NoPendingSelection);
        }
        let selection = self
            .selection
            .as_mut()
            .ok_or(SelectionError::NoPendingSelection)?;
        let outcome = selection.select(&self.registry, index)?;

        let mut actions = self.halt();
        actions.push(ScanAction::DismissList);
        self.deliver(outcome.into(), &mut actions);
        Ok((self.state, actions))
    }

    /// User dismissed the list.
    pub fn cancel_selection(&mut self) -> Result<(ScanState, Vec<ScanAction>), SelectionError> {
        if self.result_delivered {
            return Err(SelectionError::NoPendingSelection);
        }
        let outcome = self
            .selection
            .as_mut()
            .and_then(SelectionController::cancel)
            .ok_or(SelectionError::NoPendingSelection)?;

        let mut actions = self.halt();
        actions.push(ScanAction::DismissList);
        self.deliver(outcome.into(), &mut actions);
        Ok((self.state, actions))
    }

    fn transition(&mut self, event: ScanEvent, now: DateTime<Utc>) -> Vec<ScanAction> {
        match (self.state, event) {
            (ScanState::Idle, ScanEvent::Start(config)) => self.start(config),
            (_, ScanEvent::Start(_)) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(session_id = %self.id, "start ignored, session already used");
                vec![]
            }

            (ScanState::Scanning, ScanEvent::Sighting(raw)) => self.on_sighting(raw, now),
            (_, ScanEvent::Sighting(_)) => vec![],

            (ScanState::Scanning, ScanEvent::Stop) => {
                let mut actions = self.halt();
                if !self.is_single_pick() {
                    self.deliver(ScanOutcome::completed(), &mut actions);
                }
                actions
            }
            (ScanState::Idle, ScanEvent::Stop) => {
                self.state = ScanState::Stopped;
                vec![]
            }
            (ScanState::Stopped, ScanEvent::Stop) => vec![],

            (ScanState::Scanning, ScanEvent::DeadlineElapsed)
            | (ScanState::Scanning, ScanEvent::SourceFinished) => self.on_deadline(),
            (_, ScanEvent::DeadlineElapsed) | (_, ScanEvent::SourceFinished) => vec![],

            (ScanState::Scanning, ScanEvent::SourceFailed { message }) => {
                let mut actions = self.halt();
                self.abandon_selection(&mut actions);
                self.deliver(
                    ScanOutcome::Failure(ScanFailure::ScanSourceFailure(message)),
                    &mut actions,
                );
                actions
            }
            (_, ScanEvent::SourceFailed { .. }) => vec![],

            (ScanState::Scanning, ScanEvent::Preempted) => {
                let mut actions = self.halt();
                self.abandon_selection(&mut actions);
                self.deliver(ScanOutcome::AlreadyActive, &mut actions);
                actions
            }
            (_, ScanEvent::Preempted) => vec![],

            (_, ScanEvent::Superseded) => {
                let mut actions = if self.is_scanning() {
                    self.halt()
                } else {
                    self.state = ScanState::Stopped;
                    vec![]
                };
                self.abandon_selection(&mut actions);
                self.deliver(
                    ScanOutcome::Failure(ScanFailure::SelectionCancelled {
                        reason: SUPERSEDED_REASON.to_string(),
                    }),
                    &mut actions,
                );
                actions
            }
        }
    }

    fn start(&mut self, config: ScanConfig) -> Vec<ScanAction> {
        self.registry.clear();
        self.next_sequence = 0;
        self.state = ScanState::Scanning;

        let mut actions = Vec::new();
        if let Some(deadline) = config.deadline {
            actions.push(ScanAction::ArmDeadline(deadline));
        }
        actions.push(ScanAction::StartSource(config.criteria.clone()));

        if config.result_mode == ResultMode::SinglePick {
            self.selection = Some(SelectionController::new());
            actions.push(ScanAction::SetListStatus(ListStatus::Scanning));
            actions.push(ScanAction::PublishList(Vec::new()));
        }

        self.config = Some(config);
        actions
    }

    fn on_sighting(&mut self, raw: RawSighting, now: DateTime<Utc>) -> Vec<ScanAction> {
        let Some(config) = self.config.as_ref() else {
            return vec![];
        };
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        // Classic inquiry reports every device it finds
        if config.is_classic() {
            self.registry.add_device(raw.device.clone());
            return vec![ScanAction::EmitSighting(Sighting::from_raw(
                raw, sequence, now,
            ))];
        }

        if !raw.device.matches_prefix(&config.name_prefix) {
            #[cfg(feature = "tracing")]
            tracing::trace!(
                session_id = %self.id,
                address = %raw.device.address,
                "sighting filtered by name prefix"
            );
            return vec![];
        }

        let deduplicate = config.deduplicate;
        let result_mode = config.result_mode;
        let is_new = self.registry.add_device(raw.device.clone());

        match result_mode {
            ResultMode::Stream => {
                if !deduplicate || is_new {
                    vec![ScanAction::EmitSighting(Sighting::from_raw(
                        raw, sequence, now,
                    ))]
                } else {
                    vec![]
                }
            }
            ResultMode::SinglePick => self
                .selection
                .as_mut()
                .and_then(|selection| selection.on_sighting(is_new, &raw.device))
                .map(|list| vec![ScanAction::PublishList(list)])
                .unwrap_or_default(),
        }
    }

    fn on_deadline(&mut self) -> Vec<ScanAction> {
        let mut actions = self.halt();
        if self.is_single_pick() {
            let outcome = self
                .selection
                .as_mut()
                .and_then(|selection| selection.on_deadline(&self.registry));
            if let Some(outcome) = outcome {
                actions.push(ScanAction::DismissList);
                self.deliver(outcome.into(), &mut actions);
            }
        } else {
            self.deliver(ScanOutcome::completed(), &mut actions);
        }
        actions
    }

    /// Stop scanning without deciding the outcome.
    fn halt(&mut self) -> Vec<ScanAction> {
        if self.state != ScanState::Scanning {
            self.state = ScanState::Stopped;
            return vec![];
        }
        self.state = ScanState::Stopped;

        let mut actions = vec![ScanAction::CancelDeadline, ScanAction::StopSource];
        if self.is_single_pick() {
            actions.push(ScanAction::SetListStatus(ListStatus::after_scan(
                self.registry.count(),
            )));
        }
        actions
    }

    fn abandon_selection(&mut self, actions: &mut Vec<ScanAction>) {
        if let Some(selection) = self.selection.as_mut() {
            if selection.abandon() {
                actions.push(ScanAction::DismissList);
            }
        }
    }

    fn deliver(&mut self, outcome: ScanOutcome, actions: &mut Vec<ScanAction>) {
        if self.result_delivered {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                session_id = %self.id,
                outcome = ?outcome,
                "result already delivered, dropping"
            );
            return;
        }
        self.result_delivered = true;
        actions.push(ScanAction::DeliverResult(outcome));
    }

    fn is_single_pick(&self) -> bool {
        self.config
            .as_ref()
            .is_some_and(|config| config.result_mode == ResultMode::SinglePick)
    }
}

#[cfg(feature = "tracing")]
fn event_name(event: &ScanEvent) -> &'static str {
    match event {
        ScanEvent::Start(_) => "Start",
        ScanEvent::Sighting(_) => "Sighting",
        ScanEvent::Stop => "Stop",
        ScanEvent::DeadlineElapsed => "DeadlineElapsed",
        ScanEvent::SourceFinished => "SourceFinished",
        ScanEvent::SourceFailed { .. } => "SourceFailed",
        ScanEvent::Preempted => "Preempted",
        ScanEvent::Superseded => "Superseded",
    }
}
