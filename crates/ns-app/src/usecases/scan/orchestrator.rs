//! Discovery session orchestrator
//!
//! 这个模块负责编排扫描会话状态机,将扫描源事件、用户输入和定时器事件转换为状态机事件,
//! 并执行状态机返回的动作。
//!
//! # Architecture / 架构
//!
//! ```text
//! Scan source / Timer            User (select, cancel, stop)
//!   ↓ (forwarder task)             ↓
//! command channel → driver task    │
//!   ↓                              ↓
//! ScanOrchestrator  (single Mutex around the active session)
//!   ↓
//! ScanSession (pure state transitions)
//!   ↓
//! ScanActions (executed while the lock is held)
//!   ↓
//! Scan source / deadline timer / presentation / result receiver
//! ```
//!
//! Timer and source tasks never touch the session directly: they post a
//! [`Command`] tagged with the session id, and the driver applies it under
//! the lock. Commands for a session that is no longer active are dropped.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::AbortHandle;
use tracing::{info_span, Instrument};

use ns_core::device::{DeviceIdentity, Sighting};
use ns_core::ids::ScanSessionId;
use ns_core::ports::{
    scan_event_channel, PresentationPort, ScanEventReceiver, ScanSourceEvent, ScanSourcePort,
};
use ns_core::scan::{
    ScanAction, ScanConfig, ScanEvent, ScanOutcome, ScanSession, ScanState, SelectionError,
    StartOutcome,
};
use ns_core::settings::DisplayStrings;

/// Caller side of one start request.
#[derive(Debug)]
pub struct ScanHandle {
    pub session_id: ScanSessionId,
    /// Immediate answer to the start request
    pub start: StartOutcome,
    /// Resolves exactly once with the session outcome
    pub result: oneshot::Receiver<ScanOutcome>,
    /// Stream-mode sightings; the channel closes once the outcome is delivered
    pub sightings: mpsc::UnboundedReceiver<Sighting>,
}

impl ScanHandle {
    /// Handle for a request rejected because a scan was already running.
    /// Its result resolves to `AlreadyActive` right away.
    fn already_active() -> Self {
        let (result_tx, result) = oneshot::channel();
        let _ = result_tx.send(ScanOutcome::AlreadyActive);
        let (_, sightings) = mpsc::unbounded_channel();
        Self {
            session_id: ScanSessionId::new(),
            start: StartOutcome::AlreadyActive,
            result,
            sightings,
        }
    }
}

/// Asynchronous inputs routed through the driver task
#[derive(Debug)]
enum Command {
    Source {
        session_id: ScanSessionId,
        event: ScanSourceEvent,
    },
    Deadline {
        session_id: ScanSessionId,
    },
}

/// 活跃会话上下文
struct ActiveSession {
    /// 状态机
    session: ScanSession,
    /// 结果槽 (只能取出一次)
    result_tx: Option<oneshot::Sender<ScanOutcome>>,
    /// 流模式下的扫描结果发送端
    sighting_tx: Option<mpsc::UnboundedSender<Sighting>>,
    /// 截止定时器句柄
    deadline: Option<AbortHandle>,
    /// 扫描源事件转发任务句柄
    forwarder: Option<AbortHandle>,
}

impl ActiveSession {
    fn new(session: ScanSession) -> (Self, ScanReceivers) {
        let (result_tx, result) = oneshot::channel();
        let (sighting_tx, sightings) = mpsc::unbounded_channel();
        (
            Self {
                session,
                result_tx: Some(result_tx),
                sighting_tx: Some(sighting_tx),
                deadline: None,
                forwarder: None,
            },
            ScanReceivers { result, sightings },
        )
    }

    fn release_tasks(&mut self) {
        if let Some(handle) = self.deadline.take() {
            handle.abort();
        }
        if let Some(handle) = self.forwarder.take() {
            handle.abort();
        }
    }
}

struct ScanReceivers {
    result: oneshot::Receiver<ScanOutcome>,
    sightings: mpsc::UnboundedReceiver<Sighting>,
}

struct OrchestratorInner {
    source: Arc<dyn ScanSourcePort>,
    presentation: Arc<dyn PresentationPort>,
    display: DisplayStrings,
    active: Mutex<Option<ActiveSession>>,
    command_tx: mpsc::UnboundedSender<Command>,
}

/// 扫描编排器
///
/// Holds at most one discovery session at a time. Cheap to clone; clones
/// share the same session.
#[derive(Clone)]
pub struct ScanOrchestrator {
    inner: Arc<OrchestratorInner>,
}

impl ScanOrchestrator {
    /// Create the orchestrator and spawn its command driver.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(
        source: Arc<dyn ScanSourcePort>,
        presentation: Arc<dyn PresentationPort>,
        display: DisplayStrings,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(OrchestratorInner {
            source,
            presentation,
            display,
            active: Mutex::new(None),
            command_tx,
        });
        tokio::spawn(Self::drive(Arc::downgrade(&inner), command_rx));
        Self { inner }
    }

    async fn drive(inner: Weak<OrchestratorInner>, mut commands: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = commands.recv().await {
            let Some(inner) = inner.upgrade() else {
                break;
            };
            inner.handle_command(command).await;
        }
        tracing::debug!("scan command driver stopped");
    }

    /// Start a discovery session.
    ///
    /// If a scan is already running it is stopped, its result receiver gets
    /// `AlreadyActive`, and this request is answered with `AlreadyActive`
    /// too without starting anything.
    pub async fn start(&self, config: ScanConfig) -> Result<ScanHandle> {
        config.validate().context("invalid scan request")?;
        let span = info_span!(
            "scan.start",
            mode = ?config.result_mode,
            prefix = %config.name_prefix,
            deduplicate = config.deduplicate,
            deadline_ms = ?config.deadline.map(|deadline| deadline.as_millis()),
        );
        Ok(self.inner.start(config).instrument(span).await)
    }

    /// Stop scanning. Idempotent.
    ///
    /// Stream sessions complete with `Success { device: None }`. A single-pick
    /// session stays open for `select` / `cancel`.
    pub async fn stop(&self) {
        let span = info_span!("scan.stop");
        self.inner.stop().instrument(span).await
    }

    /// Resolve the pending pick with the device at `index` (first-seen order).
    pub async fn select(&self, index: usize) -> Result<(), SelectionError> {
        let span = info_span!("scan.select", index);
        self.inner.select(index).instrument(span).await
    }

    /// Dismiss the pending pick.
    pub async fn cancel(&self) -> Result<(), SelectionError> {
        let span = info_span!("scan.cancel");
        self.inner.cancel().instrument(span).await
    }

    pub async fn state(&self) -> Option<ScanState> {
        let active = self.inner.active.lock().await;
        active.as_ref().map(|entry| entry.session.state())
    }

    pub async fn active_session_id(&self) -> Option<ScanSessionId> {
        let active = self.inner.active.lock().await;
        active.as_ref().map(|entry| entry.session.id().clone())
    }

    /// Devices seen so far by the active session, in first-seen order.
    pub async fn devices(&self) -> Vec<DeviceIdentity> {
        let active = self.inner.active.lock().await;
        active
            .as_ref()
            .map(|entry| entry.session.registry().snapshot())
            .unwrap_or_default()
    }
}

impl OrchestratorInner {
    async fn start(&self, config: ScanConfig) -> ScanHandle {
        let mut active = self.active.lock().await;

        if let Some(mut current) = active.take() {
            if current.session.is_scanning() {
                tracing::warn!(
                    session_id = %current.session.id(),
                    "start requested while scanning, stopping the running scan"
                );
                self.apply(&mut current, ScanEvent::Preempted).await;
                if current.session.is_finished() {
                    current.release_tasks();
                } else {
                    *active = Some(current);
                }
                return ScanHandle::already_active();
            }

            if current.session.has_pending_selection() {
                tracing::info!(
                    session_id = %current.session.id(),
                    "replacing stopped session with an open pick"
                );
                self.apply(&mut current, ScanEvent::Superseded).await;
            }
            current.release_tasks();
        }

        let (mut entry, receivers) = ActiveSession::new(ScanSession::new());
        let session_id = entry.session.id().clone();
        self.apply(&mut entry, ScanEvent::Start(config)).await;
        let start = entry.session.start_outcome();

        tracing::info!(session_id = %session_id, start = ?start, "scan session started");

        if entry.session.is_finished() {
            entry.release_tasks();
        } else {
            *active = Some(entry);
        }

        ScanHandle {
            session_id,
            start,
            result: receivers.result,
            sightings: receivers.sightings,
        }
    }

    async fn stop(&self) {
        let mut active = self.active.lock().await;
        let Some(entry) = active.as_mut() else {
            tracing::debug!("stop requested without an active session");
            return;
        };
        self.apply(entry, ScanEvent::Stop).await;
        Self::discard_if_finished(&mut active);
    }

    async fn select(&self, index: usize) -> Result<(), SelectionError> {
        let mut active = self.active.lock().await;
        let entry = active.as_mut().ok_or(SelectionError::NoPendingSelection)?;
        let (_state, actions) = entry.session.select(index).inspect_err(|err| {
            tracing::warn!(error = %err, "selection rejected");
        })?;
        self.execute(entry, actions).await;
        Self::discard_if_finished(&mut active);
        Ok(())
    }

    async fn cancel(&self) -> Result<(), SelectionError> {
        let mut active = self.active.lock().await;
        let entry = active.as_mut().ok_or(SelectionError::NoPendingSelection)?;
        let (_state, actions) = entry.session.cancel_selection()?;
        self.execute(entry, actions).await;
        Self::discard_if_finished(&mut active);
        Ok(())
    }

    async fn handle_command(&self, command: Command) {
        let (session_id, event) = match command {
            Command::Source { session_id, event } => {
                let event = match event {
                    ScanSourceEvent::Sighting(raw) => ScanEvent::Sighting(raw),
                    ScanSourceEvent::Finished => ScanEvent::SourceFinished,
                    ScanSourceEvent::Failed(message) => {
                        tracing::error!(session_id = %session_id, %message, "scan source failed");
                        ScanEvent::SourceFailed { message }
                    }
                };
                (session_id, event)
            }
            Command::Deadline { session_id } => (session_id, ScanEvent::DeadlineElapsed),
        };

        let mut active = self.active.lock().await;
        let Some(entry) = active
            .as_mut()
            .filter(|entry| entry.session.id() == &session_id)
        else {
            tracing::trace!(session_id = %session_id, "event for inactive session ignored");
            return;
        };

        if event == ScanEvent::DeadlineElapsed {
            tracing::info!(session_id = %session_id, "scan deadline elapsed");
            entry.deadline = None;
        }
        self.apply(entry, event).await;
        Self::discard_if_finished(&mut active);
    }

    async fn apply(&self, entry: &mut ActiveSession, event: ScanEvent) {
        let (_state, actions) = entry.session.handle_event(event, Utc::now());
        self.execute(entry, actions).await;
    }

    /// 执行状态机返回的动作
    async fn execute(&self, entry: &mut ActiveSession, actions: Vec<ScanAction>) {
        let session_id = entry.session.id().clone();
        let mut queue = VecDeque::from(actions);

        while let Some(action) = queue.pop_front() {
            match action {
                ScanAction::StartSource(criteria) => {
                    let (events_tx, events_rx) = scan_event_channel();
                    if let Some(previous) = entry.forwarder.take() {
                        previous.abort();
                    }
                    entry.forwarder = Some(self.spawn_forwarder(session_id.clone(), events_rx));

                    tracing::debug!(session_id = %session_id, ?criteria, "starting scan source");
                    if let Err(err) = self.source.start_scanning(criteria, events_tx).await {
                        tracing::error!(
                            session_id = %session_id,
                            error = %err,
                            "scan source failed to start"
                        );
                        let (_state, actions) = entry.session.handle_event(
                            ScanEvent::SourceFailed {
                                message: err.to_string(),
                            },
                            Utc::now(),
                        );
                        queue.extend(actions);
                    }
                }
                ScanAction::StopSource => {
                    tracing::debug!(session_id = %session_id, "stopping scan source");
                    if let Err(err) = self.source.stop_scanning().await {
                        tracing::warn!(
                            session_id = %session_id,
                            error = %err,
                            "scan source failed to stop"
                        );
                    }
                }
                ScanAction::ArmDeadline(after) => {
                    if let Some(previous) = entry.deadline.take() {
                        previous.abort();
                    }
                    entry.deadline = Some(self.spawn_deadline(session_id.clone(), after));
                }
                ScanAction::CancelDeadline => {
                    if let Some(handle) = entry.deadline.take() {
                        handle.abort();
                    }
                }
                ScanAction::EmitSighting(sighting) => {
                    if let Some(sighting_tx) = entry.sighting_tx.as_ref() {
                        if sighting_tx.send(sighting).is_err() {
                            tracing::debug!(session_id = %session_id, "sighting receiver dropped");
                        }
                    }
                }
                ScanAction::PublishList(devices) => {
                    self.presentation.list_updated(&devices);
                }
                ScanAction::SetListStatus(status) => {
                    self.presentation.status_changed(status, &self.display);
                }
                ScanAction::DismissList => {
                    self.presentation.dismissed();
                }
                ScanAction::DeliverResult(outcome) => {
                    entry.sighting_tx = None;
                    match entry.result_tx.take() {
                        Some(result_tx) => {
                            tracing::info!(
                                session_id = %session_id,
                                outcome = ?outcome,
                                "delivering scan result"
                            );
                            if result_tx.send(outcome).is_err() {
                                tracing::debug!(
                                    session_id = %session_id,
                                    "result receiver dropped"
                                );
                            }
                        }
                        None => {
                            tracing::warn!(session_id = %session_id, "result slot already consumed");
                        }
                    }
                }
            }
        }
    }

    fn spawn_deadline(&self, session_id: ScanSessionId, after: Duration) -> AbortHandle {
        let commands = self.command_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = commands.send(Command::Deadline { session_id });
        })
        .abort_handle()
    }

    fn spawn_forwarder(&self, session_id: ScanSessionId, mut events: ScanEventReceiver) -> AbortHandle {
        let commands = self.command_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let command = Command::Source {
                    session_id: session_id.clone(),
                    event,
                };
                if commands.send(command).is_err() {
                    break;
                }
            }
        })
        .abort_handle()
    }

    fn discard_if_finished(active: &mut Option<ActiveSession>) {
        if !active
            .as_ref()
            .is_some_and(|entry| entry.session.is_finished())
        {
            return;
        }
        if let Some(mut entry) = active.take() {
            tracing::debug!(session_id = %entry.session.id(), "scan session discarded");
            entry.release_tasks();
        }
    }
}
