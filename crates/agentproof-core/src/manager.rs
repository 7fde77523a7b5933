//! The session manager: at most one active verification at a time.
//!
//! The manager owns the only piece of shared mutable state in the runtime,
//! the active-session slot. The slot is updated only by `start_verification`
//! and `cancel_active`, and every session commit is checked against it under
//! the same lock:
//!
//! 1. Starting a verification cancels the previous session (if it is still
//!    running), delivers its `Cancelled` event, then installs the new one.
//! 2. A session may commit a transition only while it holds the slot. Once
//!    superseded, its in-flight stage call runs to completion in the
//!    background and the result is discarded.
//! 3. Events are delivered to subscribers while the lock is held, so they
//!    arrive in emission order and never interleave with a supersession.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use agentproof_contracts::{
    agent::{AgentRecord, SessionId},
    error::AgentProofResult,
    event::SessionEvent,
    outcome::SessionOutcome,
    search::SearchRequest,
    stage::{Stage, StageStatus},
};

use crate::{
    session::{SessionSink, SessionSnapshot, Transition, VerificationSession},
    stages::StagePipeline,
    traits::AuditWriter,
};

/// Caller-side view of one verification session.
#[derive(Clone)]
pub struct SessionHandle {
    session: Arc<VerificationSession>,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.session.id()
    }

    pub fn agent(&self) -> &AgentRecord {
        self.session.agent()
    }

    pub fn stage_status(&self, stage: Stage) -> StageStatus {
        self.session.stage_status(stage)
    }

    pub fn outcome(&self) -> Option<SessionOutcome> {
        self.session.outcome()
    }

    pub fn is_terminal(&self) -> bool {
        self.session.is_terminal()
    }

    pub fn is_cancelled(&self) -> bool {
        self.session.is_cancelled()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    /// Wait until the session reaches its terminal outcome.
    pub async fn wait(&self) -> SessionOutcome {
        self.session.wait().await
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id())
            .field("uaid", &self.agent().uaid)
            .field("outcome", &self.outcome())
            .finish()
    }
}

// ── Hub: the active slot and event delivery ──────────────────────────────────

struct ActiveSlot {
    current: Option<Arc<VerificationSession>>,
    /// Generation stamp handed to the next session.
    next_token: u64,
}

struct Hub {
    slot: Mutex<ActiveSlot>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<SessionEvent>>>,
    audit: Option<Arc<dyn AuditWriter>>,
}

impl Hub {
    fn lock_slot(&self) -> MutexGuard<'_, ActiveSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cancel `session` if it has not finished. Caller holds the slot lock.
    fn cancel_locked(&self, session: &VerificationSession) -> Option<SessionId> {
        if session.is_terminal() {
            return None;
        }
        match session.apply(Transition::Cancelled) {
            Ok(events) => {
                info!(session_id = %session.id(), uaid = %session.agent().uaid, "session superseded");
                self.deliver(&events);
                Some(session.id())
            }
            Err(err) => {
                warn!(session_id = %session.id(), error = %err, "could not cancel session");
                None
            }
        }
    }

    /// Hand events to the audit writer and every live subscriber. Caller
    /// holds the slot lock.
    fn deliver(&self, events: &[SessionEvent]) {
        if let Some(audit) = &self.audit {
            for event in events {
                if let Err(err) = audit.write(event) {
                    warn!(session_id = %event.session_id, error = %err, "audit write failed");
                }
                if event.is_terminal() {
                    if let Err(err) = audit.finalize(&event.session_id) {
                        warn!(session_id = %event.session_id, error = %err, "audit finalize failed");
                    }
                }
            }
        }

        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Drop subscribers whose receiver has gone away.
        subscribers.retain(|tx| events.iter().all(|event| tx.send(event.clone()).is_ok()));
    }
}

impl SessionSink for Hub {
    fn commit(&self, session: &VerificationSession, transition: Transition) -> bool {
        let slot = self.lock_slot();
        let holds_slot = slot
            .current
            .as_ref()
            .is_some_and(|active| active.token() == session.token());
        if !holds_slot {
            debug!(session_id = %session.id(), "discarding transition from superseded session");
            return false;
        }

        let committed = match session.apply(transition) {
            Ok(events) => {
                self.deliver(&events);
                true
            }
            Err(err) => {
                warn!(session_id = %session.id(), error = %err, "rejected session transition");
                false
            }
        };
        drop(slot);
        committed
    }
}

// ── SessionManager ────────────────────────────────────────────────────────────

/// Owns the single active verification session.
///
/// Construct one manager per consumer (UI, CLI, service) and keep it for the
/// consumer's lifetime. All sessions share the manager's stage pipeline.
pub struct SessionManager {
    pipeline: Arc<StagePipeline>,
    hub: Arc<Hub>,
}

impl SessionManager {
    pub fn new(pipeline: StagePipeline) -> Self {
        Self::build(pipeline, None)
    }

    /// A manager that also appends every delivered event to `audit`.
    pub fn with_audit(pipeline: StagePipeline, audit: Arc<dyn AuditWriter>) -> Self {
        Self::build(pipeline, Some(audit))
    }

    fn build(pipeline: StagePipeline, audit: Option<Arc<dyn AuditWriter>>) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            hub: Arc::new(Hub {
                slot: Mutex::new(ActiveSlot {
                    current: None,
                    next_token: 0,
                }),
                subscribers: Mutex::new(Vec::new()),
                audit,
            }),
        }
    }

    /// Receive every event delivered from now on, across all sessions, in
    /// emission order.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.hub
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Verify `agent`, superseding whatever session is currently active.
    ///
    /// The previous session, if still running, is marked `Cancelled` before
    /// this returns. The new session runs on a spawned Tokio task.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start_verification(&self, agent: AgentRecord) -> SessionHandle {
        let agent = Arc::new(agent);
        let session = {
            let mut slot = self.hub.lock_slot();
            if let Some(previous) = slot.current.take() {
                self.hub.cancel_locked(&previous);
            }
            slot.next_token += 1;
            let session = Arc::new(VerificationSession::new(agent, slot.next_token));
            slot.current = Some(Arc::clone(&session));
            session
        };

        info!(
            session_id = %session.id(),
            uaid = %session.agent().uaid,
            "verification requested"
        );

        let sink: Arc<dyn SessionSink> = Arc::clone(&self.hub) as Arc<dyn SessionSink>;
        tokio::spawn(Arc::clone(&session).run(Arc::clone(&self.pipeline), sink));

        SessionHandle { session }
    }

    /// The session currently holding the slot, finished or not.
    pub fn active_session(&self) -> Option<SessionHandle> {
        self.hub
            .lock_slot()
            .current
            .as_ref()
            .map(|session| SessionHandle {
                session: Arc::clone(session),
            })
    }

    /// Cancel the active session (if still running) and clear the slot.
    ///
    /// Returns the id of the session that was cancelled.
    pub fn cancel_active(&self) -> Option<SessionId> {
        let mut slot = self.hub.lock_slot();
        let previous = slot.current.take()?;
        self.hub.cancel_locked(&previous)
    }

    /// Search the registry for agents.
    ///
    /// A valid search supersedes the active session, as a fresh result list
    /// invalidates the current selection. An invalid request fails with
    /// `InvalidQuery` and leaves the active session alone.
    pub async fn search(&self, query: &str, limit: u32) -> AgentProofResult<Vec<AgentRecord>> {
        let request = SearchRequest::new(query, limit)?;
        if let Some(cancelled) = self.cancel_active() {
            debug!(session_id = %cancelled, "new search cancelled active session");
        }

        let mut hits = self.pipeline.registry().search(&request).await?;
        hits.truncate(request.limit() as usize);
        debug!(query = %request.query(), hits = hits.len(), "registry search complete");
        Ok(hits)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
