//! The verification session: one attempt to verify one agent.
//!
//! A session drives the three stages strictly in order:
//!
//!   Created → Stage1Running → Stage2Running → Stage3Running → Terminal
//!
//! Any stage failure ends the session `Unverified` and the remaining stages
//! never start. A cancellation ends it `Cancelled` from any non-terminal state.
//!
//! Every state change goes through `VerificationSession::apply`, and the
//! session only ever reaches `apply` through its `SessionSink`. The sink
//! decides whether the session may still publish. A stage call that completes
//! after the session was superseded is therefore discarded at commit time; the
//! call itself is never aborted.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use agentproof_contracts::{
    agent::{AgentRecord, SessionId},
    error::{AgentProofError, AgentProofResult},
    event::{SessionEvent, SessionEventKind},
    outcome::{Evidence, Failure, SessionOutcome},
    stage::{Stage, StageStatus},
};

use crate::stages::{StageInputs, StageOutput, StagePipeline};

/// A requested change to a session's state.
#[derive(Debug, Clone)]
pub enum Transition {
    /// The stage's executor is about to be called.
    Started(Stage),
    /// A non-final stage succeeded.
    Succeeded(Stage),
    /// A stage failed; the session ends `Unverified`.
    Failed(Failure),
    /// The final stage succeeded; the session ends `Verified`.
    Verified(Evidence),
    /// The session was superseded.
    Cancelled,
}

/// Where a running session commits its transitions.
///
/// `commit` applies the transition and delivers the resulting events as one
/// step, or refuses both. Returning `false` tells the session it has been
/// superseded (or the transition was illegal) and must stop.
pub trait SessionSink: Send + Sync {
    fn commit(&self, session: &VerificationSession, transition: Transition) -> bool;
}

/// Point-in-time copy of a session's state.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub agent: AgentRecord,
    pub stages: Vec<(Stage, StageStatus)>,
    pub outcome: Option<SessionOutcome>,
    pub cancelled: bool,
}

struct SessionState {
    stages: [StageStatus; 3],
    outcome: Option<SessionOutcome>,
    cancelled: bool,
    next_sequence: u64,
}

impl SessionState {
    fn status(&self, stage: Stage) -> StageStatus {
        self.stages[stage.index()]
    }

    fn advance(&mut self, stage: Stage, next: StageStatus) -> AgentProofResult<()> {
        let current = self.status(stage);
        if !current.can_advance_to(next) {
            return Err(AgentProofError::StateMachineError {
                reason: format!("stage {stage} cannot move from {current:?} to {next:?}"),
            });
        }
        self.stages[stage.index()] = next;
        Ok(())
    }
}

/// State for one in-flight verification attempt.
///
/// The agent record is fixed at creation and shared read-only. `token` is the
/// generation stamp the session manager compares when a transition is
/// committed.
pub struct VerificationSession {
    id: SessionId,
    token: u64,
    agent: Arc<AgentRecord>,
    state: Mutex<SessionState>,
    outcome_tx: watch::Sender<Option<SessionOutcome>>,
}

impl VerificationSession {
    pub fn new(agent: Arc<AgentRecord>, token: u64) -> Self {
        let (outcome_tx, _) = watch::channel(None);
        Self {
            id: SessionId::new(),
            token,
            agent,
            state: Mutex::new(SessionState {
                stages: [StageStatus::Pending; 3],
                outcome: None,
                cancelled: false,
                next_sequence: 0,
            }),
            outcome_tx,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn agent(&self) -> &Arc<AgentRecord> {
        &self.agent
    }

    pub fn stage_status(&self, stage: Stage) -> StageStatus {
        self.lock_state().status(stage)
    }

    pub fn outcome(&self) -> Option<SessionOutcome> {
        self.lock_state().outcome.clone()
    }

    pub fn is_terminal(&self) -> bool {
        self.lock_state().outcome.is_some()
    }

    pub fn is_cancelled(&self) -> bool {
        self.lock_state().cancelled
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.lock_state();
        SessionSnapshot {
            session_id: self.id,
            agent: self.agent.as_ref().clone(),
            stages: Stage::ALL.iter().map(|s| (*s, state.status(*s))).collect(),
            outcome: state.outcome.clone(),
            cancelled: state.cancelled,
        }
    }

    /// Wait for the terminal outcome.
    pub async fn wait(&self) -> SessionOutcome {
        let mut rx = self.outcome_tx.subscribe();
        // The sender lives as long as `self`, so the channel cannot close
        // while we wait on it.
        let outcome = rx
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|seen| seen.clone());
        outcome.unwrap_or(SessionOutcome::Cancelled)
    }

    /// Apply `transition` and return the events it produced, in order.
    ///
    /// Enforces the session invariants:
    /// - stage statuses only move forward;
    /// - a stage starts only after every earlier stage succeeded;
    /// - the outcome is set at most once, and nothing changes afterwards.
    pub fn apply(&self, transition: Transition) -> AgentProofResult<Vec<SessionEvent>> {
        let mut state = self.lock_state();
        if state.outcome.is_some() {
            return Err(AgentProofError::StateMachineError {
                reason: format!("session {} is already terminal", self.id),
            });
        }

        let mut kinds = Vec::with_capacity(2);
        match transition {
            Transition::Started(stage) => {
                let blocked_by = Stage::ALL[..stage.index()]
                    .iter()
                    .copied()
                    .find(|earlier| state.status(*earlier) != StageStatus::Succeeded);
                if let Some(earlier) = blocked_by {
                    return Err(AgentProofError::StateMachineError {
                        reason: format!("stage {stage} cannot start before {earlier} succeeds"),
                    });
                }
                state.advance(stage, StageStatus::Running)?;
                kinds.push(SessionEventKind::StageChanged {
                    stage,
                    status: StageStatus::Running,
                });
            }
            Transition::Succeeded(stage) => {
                if stage.is_last() {
                    return Err(AgentProofError::StateMachineError {
                        reason: format!("final stage {stage} completes through Verified"),
                    });
                }
                state.advance(stage, StageStatus::Succeeded)?;
                kinds.push(SessionEventKind::StageChanged {
                    stage,
                    status: StageStatus::Succeeded,
                });
            }
            Transition::Failed(failure) => {
                state.advance(failure.stage, StageStatus::Failed)?;
                kinds.push(SessionEventKind::StageChanged {
                    stage: failure.stage,
                    status: StageStatus::Failed,
                });
                kinds.push(SessionEventKind::Terminal(SessionOutcome::Unverified(failure)));
            }
            Transition::Verified(evidence) => {
                state.advance(Stage::EstablishChannel, StageStatus::Succeeded)?;
                kinds.push(SessionEventKind::StageChanged {
                    stage: Stage::EstablishChannel,
                    status: StageStatus::Succeeded,
                });
                kinds.push(SessionEventKind::Terminal(SessionOutcome::Verified(evidence)));
            }
            Transition::Cancelled => {
                state.cancelled = true;
                kinds.push(SessionEventKind::Terminal(SessionOutcome::Cancelled));
            }
        }

        let timestamp = Utc::now();
        let events: Vec<SessionEvent> = kinds
            .into_iter()
            .map(|kind| {
                if let SessionEventKind::Terminal(outcome) = &kind {
                    state.outcome = Some(outcome.clone());
                }
                let sequence = state.next_sequence;
                state.next_sequence += 1;
                SessionEvent {
                    session_id: self.id,
                    sequence,
                    kind,
                    timestamp,
                }
            })
            .collect();

        if let Some(outcome) = &state.outcome {
            self.outcome_tx.send_replace(Some(outcome.clone()));
        }
        Ok(events)
    }

    /// Drive the session through every stage, committing each step to `sink`.
    ///
    /// Returns as soon as the session is terminal or the sink refuses a
    /// commit. A channel established by a session that can no longer commit
    /// is released through the pipeline instead of being leaked.
    pub async fn run(self: Arc<Self>, pipeline: Arc<StagePipeline>, sink: Arc<dyn SessionSink>) {
        info!(session_id = %self.id, uaid = %self.agent.uaid, "verification session started");
        let mut inputs = StageInputs::new(Arc::clone(&self.agent));

        for stage in Stage::ALL {
            if !sink.commit(&self, Transition::Started(stage)) {
                debug!(session_id = %self.id, stage = %stage, "session superseded, stage not started");
                return;
            }
            debug!(session_id = %self.id, stage = %stage, label = stage.label(), "stage running");

            let output = match pipeline.execute(stage, &inputs).await {
                Ok(output) => output,
                Err(err) => {
                    warn!(
                        session_id = %self.id,
                        stage = %stage,
                        reason = %err.reason_code(),
                        error = %err,
                        "stage failed"
                    );
                    sink.commit(&self, Transition::Failed(Failure::from_error(stage, &err)));
                    return;
                }
            };

            let channel = match output {
                StageOutput::Channel(handle) => handle,
                intermediate => {
                    if !sink.commit(&self, Transition::Succeeded(stage)) {
                        debug!(session_id = %self.id, stage = %stage, "discarding late stage completion");
                        return;
                    }
                    inputs.absorb(intermediate);
                    continue;
                }
            };

            let evidence = match inputs.evidence(channel.clone()) {
                Ok(evidence) => evidence,
                Err(err) => {
                    pipeline.release_channel(&channel).await;
                    sink.commit(&self, Transition::Failed(Failure::from_error(stage, &err)));
                    return;
                }
            };

            if sink.commit(&self, Transition::Verified(evidence)) {
                info!(session_id = %self.id, uaid = %self.agent.uaid, "agent verified");
            } else {
                warn!(
                    session_id = %self.id,
                    channel_id = %channel.id,
                    "session superseded after channel was established, releasing it"
                );
                pipeline.release_channel(&channel).await;
            }
            return;
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use tokio::sync::Notify;

    use agentproof_contracts::{
        agent::AgentRecord,
        error::ReasonCode,
        event::{SessionEvent, SessionEventKind},
        outcome::{ChannelHandle, Evidence, Failure, ProofToken, SessionOutcome},
        stage::{Stage, StageStatus, StageTimeouts},
    };

    use crate::test_support::{eventually, Behaviour, Harness, Journal};

    use super::{SessionSink, Transition, VerificationSession};

    // ── Test sink ────────────────────────────────────────────────────────────

    /// Commits unconditionally and records every event, also noting each
    /// commit in the shared journal so it can be ordered against
    /// collaborator calls.
    struct CollectingSink {
        events: Mutex<Vec<SessionEvent>>,
        journal: Journal,
    }

    impl CollectingSink {
        fn new(journal: Journal) -> Arc<Self> {
            Arc::new(Self {
                events: Mutex::new(Vec::new()),
                journal,
            })
        }

        fn events(&self) -> Vec<SessionEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl SessionSink for CollectingSink {
        fn commit(&self, session: &VerificationSession, transition: Transition) -> bool {
            match session.apply(transition) {
                Ok(events) => {
                    for event in &events {
                        if let SessionEventKind::StageChanged { stage, status } = &event.kind {
                            self.journal
                                .lock()
                                .unwrap()
                                .push(format!("commit:{stage}:{status:?}"));
                        }
                    }
                    self.events.lock().unwrap().extend(events);
                    true
                }
                Err(_) => false,
            }
        }
    }

    fn session_for(uaid: &str) -> Arc<VerificationSession> {
        Arc::new(VerificationSession::new(
            Arc::new(AgentRecord::new(uaid, "selected").with_trust_score(87.0)),
            1,
        ))
    }

    fn position(journal: &[String], entry: &str) -> usize {
        journal
            .iter()
            .position(|e| e == entry)
            .unwrap_or_else(|| panic!("journal has no '{entry}': {journal:?}"))
    }

    // ── Pipeline runs ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_end_to_end_verified() {
        let harness = Harness::new();
        let sink = CollectingSink::new(harness.journal_handle());
        let session = session_for("did:hol:123");

        Arc::clone(&session)
            .run(Arc::new(harness.pipeline()), sink.clone())
            .await;

        match session.outcome() {
            Some(SessionOutcome::Verified(evidence)) => {
                assert_eq!(evidence.proof, ProofToken::new("T1"));
                assert_eq!(evidence.channel.id, "H1");
                assert_eq!(evidence.profile.registry.as_deref(), Some("hashgraph-online"));
                assert_eq!(evidence.trust_score, Some(87.0));
            }
            other => panic!("expected Verified, got {:?}", other),
        }

        let events = sink.events();
        assert_eq!(events.len(), 7, "six stage changes plus one terminal event");
        for (idx, event) in events.iter().enumerate() {
            assert_eq!(event.sequence, idx as u64);
            assert_eq!(event.session_id, session.id());
        }
        assert!(events.last().unwrap().is_terminal());
        assert!(events[..6].iter().all(|e| !e.is_terminal()));
    }

    /// Stage N+1's executor is only called after stage N committed Succeeded.
    #[tokio::test]
    async fn test_stage_ordering() {
        let harness = Harness::new();
        let sink = CollectingSink::new(harness.journal_handle());
        let session = session_for("did:hol:123");

        Arc::clone(&session)
            .run(Arc::new(harness.pipeline()), sink)
            .await;

        let journal = harness.journal();
        let resolved = position(&journal, "commit:resolve_profile:Succeeded");
        let verify_call = position(&journal, "verify:did:hol:123");
        let verified = position(&journal, "commit:verify_on_chain_identity:Succeeded");
        let establish_call = position(&journal, "establish:did:hol:123");

        assert!(resolved < verify_call);
        assert!(verify_call < verified);
        assert!(verified < establish_call);
    }

    #[tokio::test]
    async fn test_stage_one_failure_skips_remaining_stages() {
        let harness = Harness::new();
        let sink = CollectingSink::new(harness.journal_handle());
        let session = session_for("did:hol:unknown");

        Arc::clone(&session)
            .run(Arc::new(harness.pipeline()), sink.clone())
            .await;

        match session.outcome() {
            Some(SessionOutcome::Unverified(failure)) => {
                assert_eq!(failure.stage, Stage::ResolveProfile);
                assert_eq!(failure.reason, ReasonCode::ProfileNotFound);
            }
            other => panic!("expected Unverified, got {:?}", other),
        }

        assert_eq!(session.stage_status(Stage::ResolveProfile), StageStatus::Failed);
        assert_eq!(session.stage_status(Stage::VerifyOnChainIdentity), StageStatus::Pending);
        assert_eq!(session.stage_status(Stage::EstablishChannel), StageStatus::Pending);

        let calls: Vec<String> = harness
            .journal()
            .into_iter()
            .filter(|e| !e.starts_with("commit:"))
            .collect();
        assert_eq!(calls, vec!["resolve:did:hol:unknown".to_string()]);

        // Running, Failed, Terminal.
        assert_eq!(sink.events().len(), 3);
    }

    #[tokio::test]
    async fn test_snapshot_after_stage_one_failure() {
        let harness = Harness::new();
        let sink = CollectingSink::new(harness.journal_handle());
        let session = session_for("did:hol:unknown");

        Arc::clone(&session)
            .run(Arc::new(harness.pipeline()), sink)
            .await;
        let snapshot = session.snapshot();

        assert_eq!(snapshot.session_id, session.id());
        assert_eq!(snapshot.agent.uaid.as_str(), "did:hol:unknown");
        assert_eq!(
            snapshot.stages,
            vec![
                (Stage::ResolveProfile, StageStatus::Failed),
                (Stage::VerifyOnChainIdentity, StageStatus::Pending),
                (Stage::EstablishChannel, StageStatus::Pending),
            ]
        );
        assert_eq!(
            snapshot.outcome.and_then(|o| o.reason()),
            Some(ReasonCode::ProfileNotFound)
        );
        assert!(!snapshot.cancelled);
    }

    #[tokio::test]
    async fn test_handshake_failure_is_unverified() {
        let harness = Harness::new();
        harness.negotiator.set_behaviour(Behaviour::Fail(|| {
            agentproof_contracts::error::AgentProofError::HandshakeFailed {
                reason: "peer rejected key share".to_string(),
            }
        }));
        let session = session_for("did:hol:123");

        Arc::clone(&session)
            .run(
                Arc::new(harness.pipeline()),
                CollectingSink::new(harness.journal_handle()),
            )
            .await;

        assert_eq!(session.outcome().unwrap().reason(), Some(ReasonCode::HandshakeFailed));
        assert_eq!(session.stage_status(Stage::VerifyOnChainIdentity), StageStatus::Succeeded);
        assert_eq!(session.stage_status(Stage::EstablishChannel), StageStatus::Failed);
    }

    /// A never-resolving ledger call must end the session with Timeout.
    #[tokio::test]
    async fn test_timeout_reaches_terminal_state() {
        let harness = Harness::new();
        harness.verifier.set_behaviour(Behaviour::Hang);
        let pipeline = harness
            .pipeline()
            .with_timeouts(StageTimeouts::uniform(Duration::from_millis(50)));
        let session = session_for("did:hol:123");

        let run = Arc::clone(&session).run(
            Arc::new(pipeline),
            CollectingSink::new(harness.journal_handle()),
        );
        tokio::time::timeout(Duration::from_secs(2), run)
            .await
            .expect("session must not hang");

        match session.outcome() {
            Some(SessionOutcome::Unverified(failure)) => {
                assert_eq!(failure.stage, Stage::VerifyOnChainIdentity);
                assert_eq!(failure.reason, ReasonCode::Timeout);
            }
            other => panic!("expected Unverified(Timeout), got {:?}", other),
        }
    }

    /// Cancelling while the channel call is in flight: the late channel is
    /// released, and no Verified result ever appears.
    #[tokio::test]
    async fn test_cancel_discards_late_completion() {
        let harness = Harness::new();
        let gate = Arc::new(Notify::new());
        harness.negotiator.set_behaviour(Behaviour::WaitFor(Arc::clone(&gate)));
        let sink = CollectingSink::new(harness.journal_handle());
        let session = session_for("did:hol:123");

        let task = tokio::spawn(
            Arc::clone(&session).run(Arc::new(harness.pipeline()), sink.clone()),
        );
        eventually(|| session.stage_status(Stage::EstablishChannel) == StageStatus::Running).await;

        assert!(sink.commit(&session, Transition::Cancelled));
        gate.notify_one();
        task.await.unwrap();

        assert_eq!(session.outcome(), Some(SessionOutcome::Cancelled));
        assert!(session.is_cancelled());
        assert_eq!(harness.negotiator.released(), vec!["H1".to_string()]);

        let terminals: Vec<_> = sink.events().into_iter().filter(|e| e.is_terminal()).collect();
        assert_eq!(terminals.len(), 1);
        assert!(matches!(
            terminals[0].kind,
            SessionEventKind::Terminal(SessionOutcome::Cancelled)
        ));
    }

    // ── apply() invariants ───────────────────────────────────────────────────

    #[test]
    fn test_stage_cannot_start_before_predecessor_succeeds() {
        let session = session_for("did:hol:123");

        assert!(session.apply(Transition::Started(Stage::VerifyOnChainIdentity)).is_err());

        session.apply(Transition::Started(Stage::ResolveProfile)).unwrap();
        // Running is not enough; stage 1 must have succeeded.
        assert!(session.apply(Transition::Started(Stage::VerifyOnChainIdentity)).is_err());

        session.apply(Transition::Succeeded(Stage::ResolveProfile)).unwrap();
        assert!(session.apply(Transition::Started(Stage::VerifyOnChainIdentity)).is_ok());
    }

    #[test]
    fn test_stage_status_never_regresses() {
        let session = session_for("did:hol:123");
        session.apply(Transition::Started(Stage::ResolveProfile)).unwrap();
        session.apply(Transition::Succeeded(Stage::ResolveProfile)).unwrap();

        assert!(session.apply(Transition::Started(Stage::ResolveProfile)).is_err());
        assert!(session.apply(Transition::Succeeded(Stage::ResolveProfile)).is_err());
        assert_eq!(session.stage_status(Stage::ResolveProfile), StageStatus::Succeeded);
    }

    #[test]
    fn test_outcome_is_set_once() {
        let session = session_for("did:hol:123");
        session.apply(Transition::Started(Stage::ResolveProfile)).unwrap();
        session.apply(Transition::Cancelled).unwrap();

        let late = Failure {
            stage: Stage::ResolveProfile,
            reason: ReasonCode::RegistryUnavailable,
            message: "late".to_string(),
        };
        assert!(session.apply(Transition::Failed(late)).is_err());
        assert!(session.apply(Transition::Cancelled).is_err());
        assert_eq!(session.outcome(), Some(SessionOutcome::Cancelled));
    }

    #[test]
    fn test_final_stage_only_completes_through_verified() {
        let session = session_for("did:hol:123");
        for stage in [Stage::ResolveProfile, Stage::VerifyOnChainIdentity] {
            session.apply(Transition::Started(stage)).unwrap();
            session.apply(Transition::Succeeded(stage)).unwrap();
        }
        session.apply(Transition::Started(Stage::EstablishChannel)).unwrap();

        assert!(session.apply(Transition::Succeeded(Stage::EstablishChannel)).is_err());

        let evidence = Evidence {
            profile: AgentRecord::new("did:hol:123", "resolved"),
            proof: ProofToken::new("T1"),
            channel: ChannelHandle::new("H1", "fp"),
            trust_score: None,
        };
        let events = session.apply(Transition::Verified(evidence)).unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[1].is_terminal());
        assert!(session.is_terminal());
    }

    #[tokio::test]
    async fn test_wait_returns_terminal_outcome() {
        let session = session_for("did:hol:123");
        let waiter = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.wait().await })
        };

        session.apply(Transition::Cancelled).unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("wait must complete")
            .unwrap();
        assert_eq!(outcome, SessionOutcome::Cancelled);
    }
}
