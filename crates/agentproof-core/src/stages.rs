//! Stage executors and the uniform stage pipeline.
//!
//! Each executor is a free async function of its inputs with no shared
//! mutable state. `StagePipeline` dispatches a `Stage` to its executor and
//! bounds the call:
//!
//!   ResolveProfile        (agent)          → AgentRecord   [registry]
//!   VerifyOnChainIdentity (profile)        → ProofToken    [ledger]
//!   EstablishChannel      (profile, proof) → ChannelHandle [negotiator]
//!
//! Executors never retry. A failure, including `Timeout`, is returned to the
//! session, which ends `Unverified`.

use std::{sync::Arc, time::Duration};

use tracing::{debug, warn};

use agentproof_contracts::{
    agent::AgentRecord,
    error::{AgentProofError, AgentProofResult},
    outcome::{ChannelHandle, Evidence, ProofToken},
    stage::{Stage, StageTimeouts},
};

use crate::traits::{ChannelNegotiator, IdentityVerifier, RegistryClient};

/// What a successful stage produced.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutput {
    Profile(AgentRecord),
    Proof(ProofToken),
    Channel(ChannelHandle),
}

/// Inputs accumulated as a session advances through its stages.
///
/// Starts with the selected agent and absorbs each stage's output, so the
/// next stage always finds what it depends on.
#[derive(Debug, Clone)]
pub struct StageInputs {
    agent: Arc<AgentRecord>,
    profile: Option<AgentRecord>,
    proof: Option<ProofToken>,
}

impl StageInputs {
    pub fn new(agent: Arc<AgentRecord>) -> Self {
        Self {
            agent,
            profile: None,
            proof: None,
        }
    }

    /// Record a stage output for the stages that follow.
    ///
    /// Channel handles finish a session rather than feed a later stage, so
    /// they are not kept here.
    pub fn absorb(&mut self, output: StageOutput) {
        match output {
            StageOutput::Profile(profile) => self.profile = Some(profile),
            StageOutput::Proof(proof) => self.proof = Some(proof),
            StageOutput::Channel(_) => {}
        }
    }

    /// Assemble the evidence for a fully verified agent.
    pub fn evidence(&self, channel: ChannelHandle) -> AgentProofResult<Evidence> {
        let profile = self.profile.clone().ok_or_else(|| missing("resolved profile"))?;
        let proof = self.proof.clone().ok_or_else(|| missing("proof token"))?;
        Ok(Evidence {
            profile,
            proof,
            channel,
            trust_score: self.agent.trust_score,
        })
    }
}

fn missing(what: &str) -> AgentProofError {
    AgentProofError::StateMachineError {
        reason: format!("{what} is not available to this stage"),
    }
}

// ── Executors ─────────────────────────────────────────────────────────────────

/// Stage 1: resolve the selected agent's UAID.
///
/// `UnknownAgent` from the registry surfaces as `ProfileNotFound`; every other
/// error passes through unmodified.
pub async fn resolve_profile(
    registry: &dyn RegistryClient,
    agent: &AgentRecord,
) -> AgentProofResult<AgentRecord> {
    match registry.resolve_uaid(&agent.uaid).await {
        Ok(profile) => Ok(profile),
        Err(AgentProofError::UnknownAgent { uaid }) => {
            Err(AgentProofError::ProfileNotFound { uaid })
        }
        Err(other) => Err(other),
    }
}

/// Stage 2: submit the resolved identity claim to the on-chain verifier.
pub async fn verify_on_chain_identity(
    verifier: &dyn IdentityVerifier,
    profile: &AgentRecord,
) -> AgentProofResult<ProofToken> {
    verifier.verify_identity(profile).await
}

/// Stage 3: negotiate a session key using the proof from stage 2.
pub async fn establish_channel(
    negotiator: &dyn ChannelNegotiator,
    profile: &AgentRecord,
    proof: &ProofToken,
) -> AgentProofResult<ChannelHandle> {
    negotiator.establish(profile, proof).await
}

// ── Pipeline ──────────────────────────────────────────────────────────────────

/// The three external collaborators plus the per-stage bounds.
///
/// One pipeline is shared by every session a `SessionManager` creates.
pub struct StagePipeline {
    registry: Arc<dyn RegistryClient>,
    verifier: Arc<dyn IdentityVerifier>,
    negotiator: Arc<dyn ChannelNegotiator>,
    timeouts: StageTimeouts,
}

impl StagePipeline {
    /// Create a pipeline with the default 5 s bound on every stage.
    pub fn new(
        registry: Arc<dyn RegistryClient>,
        verifier: Arc<dyn IdentityVerifier>,
        negotiator: Arc<dyn ChannelNegotiator>,
    ) -> Self {
        Self {
            registry,
            verifier,
            negotiator,
            timeouts: StageTimeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: StageTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn registry(&self) -> &Arc<dyn RegistryClient> {
        &self.registry
    }

    /// Run `stage` against `inputs`, bounded by the stage's timeout.
    ///
    /// An elapsed bound yields `AgentProofError::Timeout`. The abandoned call
    /// is dropped; it is not retried.
    pub async fn execute(
        &self,
        stage: Stage,
        inputs: &StageInputs,
    ) -> AgentProofResult<StageOutput> {
        let bound = self.timeouts.for_stage(stage);
        debug!(stage = %stage, bound_ms = bound.as_millis() as u64, "executing stage");

        match tokio::time::timeout(bound, self.dispatch(stage, inputs)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(timeout_error(stage, bound)),
        }
    }

    /// Close a channel whose session can no longer use it.
    ///
    /// Channel handles are the only stage output that owns an external
    /// resource. The release is bounded by the channel stage's timeout; a
    /// negotiator that does not answer in time is abandoned.
    pub async fn release_channel(&self, handle: &ChannelHandle) {
        let bound = self.timeouts.establish_channel;
        debug!(channel_id = %handle.id, "releasing discarded channel");
        if tokio::time::timeout(bound, self.negotiator.release(handle))
            .await
            .is_err()
        {
            warn!(
                channel_id = %handle.id,
                bound_ms = bound.as_millis() as u64,
                "channel release timed out"
            );
        }
    }

    async fn dispatch(&self, stage: Stage, inputs: &StageInputs) -> AgentProofResult<StageOutput> {
        match stage {
            Stage::ResolveProfile => resolve_profile(self.registry.as_ref(), &inputs.agent)
                .await
                .map(StageOutput::Profile),
            Stage::VerifyOnChainIdentity => {
                let profile = inputs.profile.as_ref().ok_or_else(|| missing("resolved profile"))?;
                verify_on_chain_identity(self.verifier.as_ref(), profile)
                    .await
                    .map(StageOutput::Proof)
            }
            Stage::EstablishChannel => {
                let profile = inputs.profile.as_ref().ok_or_else(|| missing("resolved profile"))?;
                let proof = inputs.proof.as_ref().ok_or_else(|| missing("proof token"))?;
                establish_channel(self.negotiator.as_ref(), profile, proof)
                    .await
                    .map(StageOutput::Channel)
            }
        }
    }
}

fn timeout_error(stage: Stage, bound: Duration) -> AgentProofError {
    AgentProofError::Timeout {
        operation: stage.to_string(),
        after_ms: bound.as_millis() as u64,
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use agentproof_contracts::{
        agent::AgentRecord,
        error::{AgentProofError, ReasonCode},
        outcome::{ChannelHandle, ProofToken},
        stage::{Stage, StageTimeouts},
    };

    use crate::test_support::{Behaviour, Harness};

    use super::{StageInputs, StageOutput};

    fn inputs_for(uaid: &str) -> StageInputs {
        StageInputs::new(Arc::new(AgentRecord::new(uaid, "test").with_trust_score(90.0)))
    }

    #[tokio::test]
    async fn resolve_maps_unknown_agent_to_profile_not_found() {
        let harness = Harness::new();
        let pipeline = harness.pipeline();

        let err = pipeline
            .execute(Stage::ResolveProfile, &inputs_for("did:hol:unknown"))
            .await
            .unwrap_err();

        assert_eq!(err.reason_code(), ReasonCode::ProfileNotFound);
    }

    #[tokio::test]
    async fn resolve_passes_registry_unavailable_through() {
        let harness = Harness::new();
        harness.registry.set_behaviour(Behaviour::Fail(|| AgentProofError::RegistryUnavailable {
            reason: "connection refused".to_string(),
        }));

        let err = harness
            .pipeline()
            .execute(Stage::ResolveProfile, &inputs_for("did:hol:123"))
            .await
            .unwrap_err();

        assert_eq!(err.reason_code(), ReasonCode::RegistryUnavailable);
    }

    #[tokio::test]
    async fn resolve_returns_augmented_record() {
        let harness = Harness::new();
        let output = harness
            .pipeline()
            .execute(Stage::ResolveProfile, &inputs_for("did:hol:123"))
            .await
            .unwrap();

        match output {
            StageOutput::Profile(profile) => {
                assert_eq!(profile.uaid.as_str(), "did:hol:123");
                assert!(profile.is_resolved());
            }
            other => panic!("expected Profile, got {:?}", other),
        }
    }

    /// A collaborator that never answers must surface as Timeout, not a hang.
    #[tokio::test]
    async fn never_resolving_call_times_out() {
        let harness = Harness::new();
        harness.verifier.set_behaviour(Behaviour::Hang);
        let pipeline = harness
            .pipeline()
            .with_timeouts(StageTimeouts::uniform(Duration::from_millis(50)));

        let mut inputs = inputs_for("did:hol:123");
        inputs.absorb(StageOutput::Profile(harness.registry.profile("did:hol:123")));

        let err = pipeline
            .execute(Stage::VerifyOnChainIdentity, &inputs)
            .await
            .unwrap_err();

        match err {
            AgentProofError::Timeout { operation, after_ms } => {
                assert_eq!(operation, "verify_on_chain_identity");
                assert_eq!(after_ms, 50);
            }
            other => panic!("expected Timeout, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn later_stage_without_inputs_is_a_state_machine_error() {
        let harness = Harness::new();
        let err = harness
            .pipeline()
            .execute(Stage::EstablishChannel, &inputs_for("did:hol:123"))
            .await
            .unwrap_err();

        assert_eq!(err.reason_code(), ReasonCode::StateMachineError);
        // The negotiator was never consulted.
        assert!(harness.journal().is_empty());
    }

    #[tokio::test]
    async fn releasing_a_channel_reaches_the_negotiator() {
        let harness = Harness::new();
        let handle = ChannelHandle::new("H9", "fp");

        harness.pipeline().release_channel(&handle).await;

        assert_eq!(harness.negotiator.released(), vec!["H9".to_string()]);
    }

    #[tokio::test]
    async fn stalled_release_is_abandoned_after_the_channel_bound() {
        let harness = Harness::new();
        harness.negotiator.stall_release();
        let pipeline = harness
            .pipeline()
            .with_timeouts(StageTimeouts::uniform(Duration::from_millis(50)));

        let started = tokio::time::Instant::now();
        tokio::time::timeout(
            Duration::from_secs(2),
            pipeline.release_channel(&ChannelHandle::new("H9", "fp")),
        )
        .await
        .expect("release_channel must return once its bound elapses");

        assert!(started.elapsed() >= Duration::from_millis(50));
        assert!(harness.negotiator.released().is_empty());
    }

    #[test]
    fn evidence_carries_search_time_trust_score() {
        let mut inputs = inputs_for("did:hol:123");
        inputs.absorb(StageOutput::Profile(AgentRecord::new("did:hol:123", "resolved")));
        inputs.absorb(StageOutput::Proof(ProofToken::new("T1")));

        let evidence = inputs.evidence(ChannelHandle::new("H1", "fp")).unwrap();

        assert_eq!(evidence.trust_score, Some(90.0));
        assert_eq!(evidence.proof, ProofToken::new("T1"));
        assert_eq!(evidence.profile.name, "resolved");
    }
}
