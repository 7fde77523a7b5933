//! Stage outputs and terminal session outcomes.
//!
//! A session ends in exactly one `SessionOutcome`. `Verified` carries the
//! evidence gathered by all three stages; `Unverified` carries the failing
//! stage and its reason code; `Cancelled` means the session was superseded.

use serde::{Deserialize, Serialize};

use crate::{
    agent::AgentRecord,
    error::{AgentProofError, ReasonCode},
    stage::Stage,
};

/// Signature-validity proof returned by the on-chain verifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProofToken(pub String);

impl ProofToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// An established channel to the verified agent.
///
/// Whoever receives a handle owns it: a handle that reaches a `Verified`
/// outcome belongs to the caller, and a handle produced by a superseded
/// session is released by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelHandle {
    /// Negotiator-assigned handle id.
    pub id: String,
    /// Fingerprint of the negotiated session key. Never the key itself.
    pub key_fingerprint: String,
}

impl ChannelHandle {
    pub fn new(id: impl Into<String>, key_fingerprint: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            key_fingerprint: key_fingerprint.into(),
        }
    }
}

/// Everything a successful verification produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// The resolved (augmented) agent record.
    pub profile: AgentRecord,
    /// Proof token from the on-chain identity check.
    pub proof: ProofToken,
    /// Handle for the established channel.
    pub channel: ChannelHandle,
    /// Search-time trust score, reported as-is and not validated.
    pub trust_score: Option<f64>,
}

/// Why a session ended `Unverified`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    /// The stage whose executor failed.
    pub stage: Stage,
    /// Machine-readable reason.
    pub reason: ReasonCode,
    /// Human-readable detail from the underlying error.
    pub message: String,
}

impl Failure {
    /// Capture a stage error unmodified.
    pub fn from_error(stage: Stage, error: &AgentProofError) -> Self {
        Self {
            stage,
            reason: error.reason_code(),
            message: error.to_string(),
        }
    }
}

/// The terminal result of a verification session. Set at most once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SessionOutcome {
    Verified(Evidence),
    Unverified(Failure),
    Cancelled,
}

impl SessionOutcome {
    pub fn is_verified(&self) -> bool {
        matches!(self, SessionOutcome::Verified(_))
    }

    /// The reason code for non-verified outcomes.
    pub fn reason(&self) -> Option<ReasonCode> {
        match self {
            SessionOutcome::Verified(_) => None,
            SessionOutcome::Unverified(failure) => Some(failure.reason),
            SessionOutcome::Cancelled => Some(ReasonCode::Cancelled),
        }
    }
}
