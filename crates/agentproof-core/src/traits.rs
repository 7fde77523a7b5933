//! Collaborator traits at the edges of the verification pipeline.
//!
//! - `RegistryClient`: search and UAID resolution (external)
//! - `IdentityVerifier`: on-chain identity check (external)
//! - `ChannelNegotiator`: session-key negotiation and release (external)
//! - `AuditWriter`: append-only sink for delivered session events
//!
//! The three external collaborators are async and may take arbitrarily long;
//! the stage pipeline bounds every call with a timeout. None of them keep
//! per-session state, so a single instance serves every session.

use async_trait::async_trait;

use agentproof_contracts::{
    agent::{AgentRecord, SessionId, Uaid},
    error::AgentProofResult,
    event::SessionEvent,
    outcome::{ChannelHandle, ProofToken},
    search::SearchRequest,
};

/// The agent registry: free-text search and UAID-keyed resolution.
///
/// No caching is expected; every call is authoritative at call time.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Return at most `request.limit()` agents matching `request.query()`,
    /// in registry order.
    ///
    /// Fails with `RegistryUnavailable` on transport errors and `InvalidQuery`
    /// when the registry rejects the request.
    async fn search(&self, request: &SearchRequest) -> AgentProofResult<Vec<AgentRecord>>;

    /// Resolve `uaid` to a record with `registry` and `communication_protocol`
    /// populated.
    ///
    /// Fails with `UnknownAgent` if the UAID does not exist and
    /// `RegistryUnavailable` on transport errors.
    async fn resolve_uaid(&self, uaid: &Uaid) -> AgentProofResult<AgentRecord>;
}

/// Validates a resolved identity claim against its ledger record.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Return a signature-validity proof for `profile`.
    ///
    /// Fails with `SignatureInvalid` when the claim does not match the ledger
    /// anchor and `LedgerUnreachable` when the ledger cannot be queried.
    async fn verify_identity(&self, profile: &AgentRecord) -> AgentProofResult<ProofToken>;
}

/// Negotiates a session key with a verified agent.
///
/// This trait is the contract an encryption-establishment step must satisfy;
/// the runtime itself never touches key material.
#[async_trait]
pub trait ChannelNegotiator: Send + Sync {
    /// Negotiate a channel using the on-chain `proof`.
    ///
    /// Fails with `HandshakeFailed` when the agent rejects the negotiation.
    async fn establish(
        &self,
        profile: &AgentRecord,
        proof: &ProofToken,
    ) -> AgentProofResult<ChannelHandle>;

    /// Close a channel nobody will use.
    ///
    /// Called by the runtime for handles produced by a superseded session.
    /// Must be idempotent; releasing an unknown handle is a no-op.
    async fn release(&self, handle: &ChannelHandle);
}

/// The audit writer: the immutable record of delivered session events.
///
/// Only events that were actually delivered to subscribers reach the writer,
/// so late completions of superseded sessions never appear in the audit log.
/// A failed write is logged but never changes a session's outcome.
pub trait AuditWriter: Send + Sync {
    /// Append one session event to the log.
    fn write(&self, event: &SessionEvent) -> AgentProofResult<()>;

    /// Mark a session as finished in the audit log.
    ///
    /// Called once, right after the session's terminal event is written.
    fn finalize(&self, session_id: &SessionId) -> AgentProofResult<()>;
}
