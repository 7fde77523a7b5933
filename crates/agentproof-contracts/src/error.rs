//! Error taxonomy for the AgentProof verification pipeline.
//!
//! Every fallible operation returns `AgentProofResult<T>`. Stage-level errors
//! are never retried inside the runtime: they become the session's
//! `Unverified` failure, tagged with the `ReasonCode` from `reason_code()`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The unified error type for the AgentProof runtime.
#[derive(Debug, Error)]
pub enum AgentProofError {
    /// A search request was malformed (empty query, zero limit) or rejected
    /// by the registry as invalid.
    #[error("invalid query: {reason}")]
    InvalidQuery { reason: String },

    /// The registry could not be reached or returned an unusable response.
    #[error("registry unavailable: {reason}")]
    RegistryUnavailable { reason: String },

    /// The registry has no agent with this UAID.
    #[error("unknown agent '{uaid}'")]
    UnknownAgent { uaid: String },

    /// Profile resolution failed because the agent does not exist.
    #[error("profile not found for '{uaid}'")]
    ProfileNotFound { uaid: String },

    /// The ledger record does not match the agent's identity claim.
    #[error("signature invalid: {reason}")]
    SignatureInvalid { reason: String },

    /// The on-chain verifier could not reach the ledger.
    #[error("ledger unreachable: {reason}")]
    LedgerUnreachable { reason: String },

    /// Session-key negotiation with the agent failed.
    #[error("channel handshake failed: {reason}")]
    HandshakeFailed { reason: String },

    /// An external call exceeded its bounded wait.
    #[error("{operation} timed out after {after_ms} ms")]
    Timeout { operation: String, after_ms: u64 },

    /// The session was superseded before it reached a result.
    #[error("session {session_id} was cancelled")]
    Cancelled { session_id: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },

    /// The audit writer could not append a session event.
    #[error("audit write failed: {reason}")]
    AuditWriteFailed { reason: String },

    /// The session state machine was asked to perform an illegal transition.
    #[error("state machine error: {reason}")]
    StateMachineError { reason: String },
}

impl AgentProofError {
    /// The stable reason code reported in terminal session results.
    pub fn reason_code(&self) -> ReasonCode {
        match self {
            Self::InvalidQuery { .. } => ReasonCode::InvalidQuery,
            Self::RegistryUnavailable { .. } => ReasonCode::RegistryUnavailable,
            Self::UnknownAgent { .. } => ReasonCode::UnknownAgent,
            Self::ProfileNotFound { .. } => ReasonCode::ProfileNotFound,
            Self::SignatureInvalid { .. } => ReasonCode::SignatureInvalid,
            Self::LedgerUnreachable { .. } => ReasonCode::LedgerUnreachable,
            Self::HandshakeFailed { .. } => ReasonCode::HandshakeFailed,
            Self::Timeout { .. } => ReasonCode::Timeout,
            Self::Cancelled { .. } => ReasonCode::Cancelled,
            Self::ConfigError { .. } => ReasonCode::ConfigError,
            Self::AuditWriteFailed { .. } => ReasonCode::AuditWriteFailed,
            Self::StateMachineError { .. } => ReasonCode::StateMachineError,
        }
    }
}

/// Machine-readable reason attached to every terminal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    InvalidQuery,
    RegistryUnavailable,
    UnknownAgent,
    ProfileNotFound,
    SignatureInvalid,
    LedgerUnreachable,
    HandshakeFailed,
    Timeout,
    Cancelled,
    ConfigError,
    AuditWriteFailed,
    StateMachineError,
}

impl ReasonCode {
    /// Snake-case code as it appears in serialized results and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidQuery => "invalid_query",
            Self::RegistryUnavailable => "registry_unavailable",
            Self::UnknownAgent => "unknown_agent",
            Self::ProfileNotFound => "profile_not_found",
            Self::SignatureInvalid => "signature_invalid",
            Self::LedgerUnreachable => "ledger_unreachable",
            Self::HandshakeFailed => "handshake_failed",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::ConfigError => "config_error",
            Self::AuditWriteFailed => "audit_write_failed",
            Self::StateMachineError => "state_machine_error",
        }
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Convenience alias used throughout the AgentProof crates.
pub type AgentProofResult<T> = Result<T, AgentProofError>;
