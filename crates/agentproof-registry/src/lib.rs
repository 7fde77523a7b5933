//! # agentproof-registry
//!
//! `RegistryClient` implementations:
//! - `HttpRegistryClient` talks to a registry broker over HTTP
//! - `InMemoryRegistry` holds a fixed directory, for demos and tests

pub mod http;
pub mod memory;

pub use http::HttpRegistryClient;
pub use memory::InMemoryRegistry;

use agentproof_contracts::{
    agent::{AgentRecord, Uaid, DEFAULT_PROTOCOL},
    error::{AgentProofError, AgentProofResult},
};

/// Reject a blank UAID before any lookup is attempted.
pub(crate) fn validate_uaid(uaid: &Uaid) -> AgentProofResult<()> {
    if uaid.as_str().trim().is_empty() {
        return Err(AgentProofError::InvalidQuery {
            reason: "uaid must not be empty".to_string(),
        });
    }
    Ok(())
}

/// Fill in the fields a resolved record must always carry.
pub(crate) fn complete_resolution(mut record: AgentRecord) -> AgentRecord {
    if record.communication_protocol.is_none() {
        record.communication_protocol = Some(DEFAULT_PROTOCOL.to_string());
    }
    record
}
