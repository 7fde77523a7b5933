//! Hash-chain primitives.
//!
//! Hash input layout (bytes, in order):
//!   1. session id as its hyphenated UTF-8 string
//!   2. chain sequence as 8-byte little-endian
//!   3. prev_hash as UTF-8 bytes (64 ASCII hex chars)
//!   4. compact JSON of the session event

use sha2::{Digest, Sha256};

use agentproof_contracts::{
    agent::SessionId,
    error::{AgentProofError, AgentProofResult},
    event::SessionEvent,
};

use crate::entry::AuditEntry;

/// Compute the lowercase hex SHA-256 for one chain entry.
pub fn hash_entry(
    session_id: &SessionId,
    sequence: u64,
    event: &SessionEvent,
    prev_hash: &str,
) -> AgentProofResult<String> {
    let event_json = serde_json::to_vec(event).map_err(|e| AgentProofError::AuditWriteFailed {
        reason: format!("session event is not serializable: {}", e),
    })?;

    let mut hasher = Sha256::new();
    hasher.update(session_id.to_string().as_bytes());
    hasher.update(sequence.to_le_bytes());
    hasher.update(prev_hash.as_bytes());
    hasher.update(&event_json);

    Ok(hex::encode(hasher.finalize()))
}

/// Check linkage and hash correctness of every entry.
///
/// Sequences must run 0, 1, 2, … without gaps. An empty chain is valid.
pub fn verify_chain(entries: &[AuditEntry]) -> bool {
    let mut expected_prev = AuditEntry::GENESIS_HASH;

    for (position, entry) in entries.iter().enumerate() {
        if entry.sequence != position as u64 || entry.prev_hash != expected_prev {
            return false;
        }
        if entry.event.session_id != entry.session_id {
            return false;
        }
        match hash_entry(&entry.session_id, entry.sequence, &entry.event, &entry.prev_hash) {
            Ok(recomputed) if recomputed == entry.this_hash => {}
            _ => return false,
        }
        expected_prev = entry.this_hash.as_str();
    }

    true
}
