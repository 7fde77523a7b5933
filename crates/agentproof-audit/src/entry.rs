//! Audit entry and exported log types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use agentproof_contracts::{agent::SessionId, event::SessionEvent};

/// One link in the audit hash chain.
///
/// The chain is global: entries from every session share one sequence and
/// each entry commits to the one before it, whichever session wrote it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Position in the chain, starting at 0.
    pub sequence: u64,
    pub session_id: SessionId,
    /// The delivered session event, as subscribers saw it.
    pub event: SessionEvent,
    /// `this_hash` of the previous entry, or `GENESIS_HASH`.
    pub prev_hash: String,
    /// Lowercase hex SHA-256 of this entry, see `chain::hash_entry`.
    pub this_hash: String,
}

impl AuditEntry {
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}

/// A snapshot of the whole chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog {
    pub entries: Vec<AuditEntry>,
    /// Sessions whose terminal event has been written, in finalize order.
    pub finalized_sessions: Vec<SessionId>,
    pub exported_at: DateTime<Utc>,
    /// `this_hash` of the last entry; empty when the chain is empty.
    pub terminal_hash: String,
}
