//! In-memory `AuditWriter`.

use std::{
    collections::HashSet,
    sync::{Mutex, MutexGuard},
};

use chrono::Utc;
use tracing::{debug, info};

use agentproof_contracts::{
    agent::SessionId,
    error::{AgentProofError, AgentProofResult},
    event::SessionEvent,
};
use agentproof_core::traits::AuditWriter;

use crate::{
    chain::{hash_entry, verify_chain},
    entry::{AuditEntry, AuditLog},
};

#[derive(Debug)]
struct ChainState {
    entries: Vec<AuditEntry>,
    last_hash: String,
    finalized: Vec<SessionId>,
}

/// Append-only audit writer keeping the hash chain in a `Vec`.
///
/// One writer serves every session of a `SessionManager`. A session's entries
/// are frozen once it is finalized: further writes for it are refused with
/// `AuditWriteFailed`.
#[derive(Debug)]
pub struct InMemoryAuditWriter {
    state: Mutex<ChainState>,
}

impl Default for InMemoryAuditWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAuditWriter {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ChainState {
                entries: Vec::new(),
                last_hash: AuditEntry::GENESIS_HASH.to_string(),
                finalized: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> AgentProofResult<MutexGuard<'_, ChainState>> {
        self.state.lock().map_err(|e| AgentProofError::AuditWriteFailed {
            reason: format!("audit state lock poisoned: {}", e),
        })
    }

    /// Snapshot the chain. Returns an empty log if the lock is poisoned.
    pub fn export_log(&self) -> AuditLog {
        let (entries, finalized_sessions) = match self.lock() {
            Ok(state) => (state.entries.clone(), state.finalized.clone()),
            Err(_) => (Vec::new(), Vec::new()),
        };
        let terminal_hash = entries
            .last()
            .map(|e| e.this_hash.clone())
            .unwrap_or_default();

        AuditLog {
            entries,
            finalized_sessions,
            exported_at: Utc::now(),
            terminal_hash,
        }
    }

    /// Every recorded event of `session_id`, in emission order.
    pub fn events_for(&self, session_id: &SessionId) -> Vec<SessionEvent> {
        self.lock()
            .map(|state| {
                state
                    .entries
                    .iter()
                    .filter(|e| &e.session_id == session_id)
                    .map(|e| e.event.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_finalized(&self, session_id: &SessionId) -> bool {
        self.lock()
            .map(|state| state.finalized.contains(session_id))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.lock().map(|state| state.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn verify_integrity(&self) -> bool {
        self.lock()
            .map(|state| verify_chain(&state.entries))
            .unwrap_or(false)
    }
}

impl AuditWriter for InMemoryAuditWriter {
    fn write(&self, event: &SessionEvent) -> AgentProofResult<()> {
        let mut state = self.lock()?;
        if state.finalized.contains(&event.session_id) {
            return Err(AgentProofError::AuditWriteFailed {
                reason: format!("session {} is already finalized", event.session_id),
            });
        }

        let sequence = state.entries.len() as u64;
        let prev_hash = state.last_hash.clone();
        let this_hash = hash_entry(&event.session_id, sequence, event, &prev_hash)?;

        debug!(session_id = %event.session_id, sequence, "audit entry appended");
        state.entries.push(AuditEntry {
            sequence,
            session_id: event.session_id,
            event: event.clone(),
            prev_hash,
            this_hash: this_hash.clone(),
        });
        state.last_hash = this_hash;
        Ok(())
    }

    fn finalize(&self, session_id: &SessionId) -> AgentProofResult<()> {
        let mut state = self.lock()?;
        if state.finalized.contains(session_id) {
            return Err(AgentProofError::AuditWriteFailed {
                reason: format!("session {} finalized twice", session_id),
            });
        }
        state.finalized.push(*session_id);

        let sessions: HashSet<&SessionId> = state.entries.iter().map(|e| &e.session_id).collect();
        info!(
            session_id = %session_id,
            chain_length = state.entries.len(),
            sessions = sessions.len(),
            terminal_hash = %state.last_hash,
            "session audit finalized"
        );
        Ok(())
    }
}
