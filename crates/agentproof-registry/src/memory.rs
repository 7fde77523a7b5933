//! A registry held entirely in memory.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex, PoisonError,
};

use async_trait::async_trait;
use tracing::debug;

use agentproof_contracts::{
    agent::{AgentRecord, Uaid},
    error::{AgentProofError, AgentProofResult},
    search::SearchRequest,
};
use agentproof_core::traits::RegistryClient;

use crate::{complete_resolution, validate_uaid};

/// Deterministic `RegistryClient` over a fixed directory.
///
/// Search is a case-insensitive substring match on name and UAID, returned
/// in insertion order. Hits carry identity and trust score only; provenance
/// fields are filled by `resolve_uaid`. Flip `set_unavailable` to make every call fail with
/// `RegistryUnavailable`.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    agents: Mutex<Vec<AgentRecord>>,
    unavailable: AtomicBool,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_agents(agents: impl IntoIterator<Item = AgentRecord>) -> Self {
        let registry = Self::new();
        for agent in agents {
            registry.insert(agent);
        }
        registry
    }

    /// Add `agent`, replacing any record with the same UAID in place.
    pub fn insert(&self, agent: AgentRecord) {
        let mut agents = self.agents.lock().unwrap_or_else(PoisonError::into_inner);
        match agents.iter_mut().find(|a| a.uaid == agent.uaid) {
            Some(existing) => *existing = agent,
            None => agents.push(agent),
        }
    }

    pub fn len(&self) -> usize {
        self.agents.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> AgentProofResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AgentProofError::RegistryUnavailable {
                reason: "in-memory registry switched offline".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RegistryClient for InMemoryRegistry {
    async fn search(&self, request: &SearchRequest) -> AgentProofResult<Vec<AgentRecord>> {
        self.check_available()?;
        let needle = request.query().to_lowercase();
        let hits: Vec<AgentRecord> = self
            .agents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|a| {
                a.name.to_lowercase().contains(&needle)
                    || a.uaid.as_str().to_lowercase().contains(&needle)
            })
            .take(request.limit() as usize)
            .map(|a| AgentRecord {
                registry: None,
                communication_protocol: None,
                ..a.clone()
            })
            .collect();
        debug!(query = %request.query(), hits = hits.len(), "in-memory search");
        Ok(hits)
    }

    async fn resolve_uaid(&self, uaid: &Uaid) -> AgentProofResult<AgentRecord> {
        validate_uaid(uaid)?;
        self.check_available()?;
        let record = self
            .agents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|a| &a.uaid == uaid)
            .cloned()
            .ok_or_else(|| AgentProofError::UnknownAgent {
                uaid: uaid.to_string(),
            })?;
        Ok(complete_resolution(record))
    }
}
