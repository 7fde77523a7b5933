//! Loopback channel negotiation.
//!
//! No key material leaves this module: a channel is an id plus the
//! fingerprint `sha256(proof ‖ nonce)`, truncated to 32 hex chars.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex, PoisonError,
    },
    time::Duration,
};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;

use agentproof_contracts::{
    agent::{AgentRecord, Uaid},
    error::{AgentProofError, AgentProofResult},
    outcome::{ChannelHandle, ProofToken},
};
use agentproof_core::traits::ChannelNegotiator;

use crate::simulate_latency;

#[derive(Debug, Default)]
pub struct LoopbackNegotiator {
    open: Mutex<HashMap<String, ChannelHandle>>,
    refused: Mutex<HashSet<Uaid>>,
    issued: AtomicU64,
    latency_ms: AtomicU64,
}

impl LoopbackNegotiator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every negotiation with `uaid` fail with `HandshakeFailed`.
    pub fn refuse(&self, uaid: &str) {
        self.refused
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(Uaid::new(uaid));
    }

    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Ids of channels established and not yet released, sorted.
    pub fn open_channels(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .open
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub fn is_open(&self, channel_id: &str) -> bool {
        self.open
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(channel_id)
    }
}

fn fingerprint(proof: &ProofToken, nonce: &Uuid) -> String {
    let mut hasher = Sha256::new();
    hasher.update(proof.as_str().as_bytes());
    hasher.update(nonce.as_bytes());
    hex::encode(&hasher.finalize()[..16])
}

#[async_trait]
impl ChannelNegotiator for LoopbackNegotiator {
    async fn establish(
        &self,
        profile: &AgentRecord,
        proof: &ProofToken,
    ) -> AgentProofResult<ChannelHandle> {
        simulate_latency(Duration::from_millis(self.latency_ms.load(Ordering::SeqCst))).await;

        let refused = self
            .refused
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&profile.uaid);
        if refused {
            return Err(AgentProofError::HandshakeFailed {
                reason: format!("{} rejected the key negotiation", profile.uaid),
            });
        }
        if proof.as_str().is_empty() {
            return Err(AgentProofError::HandshakeFailed {
                reason: "negotiation requires an on-chain proof".to_string(),
            });
        }

        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let handle = ChannelHandle::new(format!("chan-{n:04}"), fingerprint(proof, &Uuid::new_v4()));
        debug!(uaid = %profile.uaid, channel_id = %handle.id, protocol = profile.protocol(), "channel established");

        self.open
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handle.id.clone(), handle.clone());
        Ok(handle)
    }

    async fn release(&self, handle: &ChannelHandle) {
        let removed = self
            .open
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle.id);
        if removed.is_some() {
            debug!(channel_id = %handle.id, "channel released");
        }
    }
}
