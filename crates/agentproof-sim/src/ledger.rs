//! A ledger of identity anchors.
//!
//! Each anchor is `sha256(uaid ‖ 0x00 ‖ registry)`. A profile verifies when
//! the digest of its own claim matches the anchor recorded for its UAID; the
//! proof token is `proof-` followed by the first 16 hex chars of the digest.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Mutex, PoisonError,
    },
    time::Duration,
};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use agentproof_contracts::{
    agent::{AgentRecord, Uaid},
    error::{AgentProofError, AgentProofResult},
    outcome::ProofToken,
};
use agentproof_core::traits::IdentityVerifier;

use crate::simulate_latency;

/// Hex SHA-256 anchor for a (uaid, registry) claim.
pub fn anchor_digest(uaid: &Uaid, registry: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(uaid.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(registry.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Default)]
pub struct AnchoredLedger {
    anchors: Mutex<HashMap<Uaid, String>>,
    offline: AtomicBool,
    latency_ms: AtomicU64,
}

impl AnchoredLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Anchor the claim `agent` makes today.
    pub fn anchor(&self, agent: &AgentRecord) {
        self.anchor_claim(&agent.uaid, agent.registry.as_deref().unwrap_or_default());
    }

    /// Record an anchor for an arbitrary claim, replacing any previous one.
    pub fn anchor_claim(&self, uaid: &Uaid, registry: &str) {
        self.anchors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(uaid.clone(), anchor_digest(uaid, registry));
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms.load(Ordering::SeqCst))
    }
}

#[async_trait]
impl IdentityVerifier for AnchoredLedger {
    async fn verify_identity(&self, profile: &AgentRecord) -> AgentProofResult<ProofToken> {
        simulate_latency(self.latency()).await;

        if self.offline.load(Ordering::SeqCst) {
            return Err(AgentProofError::LedgerUnreachable {
                reason: "ledger node is offline".to_string(),
            });
        }

        let registry = profile
            .registry
            .as_deref()
            .ok_or_else(|| AgentProofError::SignatureInvalid {
                reason: format!("profile {} carries no registry claim", profile.uaid),
            })?;

        let anchored = self
            .anchors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&profile.uaid)
            .cloned()
            .ok_or_else(|| AgentProofError::SignatureInvalid {
                reason: format!("no ledger anchor for {}", profile.uaid),
            })?;

        let claimed = anchor_digest(&profile.uaid, registry);
        if claimed != anchored {
            warn!(uaid = %profile.uaid, registry, "identity claim does not match ledger anchor");
            return Err(AgentProofError::SignatureInvalid {
                reason: format!("claim for {} does not match its ledger anchor", profile.uaid),
            });
        }

        debug!(uaid = %profile.uaid, "identity anchored on ledger");
        Ok(ProofToken::new(format!("proof-{}", &claimed[..16])))
    }
}

#[cfg(test)]
mod tests {
    use agentproof_contracts::{
        agent::{AgentRecord, Uaid},
        error::ReasonCode,
    };
    use agentproof_core::traits::IdentityVerifier;

    use super::{anchor_digest, AnchoredLedger};

    fn alpha() -> AgentRecord {
        AgentRecord::new("did:hol:123", "Assistant Alpha").with_registry("hashgraph-online")
    }

    #[tokio::test]
    async fn test_matching_claim_yields_proof() {
        let ledger = AnchoredLedger::new();
        ledger.anchor(&alpha());

        let proof = ledger.verify_identity(&alpha()).await.unwrap();
        let digest = anchor_digest(&Uaid::new("did:hol:123"), "hashgraph-online");

        assert_eq!(proof.as_str(), format!("proof-{}", &digest[..16]));
        // Deterministic across calls.
        assert_eq!(ledger.verify_identity(&alpha()).await.unwrap(), proof);
    }

    #[tokio::test]
    async fn test_claim_from_other_registry_is_signature_invalid() {
        let ledger = AnchoredLedger::new();
        ledger.anchor(&alpha());

        let forged = alpha().with_registry("evil-registry");
        let err = ledger.verify_identity(&forged).await.unwrap_err();
        assert_eq!(err.reason_code(), ReasonCode::SignatureInvalid);
    }

    #[tokio::test]
    async fn test_unanchored_or_unresolved_profile_is_signature_invalid() {
        let ledger = AnchoredLedger::new();
        let err = ledger.verify_identity(&alpha()).await.unwrap_err();
        assert_eq!(err.reason_code(), ReasonCode::SignatureInvalid);

        ledger.anchor(&alpha());
        let bare = AgentRecord::new("did:hol:123", "Assistant Alpha");
        let err = ledger.verify_identity(&bare).await.unwrap_err();
        assert_eq!(err.reason_code(), ReasonCode::SignatureInvalid);
    }

    #[tokio::test]
    async fn test_offline_ledger_is_unreachable() {
        let ledger = AnchoredLedger::new();
        ledger.anchor(&alpha());
        ledger.set_offline(true);

        let err = ledger.verify_identity(&alpha()).await.unwrap_err();
        assert_eq!(err.reason_code(), ReasonCode::LedgerUnreachable);
    }

    #[test]
    fn test_anchor_digest_separates_fields() {
        let a = anchor_digest(&Uaid::new("did:hol:1"), "23");
        let b = anchor_digest(&Uaid::new("did:hol:12"), "3");
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
    }
}
