//! # agentproof-sim
//!
//! Reference collaborators for the AgentProof runtime, and the scenarios the
//! demo binary runs on top of them.
//!
//! - `directory`: a fixed, fictional set of registry agents
//! - `ledger`: `AnchoredLedger`, an `IdentityVerifier` over SHA-256 anchors
//! - `negotiator`: `LoopbackNegotiator`, a `ChannelNegotiator` that tracks
//!   open channels
//! - `scenarios`: end-to-end, unknown agent, supersession and timeout runs
//!
//! Nothing here touches the network.

pub mod directory;
pub mod ledger;
pub mod negotiator;
pub mod scenarios;

use std::{sync::Arc, time::Duration};

use agentproof_core::{
    traits::{ChannelNegotiator, IdentityVerifier, RegistryClient},
    StagePipeline,
};
use agentproof_registry::InMemoryRegistry;

pub use ledger::AnchoredLedger;
pub use negotiator::LoopbackNegotiator;

/// The seeded directory wired to a ledger and negotiator that agree with it.
pub struct SimWorld {
    pub registry: Arc<InMemoryRegistry>,
    pub ledger: Arc<AnchoredLedger>,
    pub negotiator: Arc<LoopbackNegotiator>,
}

impl SimWorld {
    /// Every seeded agent is listed; all but the unanchored ones are anchored
    /// on the ledger, and the negotiator refuses the agents marked as such.
    pub fn seeded() -> Self {
        let agents = directory::seeded_agents();

        let ledger = AnchoredLedger::new();
        for agent in agents
            .iter()
            .filter(|a| !directory::UNANCHORED.contains(&a.uaid.as_str()))
        {
            ledger.anchor(agent);
        }

        let negotiator = LoopbackNegotiator::new();
        for uaid in directory::REFUSES_CHANNELS {
            negotiator.refuse(uaid);
        }

        Self {
            registry: Arc::new(InMemoryRegistry::with_agents(agents)),
            ledger: Arc::new(ledger),
            negotiator: Arc::new(negotiator),
        }
    }

    /// Delay every ledger and negotiator call by `latency`.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.ledger.set_latency(latency);
        self.negotiator.set_latency(latency);
        self
    }

    pub fn pipeline(&self) -> StagePipeline {
        StagePipeline::new(
            Arc::clone(&self.registry) as Arc<dyn RegistryClient>,
            Arc::clone(&self.ledger) as Arc<dyn IdentityVerifier>,
            Arc::clone(&self.negotiator) as Arc<dyn ChannelNegotiator>,
        )
    }
}

/// Sleep for `latency` unless it is zero.
pub(crate) async fn simulate_latency(latency: Duration) {
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
}
