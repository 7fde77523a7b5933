//! Fictional registry directory used by the reference scenarios.
//!
//! | UAID                       | Name                     | Trait                   |
//! |----------------------------|--------------------------|-------------------------|
//! | `did:hol:123`              | Assistant Alpha          | verifies end to end     |
//! | `did:hol:456`              | Research Assistant Beta  | no advertised protocol  |
//! | `did:hol:789`              | Support Assistant Gamma  | refuses channels        |
//! | `did:hol:666`              | Impostor Assistant       | no ledger anchor        |
//! | `did:web:weather.example`  | Weather Oracle           | verifies end to end     |

use agentproof_contracts::agent::AgentRecord;

pub const HOL_REGISTRY: &str = "hashgraph-online";

/// Listed in the registry but never anchored on the ledger.
pub const UNANCHORED: &[&str] = &["did:hol:666"];

/// Verifiable on the ledger but rejecting every channel negotiation.
pub const REFUSES_CHANNELS: &[&str] = &["did:hol:789"];

pub fn seeded_agents() -> Vec<AgentRecord> {
    vec![
        AgentRecord::new("did:hol:123", "Assistant Alpha")
            .with_trust_score(87.0)
            .with_registry(HOL_REGISTRY)
            .with_protocol("A2A"),
        AgentRecord::new("did:hol:456", "Research Assistant Beta")
            .with_trust_score(64.0)
            .with_registry(HOL_REGISTRY),
        AgentRecord::new("did:hol:789", "Support Assistant Gamma")
            .with_trust_score(41.0)
            .with_registry(HOL_REGISTRY)
            .with_protocol("MCP"),
        AgentRecord::new("did:hol:666", "Impostor Assistant")
            .with_trust_score(12.0)
            .with_registry(HOL_REGISTRY),
        AgentRecord::new("did:web:weather.example", "Weather Oracle")
            .with_trust_score(73.0)
            .with_registry("web-registry")
            .with_protocol("A2A"),
    ]
}
