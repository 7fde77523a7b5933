//! Scenario 1: search, select, verify.
//!
//! Searches the seeded directory for "assistant", selects Assistant Alpha and
//! walks all three stages to a `Verified` outcome carrying the profile, the
//! ledger proof, the channel handle and the registry trust score.

use std::time::Duration;

use agentproof_audit::InMemoryAuditWriter;
use agentproof_contracts::{
    error::{AgentProofError, AgentProofResult},
    outcome::SessionOutcome,
    stage::StageTimeouts,
};
use agentproof_core::SessionManager;

use crate::{scenarios::verify_single, SimWorld};

/// Per-call delay on the ledger and negotiator, so stages are visible.
pub const STAGE_LATENCY: Duration = Duration::from_millis(150);

const SELECTED: &str = "did:hol:123";

/// Run with `timeouts` bounding each stage.
pub async fn run_scenario(timeouts: StageTimeouts) -> AgentProofResult<SessionOutcome> {
    println!("=== Scenario 1: End-to-end verification ===");
    println!();

    let world = SimWorld::seeded().with_latency(STAGE_LATENCY);

    // Search runs through its own manager so its result list is independent
    // of the verification below.
    let searcher = SessionManager::new(world.pipeline());
    let hits = searcher.search("assistant", 5).await?;
    println!("  Search \"assistant\" returned {} agent(s):", hits.len());
    for hit in &hits {
        println!(
            "    {:<26} {:<26} trust {}",
            hit.uaid,
            hit.name,
            hit.trust_score.map(|t| t.to_string()).unwrap_or_else(|| "n/a".to_string())
        );
    }
    println!();

    let selected = hits
        .into_iter()
        .find(|a| a.uaid.as_str() == SELECTED)
        .ok_or_else(|| AgentProofError::UnknownAgent {
            uaid: SELECTED.to_string(),
        })?;

    let (outcome, audit) = verify_single(world.pipeline().with_timeouts(timeouts), selected).await?;
    report_open_channels(&world, &audit);
    println!("  Scenario 1 complete.");
    println!();
    Ok(outcome)
}

fn report_open_channels(world: &SimWorld, audit: &InMemoryAuditWriter) {
    println!(
        "  Open channels:          {:?} ({} audited event(s))",
        world.negotiator.open_channels(),
        audit.len()
    );
}
