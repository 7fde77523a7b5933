//! Scenario 2: an agent the registry has never heard of.
//!
//! Resolution fails with `ProfileNotFound`; the ledger and negotiator are
//! never called.

use agentproof_contracts::{
    agent::AgentRecord, error::AgentProofResult, outcome::SessionOutcome, stage::StageTimeouts,
};

use crate::{scenarios::verify_single, SimWorld};

pub async fn run_scenario(timeouts: StageTimeouts) -> AgentProofResult<SessionOutcome> {
    println!("=== Scenario 2: Unknown agent ===");
    println!();

    let world = SimWorld::seeded();
    let stranger = AgentRecord::new("did:hol:000", "Unlisted Agent");

    let (outcome, _audit) = verify_single(world.pipeline().with_timeouts(timeouts), stranger).await?;
    println!("  Open channels:          {:?}", world.negotiator.open_channels());
    println!("  Scenario 2 complete.");
    println!();
    Ok(outcome)
}
