//! Scenario 4: a negotiator that answers too slowly.
//!
//! Every stage is bounded at 100 ms while the negotiator takes 400 ms, so
//! the session fails at `EstablishChannel` with `Timeout`.

use std::time::Duration;

use agentproof_contracts::{
    agent::Uaid, error::AgentProofResult, outcome::SessionOutcome, stage::StageTimeouts,
};
use agentproof_core::traits::RegistryClient;

use crate::{scenarios::verify_single, SimWorld};

pub const STAGE_BOUND: Duration = Duration::from_millis(100);
pub const NEGOTIATOR_LATENCY: Duration = Duration::from_millis(400);

pub async fn run_scenario() -> AgentProofResult<SessionOutcome> {
    println!("=== Scenario 4: Stage timeout ===");
    println!();

    let world = SimWorld::seeded();
    world.negotiator.set_latency(NEGOTIATOR_LATENCY);
    println!(
        "  Stage bound {} ms, negotiator latency {} ms",
        STAGE_BOUND.as_millis(),
        NEGOTIATOR_LATENCY.as_millis()
    );

    let agent = world.registry.resolve_uaid(&Uaid::new("did:web:weather.example")).await?;
    let pipeline = world
        .pipeline()
        .with_timeouts(StageTimeouts::uniform(STAGE_BOUND));

    let (outcome, _audit) = verify_single(pipeline, agent).await?;
    println!("  Scenario 4 complete.");
    println!();
    Ok(outcome)
}
