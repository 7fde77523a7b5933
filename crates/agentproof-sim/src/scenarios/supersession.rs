//! Scenario 3: the user picks a second agent mid-verification.
//!
//! Alpha is selected first; while its ledger check is in flight, Beta is
//! selected. Alpha ends `Cancelled` before Beta's first event is delivered,
//! and the ledger answer that arrives for Alpha afterwards is discarded.

use std::{sync::Arc, time::Duration};

use agentproof_audit::InMemoryAuditWriter;
use agentproof_contracts::{
    agent::Uaid,
    error::{AgentProofError, AgentProofResult},
    outcome::SessionOutcome,
    stage::{Stage, StageStatus, StageTimeouts},
};
use agentproof_core::{traits::RegistryClient, SessionManager};

use crate::{
    scenarios::{collect_sessions, describe, print_audit},
    SimWorld,
};

pub const LEDGER_LATENCY: Duration = Duration::from_millis(200);

pub async fn run_scenario(
    timeouts: StageTimeouts,
) -> AgentProofResult<(SessionOutcome, SessionOutcome)> {
    println!("=== Scenario 3: Supersession ===");
    println!();

    let world = SimWorld::seeded();
    world.ledger.set_latency(LEDGER_LATENCY);

    let audit = Arc::new(InMemoryAuditWriter::new());
    let manager = SessionManager::with_audit(world.pipeline().with_timeouts(timeouts), audit.clone());
    let mut rx = manager.subscribe();

    let alpha = world.registry.resolve_uaid(&Uaid::new("did:hol:123")).await?;
    let beta = world.registry.resolve_uaid(&Uaid::new("did:hol:456")).await?;

    println!("  Selecting {} ({})", alpha.name, alpha.uaid);
    let first = manager.start_verification(alpha);

    // Wait until the ledger call is in flight.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while first.stage_status(Stage::VerifyOnChainIdentity) != StageStatus::Running {
        if tokio::time::Instant::now() >= deadline {
            return Err(AgentProofError::Timeout {
                operation: "waiting for ledger stage".to_string(),
                after_ms: 5_000,
            });
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    println!("  Selecting {} ({})", beta.name, beta.uaid);
    let second = manager.start_verification(beta);

    for event in collect_sessions(&mut rx, &[first.id(), second.id()]).await? {
        let who = if event.session_id == first.id() { "first " } else { "second" };
        println!("    {} {}", who, describe(&event));
    }

    // Give the first session's ledger call time to return; its result must
    // not produce any further events.
    tokio::time::sleep(LEDGER_LATENCY).await;
    let late = rx.try_recv().is_ok();
    println!();
    println!(
        "  Late completion for first session: {}",
        if late { "DELIVERED (unexpected)" } else { "discarded" }
    );
    println!(
        "  Audit events for first session:   {}",
        audit.events_for(&first.id()).len()
    );
    print_audit(&audit);
    println!("  Scenario 3 complete.");
    println!();

    Ok((first.wait().await, second.wait().await))
}
