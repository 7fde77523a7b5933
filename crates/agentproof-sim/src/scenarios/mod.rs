//! Reference scenarios.
//!
//! Each scenario wires a `SimWorld` into a real `SessionManager` with an
//! in-memory audit trail, prints the delivered event stream, and returns the
//! outcomes it observed.

pub mod end_to_end;
pub mod supersession;
pub mod timeout;
pub mod unknown_agent;

use std::{collections::HashSet, sync::Arc, time::Duration};

use tokio::sync::mpsc::UnboundedReceiver;

use agentproof_audit::InMemoryAuditWriter;
use agentproof_contracts::{
    agent::{AgentRecord, SessionId},
    error::{AgentProofError, AgentProofResult},
    event::{SessionEvent, SessionEventKind},
    outcome::SessionOutcome,
};
use agentproof_core::{SessionManager, StagePipeline};

/// Upper bound on how long a scenario waits for its event stream.
const STREAM_DEADLINE: Duration = Duration::from_secs(10);

/// One line per event, for the demo output.
pub fn describe(event: &SessionEvent) -> String {
    match &event.kind {
        SessionEventKind::StageChanged { stage, status } => {
            format!("[{}] {:<28} {:?}", event.sequence, stage.label(), status)
        }
        SessionEventKind::Terminal(outcome) => {
            format!("[{}] {:<28} {}", event.sequence, "Outcome", summarize(outcome))
        }
    }
}

pub fn summarize(outcome: &SessionOutcome) -> String {
    match outcome {
        SessionOutcome::Verified(evidence) => format!(
            "VERIFIED {} via {} (proof {}, channel {}, trust {})",
            evidence.profile.uaid,
            evidence.profile.protocol(),
            evidence.proof.as_str(),
            evidence.channel.id,
            evidence
                .trust_score
                .map(|t| t.to_string())
                .unwrap_or_else(|| "n/a".to_string()),
        ),
        SessionOutcome::Unverified(failure) => format!(
            "UNVERIFIED at {}: {} ({})",
            failure.stage, failure.reason, failure.message
        ),
        SessionOutcome::Cancelled => "CANCELLED".to_string(),
    }
}

/// Receive events until every session in `sessions` has delivered its
/// terminal event. Returns everything received, in delivery order.
pub(crate) async fn collect_sessions(
    rx: &mut UnboundedReceiver<SessionEvent>,
    sessions: &[SessionId],
) -> AgentProofResult<Vec<SessionEvent>> {
    let mut pending: HashSet<SessionId> = sessions.iter().copied().collect();
    let mut events = Vec::new();

    let collect = async {
        while !pending.is_empty() {
            let event = rx.recv().await.ok_or_else(|| AgentProofError::StateMachineError {
                reason: "event stream closed before every session finished".to_string(),
            })?;
            if event.is_terminal() {
                pending.remove(&event.session_id);
            }
            events.push(event);
        }
        Ok::<(), AgentProofError>(())
    };

    tokio::time::timeout(STREAM_DEADLINE, collect)
        .await
        .map_err(|_| AgentProofError::Timeout {
            operation: "scenario event stream".to_string(),
            after_ms: STREAM_DEADLINE.as_millis() as u64,
        })??;
    Ok(events)
}

pub(crate) fn print_audit(audit: &InMemoryAuditWriter) {
    let log = audit.export_log();
    println!(
        "  Audit chain integrity:  {} ({} event(s), {} session(s) finalized)",
        if audit.verify_integrity() { "VERIFIED" } else { "FAILED" },
        log.entries.len(),
        log.finalized_sessions.len()
    );
}

/// Verify one agent on `pipeline` and print the session as it unfolds.
pub(crate) async fn verify_single(
    pipeline: StagePipeline,
    agent: AgentRecord,
) -> AgentProofResult<(SessionOutcome, Arc<InMemoryAuditWriter>)> {
    let audit = Arc::new(InMemoryAuditWriter::new());
    let manager = SessionManager::with_audit(pipeline, audit.clone());
    let mut rx = manager.subscribe();

    println!("  Verifying {} ({})", agent.name, agent.uaid);
    let handle = manager.start_verification(agent);
    for event in collect_sessions(&mut rx, &[handle.id()]).await? {
        println!("    {}", describe(&event));
    }

    let outcome = handle.wait().await;
    println!();
    print_audit(&audit);
    Ok((outcome, audit))
}
