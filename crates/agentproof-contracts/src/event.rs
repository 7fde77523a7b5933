//! Progress events delivered to session subscribers.
//!
//! A subscriber sees, per session, an ordered run of `StageChanged` events
//! followed by exactly one `Terminal` event. `sequence` restarts at 0 for each
//! session and increases by one per event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    agent::SessionId,
    outcome::SessionOutcome,
    stage::{Stage, StageStatus},
};

/// One notification emitted by a verification session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEvent {
    /// The session that emitted this event.
    pub session_id: SessionId,
    /// Position within the session's event stream, starting at 0.
    pub sequence: u64,
    /// What happened.
    pub kind: SessionEventKind,
    /// Wall-clock emission time (UTC).
    pub timestamp: DateTime<Utc>,
}

impl SessionEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, SessionEventKind::Terminal(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEventKind {
    /// A stage moved to a new status.
    StageChanged { stage: Stage, status: StageStatus },
    /// The session reached its terminal outcome.
    Terminal(SessionOutcome),
}
