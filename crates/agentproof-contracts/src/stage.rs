//! Verification stages and their per-stage status.
//!
//! The pipeline is a closed, ordered set of three stages. Each one depends on
//! the previous stage's output, so they run strictly in `Stage::ALL` order.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One step of the verification pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Resolve the agent's UAID against the registry.
    ResolveProfile,
    /// Check the resolved identity claim against the ledger anchor.
    VerifyOnChainIdentity,
    /// Negotiate a session key using the on-chain proof.
    EstablishChannel,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Stage; 3] = [
        Stage::ResolveProfile,
        Stage::VerifyOnChainIdentity,
        Stage::EstablishChannel,
    ];

    /// Zero-based position in `Stage::ALL`.
    pub fn index(self) -> usize {
        match self {
            Stage::ResolveProfile => 0,
            Stage::VerifyOnChainIdentity => 1,
            Stage::EstablishChannel => 2,
        }
    }

    /// The stage that runs after this one, if any.
    pub fn next(self) -> Option<Stage> {
        Stage::ALL.get(self.index() + 1).copied()
    }

    pub fn is_last(self) -> bool {
        self.next().is_none()
    }

    /// Operator-facing description shown while the stage runs.
    pub fn label(self) -> &'static str {
        match self {
            Stage::ResolveProfile => "Resolving Universal Registry Profile",
            Stage::VerifyOnChainIdentity => "Verifying On-Chain Identity (ERC-8004)",
            Stage::EstablishChannel => "Establishing Encrypted Channel",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::ResolveProfile => "resolve_profile",
            Stage::VerifyOnChainIdentity => "verify_on_chain_identity",
            Stage::EstablishChannel => "establish_channel",
        };
        f.write_str(name)
    }
}

/// Status of one stage within a session.
///
/// Statuses only move forward: `Pending → Running → {Succeeded | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl StageStatus {
    /// Return true if moving from `self` to `next` is a legal transition.
    pub fn can_advance_to(self, next: StageStatus) -> bool {
        matches!(
            (self, next),
            (StageStatus::Pending, StageStatus::Running)
                | (StageStatus::Running, StageStatus::Succeeded)
                | (StageStatus::Running, StageStatus::Failed)
        )
    }
}

/// Bounded wait for each externally-facing stage call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTimeouts {
    pub resolve_profile: Duration,
    pub verify_on_chain: Duration,
    pub establish_channel: Duration,
}

impl StageTimeouts {
    /// Default bound applied to every stage.
    pub const DEFAULT: Duration = Duration::from_millis(5000);

    /// The same bound for every stage.
    pub fn uniform(bound: Duration) -> Self {
        Self {
            resolve_profile: bound,
            verify_on_chain: bound,
            establish_channel: bound,
        }
    }

    pub fn for_stage(&self, stage: Stage) -> Duration {
        match stage {
            Stage::ResolveProfile => self.resolve_profile,
            Stage::VerifyOnChainIdentity => self.verify_on_chain,
            Stage::EstablishChannel => self.establish_channel,
        }
    }
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self::uniform(Self::DEFAULT)
    }
}
