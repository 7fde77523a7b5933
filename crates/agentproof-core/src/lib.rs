//! # agentproof-core
//!
//! The verification runtime for AgentProof.
//!
//! This crate provides:
//! - The collaborator traits (`RegistryClient`, `IdentityVerifier`,
//!   `ChannelNegotiator`, `AuditWriter`)
//! - The stage executors and the `StagePipeline` that bounds them
//! - `VerificationSession`, the per-attempt state machine
//! - `SessionManager`, which keeps at most one session active
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agentproof_core::{SessionManager, StagePipeline};
//!
//! let manager = SessionManager::new(StagePipeline::new(registry, ledger, negotiator));
//! let hits = manager.search("assistant", 5).await?;
//! let outcome = manager.start_verification(hits[0].clone()).wait().await;
//! ```

pub mod manager;
pub mod session;
pub mod stages;
pub mod traits;

#[cfg(test)]
mod test_support;

pub use manager::{SessionHandle, SessionManager};
pub use session::{SessionSnapshot, VerificationSession};
pub use stages::StagePipeline;
