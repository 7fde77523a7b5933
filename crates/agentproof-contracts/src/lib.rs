//! # agentproof-contracts
//!
//! Shared types, events, and error taxonomy for the AgentProof runtime.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate: only data definitions and error types.

pub mod agent;
pub mod error;
pub mod event;
pub mod outcome;
pub mod search;
pub mod stage;
