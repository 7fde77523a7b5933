//! # agentproof-audit
//!
//! Append-only, SHA-256 hash-chained record of delivered session events.
//!
//! Every event a `SessionManager` delivers is wrapped in an `AuditEntry`
//! that links to the previous entry by hash. Editing, dropping or reordering
//! any entry breaks the chain, which `verify_chain` detects.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use agentproof_audit::InMemoryAuditWriter;
//! use agentproof_core::SessionManager;
//!
//! let audit = Arc::new(InMemoryAuditWriter::new());
//! let manager = SessionManager::with_audit(pipeline, audit.clone());
//! let handle = manager.start_verification(agent);
//! handle.wait().await;
//!
//! assert!(audit.verify_integrity());
//! let trail = audit.events_for(&handle.id());
//! ```

pub mod chain;
pub mod entry;
pub mod memory;

pub use chain::{hash_entry, verify_chain};
pub use entry::{AuditEntry, AuditLog};
pub use memory::InMemoryAuditWriter;

// ── Tests ─────────────────────────────────────────────────────────────────────
