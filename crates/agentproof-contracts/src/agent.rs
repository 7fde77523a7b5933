//! Agent identity and session identifier types.
//!
//! An `AgentRecord` is what the registry returns for one discovered agent.
//! Once attached to a verification session it is shared behind an `Arc` and
//! never mutated; resolution produces a new, augmented record instead.

use serde::{Deserialize, Serialize};

/// Protocol reported for agents whose registry entry names none.
pub const DEFAULT_PROTOCOL: &str = "Standard";

/// Universal Agent ID, e.g. `Uaid("did:hol:123")`.
///
/// The correlation key across search, resolution, and every verification
/// stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uaid(pub String);

impl Uaid {
    /// Construct a UAID from any string-like value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Uaid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a single verification attempt.
///
/// Every event a session emits carries this id, and it appears in every
/// audit record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub uuid::Uuid);

impl SessionId {
    /// Create a new, unique session ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Canonical identity and metadata for one discovered agent.
///
/// Field names follow the registry's camelCase wire format. `registry` and
/// `communication_protocol` are only populated by UAID resolution; search hits
/// usually leave them empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRecord {
    /// Globally unique identity, immutable.
    pub uaid: Uaid,
    /// Display label. Not authoritative.
    #[serde(default)]
    pub name: String,
    /// Reputation value supplied by the registry at search time.
    ///
    /// Carried through verification as metadata; never recomputed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust_score: Option<f64>,
    /// The registry the agent was resolved from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<String>,
    /// The agent's advertised communication protocol.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub communication_protocol: Option<String>,
}

impl AgentRecord {
    /// A bare search-style record with no provenance metadata.
    pub fn new(uaid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uaid: Uaid::new(uaid),
            name: name.into(),
            trust_score: None,
            registry: None,
            communication_protocol: None,
        }
    }

    pub fn with_trust_score(mut self, score: f64) -> Self {
        self.trust_score = Some(score);
        self
    }

    pub fn with_registry(mut self, registry: impl Into<String>) -> Self {
        self.registry = Some(registry.into());
        self
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.communication_protocol = Some(protocol.into());
        self
    }

    /// The advertised protocol, or `DEFAULT_PROTOCOL` when the registry gave none.
    pub fn protocol(&self) -> &str {
        self.communication_protocol
            .as_deref()
            .unwrap_or(DEFAULT_PROTOCOL)
    }

    /// True once resolution has attached provenance metadata.
    pub fn is_resolved(&self) -> bool {
        self.registry.is_some() && self.communication_protocol.is_some()
    }
}
