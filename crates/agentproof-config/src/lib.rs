//! # agentproof-config
//!
//! Runtime configuration loaded from TOML. Every field has a default, so an
//! empty document is a valid configuration.
//!
//! ```toml
//! [registry]
//! base_url = "https://hol.org/registry/api/v1"
//! request_timeout_ms = 10000
//!
//! [search]
//! default_limit = 5
//!
//! [stages]
//! resolve_profile_ms = 5000
//! verify_on_chain_ms = 5000
//! establish_channel_ms = 5000
//! ```

use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};
use tracing::debug;

use agentproof_contracts::{
    error::{AgentProofError, AgentProofResult},
    stage::StageTimeouts,
};

pub const DEFAULT_REGISTRY_URL: &str = "https://hol.org/registry/api/v1";

// ── Sections ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistrySettings {
    pub base_url: String,
    pub request_timeout_ms: u64,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_REGISTRY_URL.to_string(),
            request_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchSettings {
    /// Result cap used when the caller does not give one.
    pub default_limit: u32,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self { default_limit: 5 }
    }
}

/// Per-stage time bounds, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StageSettings {
    pub resolve_profile_ms: u64,
    pub verify_on_chain_ms: u64,
    pub establish_channel_ms: u64,
}

impl Default for StageSettings {
    fn default() -> Self {
        Self {
            resolve_profile_ms: 5_000,
            verify_on_chain_ms: 5_000,
            establish_channel_ms: 5_000,
        }
    }
}

// ── AgentProofConfig ─────────────────────────────────────────────────────────

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentProofConfig {
    pub registry: RegistrySettings,
    pub search: SearchSettings,
    pub stages: StageSettings,
}

impl AgentProofConfig {
    /// Parse and validate a TOML document.
    ///
    /// Returns `AgentProofError::ConfigError` if `s` is not valid TOML, names
    /// an unknown key, or fails `validate`.
    pub fn from_toml_str(s: &str) -> AgentProofResult<Self> {
        let config: AgentProofConfig =
            toml::from_str(s).map_err(|e| AgentProofError::ConfigError {
                reason: format!("failed to parse config TOML: {}", e),
            })?;
        config.validate()?;
        debug!(
            base_url = %config.registry.base_url,
            default_limit = config.search.default_limit,
            "configuration loaded"
        );
        Ok(config)
    }

    /// Read the file at `path` and parse it with `from_toml_str`.
    pub fn from_file(path: &Path) -> AgentProofResult<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| AgentProofError::ConfigError {
                reason: format!("failed to read config file '{}': {}", path.display(), e),
            })?;
        Self::from_toml_str(&contents)
    }

    /// Reject values the runtime cannot work with.
    pub fn validate(&self) -> AgentProofResult<()> {
        if self.registry.base_url.trim().is_empty() {
            return Err(invalid("registry.base_url must not be empty"));
        }
        if self.registry.request_timeout_ms == 0 {
            return Err(invalid("registry.request_timeout_ms must be greater than zero"));
        }
        if self.search.default_limit == 0 {
            return Err(invalid("search.default_limit must be greater than zero"));
        }
        let stages = [
            ("stages.resolve_profile_ms", self.stages.resolve_profile_ms),
            ("stages.verify_on_chain_ms", self.stages.verify_on_chain_ms),
            ("stages.establish_channel_ms", self.stages.establish_channel_ms),
        ];
        if let Some((key, _)) = stages.iter().find(|(_, ms)| *ms == 0) {
            return Err(invalid(&format!("{key} must be greater than zero")));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.registry.request_timeout_ms)
    }

    pub fn stage_timeouts(&self) -> StageTimeouts {
        StageTimeouts {
            resolve_profile: Duration::from_millis(self.stages.resolve_profile_ms),
            verify_on_chain: Duration::from_millis(self.stages.verify_on_chain_ms),
            establish_channel: Duration::from_millis(self.stages.establish_channel_ms),
        }
    }
}

fn invalid(reason: &str) -> AgentProofError {
    AgentProofError::ConfigError {
        reason: reason.to_string(),
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
