//! Registry broker client over HTTP.
//!
//! Endpoints, relative to the configured base URL:
//!
//! | Call          | Request                         | Response body              |
//! |---------------|---------------------------------|----------------------------|
//! | search        | `GET search?q=<query>&limit=<n>` | `{ "hits": [AgentRecord] }` |
//! | resolve_uaid  | `GET resolve/<uaid>`            | `{ "agent": {...} }`        |

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, warn};

use agentproof_contracts::{
    agent::{AgentRecord, Uaid},
    error::{AgentProofError, AgentProofResult},
    search::SearchRequest,
};
use agentproof_core::traits::RegistryClient;

use crate::{complete_resolution, validate_uaid};

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<AgentRecord>,
}

#[derive(Debug, Deserialize)]
struct ResolveResponse {
    agent: ResolvedAgent,
}

/// The resolve payload. Every field is optional; missing ones are taken
/// from the request or defaulted.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolvedAgent {
    uaid: Option<Uaid>,
    name: Option<String>,
    trust_score: Option<f64>,
    registry: Option<String>,
    communication_protocol: Option<String>,
}

impl ResolvedAgent {
    fn into_record(self, requested: &Uaid) -> AgentRecord {
        AgentRecord {
            uaid: self.uaid.unwrap_or_else(|| requested.clone()),
            name: self.name.unwrap_or_default(),
            trust_score: self.trust_score,
            registry: self.registry,
            communication_protocol: self.communication_protocol,
        }
    }
}

/// A `RegistryClient` backed by a registry broker's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpRegistryClient {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpRegistryClient {
    /// Build a client for `base_url`, bounding every request by `timeout`.
    ///
    /// Fails with `ConfigError` if the URL cannot serve as a base.
    pub fn new(base_url: &str, timeout: Duration) -> AgentProofResult<Self> {
        let base_url = Url::parse(base_url).map_err(|e| AgentProofError::ConfigError {
            reason: format!("invalid registry base url '{base_url}': {e}"),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(AgentProofError::ConfigError {
                reason: format!("registry base url '{base_url}' cannot be a base"),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AgentProofError::ConfigError {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> AgentProofResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| AgentProofError::ConfigError {
                reason: format!("registry base url '{}' cannot be a base", self.base_url),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get(&self, url: Url) -> AgentProofResult<reqwest::Response> {
        debug!(url = %url, "registry request");
        self.client
            .get(url)
            .send()
            .await
            .map_err(|e| unavailable("request failed", e))
    }
}

fn unavailable(context: &str, err: impl std::fmt::Display) -> AgentProofError {
    AgentProofError::RegistryUnavailable {
        reason: format!("{context}: {err}"),
    }
}

/// Map a non-success status to the error a caller can act on.
async fn rejection(response: reqwest::Response, uaid: Option<&Uaid>) -> AgentProofError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    warn!(status = %status, body = %body, "registry rejected request");

    match (status, uaid) {
        (StatusCode::NOT_FOUND, Some(uaid)) => AgentProofError::UnknownAgent {
            uaid: uaid.to_string(),
        },
        (StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY, _) => {
            AgentProofError::InvalidQuery {
                reason: format!("registry returned {status}: {body}"),
            }
        }
        _ => AgentProofError::RegistryUnavailable {
            reason: format!("registry returned {status}"),
        },
    }
}

#[async_trait]
impl RegistryClient for HttpRegistryClient {
    async fn search(&self, request: &SearchRequest) -> AgentProofResult<Vec<AgentRecord>> {
        let mut url = self.endpoint(&["search"])?;
        url.query_pairs_mut()
            .append_pair("q", request.query())
            .append_pair("limit", &request.limit().to_string());

        let response = self.get(url).await?;
        if !response.status().is_success() {
            return Err(rejection(response, None).await);
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| unavailable("malformed search response", e))?;

        let mut hits = body.hits;
        hits.truncate(request.limit() as usize);
        debug!(query = %request.query(), hits = hits.len(), "registry search returned");
        Ok(hits)
    }

    async fn resolve_uaid(&self, uaid: &Uaid) -> AgentProofResult<AgentRecord> {
        validate_uaid(uaid)?;
        let url = self.endpoint(&["resolve", uaid.as_str()])?;

        let response = self.get(url).await?;
        if !response.status().is_success() {
            return Err(rejection(response, Some(uaid)).await);
        }

        let body: ResolveResponse = response
            .json()
            .await
            .map_err(|e| unavailable("malformed resolve response", e))?;

        Ok(complete_resolution(body.agent.into_record(uaid)))
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
