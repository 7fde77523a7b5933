//! Validated registry search requests.

use serde::Serialize;

use crate::error::{AgentProofError, AgentProofResult};

/// A free-text agent search with a result cap.
///
/// Construct through `SearchRequest::new`, which rejects requests the registry
/// would refuse before any network call is made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchRequest {
    query: String,
    limit: u32,
}

impl SearchRequest {
    /// Build a request. The query is trimmed; an empty query or a zero limit
    /// is `InvalidQuery`.
    pub fn new(query: impl AsRef<str>, limit: u32) -> AgentProofResult<Self> {
        let query = query.as_ref().trim();
        if query.is_empty() {
            return Err(AgentProofError::InvalidQuery {
                reason: "query must not be empty".to_string(),
            });
        }
        if limit == 0 {
            return Err(AgentProofError::InvalidQuery {
                reason: "limit must be at least 1".to_string(),
            });
        }
        Ok(Self {
            query: query.to_string(),
            limit,
        })
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}
