//! Domain types for the web evidence tool.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A validated search request.
#[derive(Debug, Clone)]
pub struct SearchInput {
    query: String,
    /// How many results to request. Clamped to [1, 20].
    pub count: usize,
}

impl SearchInput {
    pub const MAX_COUNT: usize = 20;

    /// Create a search input from a query string.
    pub fn new(query: impl Into<String>) -> Result<Self, SearchError> {
        let query = query.into();
        if query.trim().is_empty() {
            return Err(SearchError::new(
                ErrorCode::BadArgs,
                "query must not be empty or whitespace-only",
                false,
            ));
        }
        Ok(Self { query, count: 5 })
    }

    #[must_use]
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count.clamp(1, Self::MAX_COUNT);
        self
    }

    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }
}

/// One usable evidence snippet from the web.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Plain-text snippet (HTML tags stripped).
    pub snippet: String,
    pub url: String,
    /// Tool-reported relevance in [0, 1], when the backend provides one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relevance: Option<f32>,
}

/// Search response: ordered results, best first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutput {
    pub query: String,
    pub results: Vec<SearchResult>,
}

/// Stable error codes for search failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    BadArgs,
    MissingApiKey,
    Timeout,
    RateLimited,
    Unavailable,
    InvalidResponse,
}

/// Failure from the web evidence tool.
///
/// Carries a stable code, a human-readable message, and a `retryable`
/// hint. The resolver maps any of these to an unresolved pair rather than
/// failing the turn.
#[derive(Debug, Clone, Error)]
#[error("{code:?}: {message}")]
pub struct SearchError {
    pub code: ErrorCode,
    pub message: String,
    pub retryable: bool,
}

impl SearchError {
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>, retryable: bool) -> Self {
        Self {
            code,
            message: message.into(),
            retryable,
        }
    }
}
