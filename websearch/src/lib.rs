//! Web evidence search for LLM-grounded interaction checks.
//!
//! This crate wraps a Brave-style web search API as the last evidence
//! tier. It is only invoked when the curated index has no exact match and
//! no usable semantic match, and its failures never abort a turn - the
//! resolver converts them into explicit "unresolved" outcomes.
//!
//! # Pipeline
//!
//! 1. Validate the query ([`SearchInput::new`])
//! 2. GET the search endpoint with the subscription key header
//! 3. Decode the result list, strip HTML tags from snippets
//! 4. Drop results with empty snippets
//!
//! # Error Handling
//!
//! All errors are [`SearchError`] with stable [`ErrorCode`] variants and
//! `retryable` hints. A missing API key is detected at construction, not
//! on the request path.

mod types;

pub use types::{ErrorCode, SearchError, SearchInput, SearchOutput, SearchResult};

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Evidence-search seam consumed by the interaction resolver. The
/// production implementation is [`BraveSearchClient`]; tests script their
/// own.
#[async_trait]
pub trait EvidenceSearch: Send + Sync {
    async fn search(&self, input: SearchInput) -> Result<SearchOutput, SearchError>;
}

const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Client for a Brave-style web search API.
#[derive(Debug, Clone)]
pub struct BraveSearchClient {
    endpoint: url::Url,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct BraveResponse {
    #[serde(default)]
    web: Option<BraveWebSection>,
}

#[derive(Debug, Deserialize)]
struct BraveWebSection {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Debug, Deserialize)]
struct BraveResult {
    #[serde(default)]
    url: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    relevance: Option<f32>,
}

impl BraveSearchClient {
    /// Build a client. Fails fast when the API key is empty or the
    /// endpoint does not parse, so a misconfigured deployment is caught at
    /// startup, not mid-turn.
    pub fn new(
        endpoint: impl AsRef<str>,
        api_key: impl Into<String>,
    ) -> Result<Self, SearchError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(SearchError::new(
                ErrorCode::MissingApiKey,
                "search API key is empty",
                false,
            ));
        }

        let endpoint = url::Url::parse(endpoint.as_ref()).map_err(|e| {
            SearchError::new(
                ErrorCode::BadArgs,
                format!("invalid search endpoint: {e}"),
                false,
            )
        })?;

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| {
                SearchError::new(
                    ErrorCode::Unavailable,
                    format!("failed to build HTTP client: {e}"),
                    false,
                )
            })?;

        Ok(Self {
            endpoint,
            api_key,
            client,
        })
    }
}

#[async_trait]
impl EvidenceSearch for BraveSearchClient {
    async fn search(&self, input: SearchInput) -> Result<SearchOutput, SearchError> {
        let count = input.count.to_string();
        let response = self
            .client
            .get(self.endpoint.clone())
            .header("X-Subscription-Token", &self.api_key)
            .header("Accept", "application/json")
            .query(&[("q", input.query()), ("count", count.as_str())])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SearchError::new(ErrorCode::Timeout, "search request timed out", true)
                } else {
                    SearchError::new(ErrorCode::Unavailable, e.to_string(), true)
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(SearchError::new(
                ErrorCode::RateLimited,
                "search API rate limit exceeded",
                true,
            ));
        }
        if !status.is_success() {
            return Err(SearchError::new(
                ErrorCode::Unavailable,
                format!("search API returned HTTP {status}"),
                status.is_server_error(),
            ));
        }

        let body: BraveResponse = response.json().await.map_err(|e| {
            SearchError::new(
                ErrorCode::InvalidResponse,
                format!("could not decode search response: {e}"),
                false,
            )
        })?;

        let results: Vec<SearchResult> = body
            .web
            .map(|web| web.results)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|r| {
                let snippet = strip_html_tags(&r.description);
                let snippet = snippet.trim();
                if snippet.is_empty() {
                    None
                } else {
                    Some(SearchResult {
                        snippet: snippet.to_string(),
                        url: r.url,
                        relevance: r.relevance.map(|v| v.clamp(0.0, 1.0)),
                    })
                }
            })
            .collect();

        tracing::debug!(query = input.query(), hits = results.len(), "Web search complete");
        Ok(SearchOutput {
            query: input.query().to_string(),
            results,
        })
    }
}

/// Strip HTML tags from a snippet. Search APIs decorate matches with
/// `<strong>` markers that are noise downstream.
fn strip_html_tags(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut in_tag = false;

    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(c),
            _ => {}
        }
    }

    result
}
