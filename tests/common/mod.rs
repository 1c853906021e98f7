//! Shared test utilities and fixtures
//!
//! Scripted collaborators for driving the engine end to end without a
//! model daemon or network access.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use kava_config::PolicyConfig;
use kava_engine::Engine;
use kava_index::{Corpus, EmbedError, Embedder, InteractionIndex};
use kava_providers::{ChatModel, CompletionRequest, CompletionResponse, ProviderError};
use kava_store::SubstanceLog;
use kava_websearch::{EvidenceSearch, SearchError, SearchInput, SearchOutput, SearchResult};

/// Demo corpus used across scenarios: one high-severity exact pair plus a
/// statin entry for similarity probes.
pub const TEST_CORPUS: &str = r#"
    [[interaction]]
    food = "grapefruit"
    drug = "warfarin"
    severity = "high"
    description = "Grapefruit inhibits warfarin metabolism and can raise INR."
    updated_at = "2024-05-01"

    [[interaction]]
    food = "grapefruit juice"
    drug = "simvastatin"
    severity = "moderate"
    description = "Grapefruit juice raises statin levels."
    updated_at = "2024-02-01"
"#;

/// Chat model scripted per call, in order. When the script runs dry it
/// answers with a fixed friendly line, which keeps lead-in calls harmless.
pub struct ScriptedChat {
    responses: Mutex<VecDeque<String>>,
}

impl ScriptedChat {
    pub fn new<I, S>(responses: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
        })
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    async fn complete(
        &self,
        _request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let next = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "Noted!".to_string());
        Ok(CompletionResponse { content: next })
    }
}

/// Deterministic bag-of-words embedder; shared vocabulary raises cosine
/// similarity, which is all the similarity-tier tests rely on.
pub struct HashEmbedder;

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut vector = vec![0.0f32; 64];
        for word in text.to_lowercase().split_whitespace() {
            let mut hash = 0usize;
            for byte in word.bytes() {
                hash = hash.wrapping_mul(31).wrapping_add(byte as usize);
            }
            vector[hash % 64] += 1.0;
        }
        Ok(vector)
    }
}

/// Web evidence tool scripted per query substring.
pub struct ScriptedSearch {
    /// `(needle, results)` - first needle contained in the query wins.
    scripts: Vec<(String, Vec<SearchResult>)>,
    /// Queries containing one of these hang until cancelled (timeout
    /// path).
    hang_on: Vec<String>,
}

impl ScriptedSearch {
    pub fn new() -> Self {
        Self {
            scripts: Vec::new(),
            hang_on: Vec::new(),
        }
    }

    pub fn with_results(mut self, needle: &str, snippets: &[&str]) -> Self {
        let results = snippets
            .iter()
            .map(|s| SearchResult {
                snippet: (*s).to_string(),
                url: "https://example.com/evidence".to_string(),
                relevance: None,
            })
            .collect();
        self.scripts.push((needle.to_string(), results));
        self
    }

    pub fn hanging_on(mut self, needle: &str) -> Self {
        self.hang_on.push(needle.to_string());
        self
    }
}

#[async_trait]
impl EvidenceSearch for ScriptedSearch {
    async fn search(&self, input: SearchInput) -> Result<SearchOutput, SearchError> {
        let query = input.query().to_string();
        if self.hang_on.iter().any(|needle| query.contains(needle)) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        let results = self
            .scripts
            .iter()
            .find(|(needle, _)| query.contains(needle))
            .map(|(_, results)| results.clone())
            .unwrap_or_default();
        Ok(SearchOutput { query, results })
    }
}

/// Policy tuned for tests: a short web timeout so timeout scenarios finish
/// quickly, and a similarity threshold matched to the toy embedder's score
/// range (the knob is configuration, not a constant the suite assumes).
pub fn test_policy() -> PolicyConfig {
    PolicyConfig {
        web_timeout: Duration::from_millis(100),
        similarity_threshold: 0.5,
        ..PolicyConfig::default()
    }
}

/// Engine over an in-memory store and the test corpus.
pub async fn build_engine(
    policy: PolicyConfig,
    chat: Arc<dyn ChatModel>,
    embedder: Option<Arc<dyn Embedder>>,
    web: Option<Arc<dyn EvidenceSearch>>,
) -> Engine {
    let corpus = Corpus::from_toml(TEST_CORPUS).expect("test corpus parses");
    let index = InteractionIndex::build(corpus, embedder).await;
    let store = SubstanceLog::open_in_memory().expect("in-memory store");
    Engine::new(policy, store, index, chat, web)
}

/// Extraction completion for a single drug mention.
pub fn drug_json(name: &str) -> String {
    format!(r#"[{{"name": "{name}", "category": "drug"}}]"#)
}

/// Extraction completion for a single food mention.
pub fn food_json(name: &str) -> String {
    format!(r#"[{{"name": "{name}", "category": "food"}}]"#)
}
