//! Curated interaction index.
//!
//! Two sub-lookups over the same curated corpus:
//!
//! - **Exact lookup** - canonical pair-key to record, `HashMap`, O(1),
//!   deterministic.
//! - **Similarity lookup** - embeds a query string and returns the top-k
//!   nearest curated entries by cosine similarity, each scored in [0, 1].
//!
//! The index degrades rather than errors: if the embedder is unavailable at
//! build or query time, similarity lookups report no results and exact
//! lookups keep working. The resolver treats an empty tier as "move on",
//! so an offline embedding backend costs recall, not availability.

mod corpus;
mod semantic;

pub use corpus::{Corpus, CorpusError};
pub use semantic::{EmbedError, Embedder, ScoredHit};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use kava_types::{InteractionRecord, PairKey, SubstanceName};

use semantic::SemanticIndex;

/// Availability snapshot for health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStatus {
    pub exact_entries: usize,
    pub semantic_available: bool,
}

/// The curated interaction index: exact pair map plus optional semantic
/// side.
pub struct InteractionIndex {
    exact: HashMap<PairKey, InteractionRecord>,
    vocabulary: HashSet<SubstanceName>,
    semantic: Option<SemanticIndex>,
}

impl InteractionIndex {
    /// Build the exact map and vocabulary from a corpus, then try to embed
    /// every entry for the semantic side.
    ///
    /// An embedder failure downgrades the index to exact-only instead of
    /// failing the build.
    pub async fn build(corpus: Corpus, embedder: Option<Arc<dyn Embedder>>) -> Self {
        let records = corpus.into_records();

        let mut exact = HashMap::with_capacity(records.len());
        let mut vocabulary = HashSet::new();
        for record in &records {
            vocabulary.insert(record.pair.first().clone());
            vocabulary.insert(record.pair.second().clone());
            exact.insert(record.pair.clone(), record.clone());
        }

        let semantic = match embedder {
            Some(embedder) => match SemanticIndex::build(records, embedder).await {
                Ok(index) => Some(index),
                Err(e) => {
                    tracing::warn!(error = %e, "Semantic index unavailable, running exact-only");
                    None
                }
            },
            None => None,
        };

        Self {
            exact,
            vocabulary,
            semantic,
        }
    }

    /// Exact-match lookup on the canonical pair key.
    #[must_use]
    pub fn exact_lookup(&self, pair: &PairKey) -> Option<InteractionRecord> {
        self.exact.get(pair).cloned()
    }

    /// Top-k curated entries nearest to the query, scored in [0, 1],
    /// descending. Empty when the semantic side is down or errors.
    pub async fn similarity_search(&self, query: &str, k: usize) -> Vec<ScoredHit> {
        match &self.semantic {
            Some(index) => index.search(query, k).await,
            None => Vec::new(),
        }
    }

    /// Whether a normalized name appears anywhere in the curated corpus.
    /// The extractor uses this to flag unrecognized substances.
    #[must_use]
    pub fn knows(&self, name: &SubstanceName) -> bool {
        self.vocabulary.contains(name)
    }

    #[must_use]
    pub fn status(&self) -> IndexStatus {
        IndexStatus {
            exact_entries: self.exact.len(),
            semantic_available: self.semantic.is_some(),
        }
    }
}
