//! Semantic similarity over the curated corpus.
//!
//! Each curated entry is embedded once at build time from a text of the
//! form `"{food} and {drug}: {description}"`. Queries are embedded on
//! demand and ranked by cosine similarity, clamped to [0, 1] so the
//! configured usable-evidence threshold keeps a stable meaning across
//! embedding backends.

use std::sync::Arc;

use async_trait::async_trait;

use kava_types::{InteractionRecord, Provenance};

/// Failure to produce an embedding.
#[derive(Debug, Clone, thiserror::Error)]
#[error("embedding failed: {message}")]
pub struct EmbedError {
    pub message: String,
}

impl EmbedError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Text-to-vector seam. Implemented over the model endpoint by
/// `kava-providers`; tests inject deterministic stand-ins.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;
}

/// One similarity result: a curated record re-tagged with `Similar`
/// provenance and its score.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredHit {
    pub record: InteractionRecord,
    pub score: f32,
}

pub(crate) struct SemanticIndex {
    embedder: Arc<dyn Embedder>,
    entries: Vec<(Vec<f32>, InteractionRecord)>,
}

impl SemanticIndex {
    pub(crate) async fn build(
        records: Vec<InteractionRecord>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, EmbedError> {
        let mut entries = Vec::with_capacity(records.len());
        for record in records {
            let text = entry_text(&record);
            let vector = embedder.embed(&text).await?;
            entries.push((vector, record));
        }
        Ok(Self { embedder, entries })
    }

    pub(crate) async fn search(&self, query: &str, k: usize) -> Vec<ScoredHit> {
        let query_vec = match self.embedder.embed(query).await {
            Ok(vec) => vec,
            Err(e) => {
                tracing::warn!(error = %e, "Query embedding failed, similarity tier empty");
                return Vec::new();
            }
        };

        let mut hits: Vec<ScoredHit> = self
            .entries
            .iter()
            .filter_map(|(vector, record)| {
                let score = cosine_similarity(&query_vec, vector)?;
                let mut record = record.clone();
                record.provenance = Provenance::Similar;
                record.confidence = Some(score);
                Some(ScoredHit { record, score })
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        hits
    }
}

fn entry_text(record: &InteractionRecord) -> String {
    format!(
        "{} and {}: {}",
        record.pair.first(),
        record.pair.second(),
        record.description
    )
}

/// Cosine similarity clamped to [0, 1]. Returns `None` on dimension
/// mismatch so a bad vector drops out of ranking instead of poisoning it.
fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.is_empty() || a.len() != b.len() {
        return None;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (&x, &y) in a.iter().zip(b.iter()) {
        let xf = f64::from(x);
        let yf = f64::from(y);
        dot += xf * yf;
        norm_a += xf * xf;
        norm_b += yf * yf;
    }

    if norm_a <= 0.0 || norm_b <= 0.0 {
        return Some(0.0);
    }

    let sim = dot / (norm_a.sqrt() * norm_b.sqrt());
    if sim.is_finite() {
        Some((sim as f32).clamp(0.0, 1.0))
    } else {
        Some(0.0)
    }
}
