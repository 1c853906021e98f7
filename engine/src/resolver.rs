//! Interaction resolver: tiered evidence search per substance pair.
//!
//! For a newly logged substance and each of its active partners, the
//! resolver consults three tiers in strict priority order, short-circuiting
//! at the first that satisfies the query:
//!
//! 1. Exact lookup on the canonical pair key
//! 2. Similarity search, gated by the usable-evidence threshold
//! 3. Web evidence search, under a timeout
//!
//! Tier failures are absorbed: an offline index yields an empty tier, a web
//! timeout marks that one pair unresolved. Independent pairs are evaluated
//! concurrently under a per-turn bound, and the bundle always carries
//! exactly one outcome per pair.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;

use kava_index::InteractionIndex;
use kava_types::{
    EvidenceBundle, InteractionRecord, PairEvidence, PairKey, PairOutcome, Provenance, Severity,
    SubstanceMention, SubstanceName,
};
use kava_websearch::{EvidenceSearch, SearchInput};

/// Resolver policy knobs, copied out of the engine config.
#[derive(Debug, Clone)]
pub(crate) struct ResolverPolicy {
    pub similarity_threshold: f32,
    pub top_k: usize,
    pub web_timeout: Duration,
    pub web_default_confidence: f32,
    pub pair_concurrency: usize,
}

pub(crate) struct Resolver {
    index: Arc<InteractionIndex>,
    web: Option<Arc<dyn EvidenceSearch>>,
    policy: ResolverPolicy,
}

impl Resolver {
    pub fn new(
        index: Arc<InteractionIndex>,
        web: Option<Arc<dyn EvidenceSearch>>,
        policy: ResolverPolicy,
    ) -> Self {
        Self { index, web, policy }
    }

    /// Resolve evidence for `subject` against every partner, concurrently
    /// but bounded, preserving partner order in the output.
    pub async fn resolve(
        &self,
        subject: &SubstanceMention,
        partners: &[SubstanceName],
    ) -> EvidenceBundle {
        let unique: Vec<SubstanceName> = {
            let mut seen = std::collections::HashSet::new();
            partners
                .iter()
                .filter(|p| **p != subject.name && seen.insert((*p).clone()))
                .cloned()
                .collect()
        };

        let mut outcomes: Vec<(usize, PairEvidence)> =
            futures_util::stream::iter(unique.into_iter().enumerate().map(|(i, other)| {
                let other = other.clone();
                let subject_name = subject.name.clone();
                async move {
                    let outcome = self.resolve_pair(&subject_name, &other).await;
                    (i, PairEvidence { other, outcome })
                }
            }))
            .buffer_unordered(self.policy.pair_concurrency.max(1))
            .collect()
            .await;

        outcomes.sort_by_key(|(i, _)| *i);

        EvidenceBundle {
            subject: subject.clone(),
            pairs: outcomes.into_iter().map(|(_, pair)| pair).collect(),
        }
    }

    async fn resolve_pair(&self, subject: &SubstanceName, other: &SubstanceName) -> PairOutcome {
        let pair = PairKey::new(subject.clone(), other.clone());

        // Tier 1: exact, deterministic.
        if let Some(record) = self.index.exact_lookup(&pair) {
            tracing::debug!(pair = %pair, "Exact interaction hit");
            return PairOutcome::Interaction { record };
        }

        // Tier 2: semantic similarity, gated by threshold.
        let query = format!("{subject} and {other}");
        let hits = self.index.similarity_search(&query, self.policy.top_k).await;
        let usable = hits
            .into_iter()
            .filter(|hit| hit.score >= self.policy.similarity_threshold)
            .map(|hit| hit.record)
            .reduce(|best, candidate| if candidate.beats(&best) { candidate } else { best });
        if let Some(record) = usable {
            tracing::debug!(pair = %pair, confidence = ?record.confidence, "Similar interaction hit");
            return PairOutcome::Interaction { record };
        }

        // Tier 3: web fallback, bounded by the timeout.
        self.resolve_via_web(pair, subject, other).await
    }

    async fn resolve_via_web(
        &self,
        pair: PairKey,
        subject: &SubstanceName,
        other: &SubstanceName,
    ) -> PairOutcome {
        let Some(web) = &self.web else {
            return PairOutcome::Unresolved {
                reason: "web evidence tool is not configured".to_string(),
            };
        };

        let input = match SearchInput::new(format!("{subject} {other} interaction")) {
            Ok(input) => input,
            Err(e) => {
                return PairOutcome::Unresolved {
                    reason: format!("web query rejected: {e}"),
                };
            }
        };

        let search = web.search(input);
        let output = match tokio::time::timeout(self.policy.web_timeout, search).await {
            Err(_) => {
                tracing::warn!(pair = %pair, "Web evidence search timed out");
                return PairOutcome::Unresolved {
                    reason: "web evidence search timed out".to_string(),
                };
            }
            Ok(Err(e)) => {
                tracing::warn!(pair = %pair, error = %e, "Web evidence search failed");
                return PairOutcome::Unresolved {
                    reason: format!("web evidence search failed: {e}"),
                };
            }
            Ok(Ok(output)) => output,
        };

        // Best usable snippet: highest reported relevance, falling back to
        // the tool's own ranking.
        let best = output
            .results
            .into_iter()
            .enumerate()
            .max_by(|(ia, a), (ib, b)| {
                let ra = a.relevance.unwrap_or(0.0);
                let rb = b.relevance.unwrap_or(0.0);
                ra.total_cmp(&rb).then(ib.cmp(ia))
            })
            .map(|(_, result)| result);

        match best {
            Some(result) => {
                let confidence = result
                    .relevance
                    .unwrap_or(self.policy.web_default_confidence);
                PairOutcome::Interaction {
                    record: InteractionRecord {
                        pair,
                        // Severity cannot be judged from a snippet; the
                        // composer hedges web claims and omits the tier.
                        severity: Severity::Moderate,
                        description: result.snippet,
                        provenance: Provenance::Web,
                        confidence: Some(confidence),
                        updated_at: String::new(),
                    },
                }
            }
            // Every tier was consulted and came up empty: a real answer,
            // not a failure.
            None => PairOutcome::NoKnownInteraction,
        }
    }
}
