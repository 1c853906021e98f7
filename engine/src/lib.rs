//! Turn-processing core for Kava.
//!
//! One call drives one conversation turn end to end:
//!
//! ```text
//! submit_turn -> Extracting -> Logging -> Resolving -> Composing -> Committed
//! ```
//!
//! The engine owns per-thread state (turns on the same thread are strictly
//! serial, threads run in parallel), the substance log, the curated
//! interaction index, and the seams to the language model and the web
//! evidence tool. The boundary layer - chat UI, voice bridge, HTTP router -
//! only ever sees [`Engine::submit_turn`], [`Engine::reset_thread`], and
//! [`Engine::health`].

mod compose;
mod error;
mod extract;
mod resolver;
mod threads;
mod turn;

pub use compose::SAFETY_DISCLAIMER;
pub use error::{EngineError, TurnError};
pub use turn::{TurnMachine, TurnPhase};

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex as AsyncMutex;

use kava_config::{KavaConfig, PolicyConfig};
use kava_index::{Corpus, Embedder, InteractionIndex};
use kava_providers::ChatModel;
use kava_store::{AppendOutcome, LoggedMention, SubstanceLog};
use kava_types::{EvidenceBundle, SubstanceName, ThreadId, TurnResult};
use kava_websearch::EvidenceSearch;

use compose::Composer;
use extract::Extractor;
use resolver::{Resolver, ResolverPolicy};
use threads::ThreadRegistry;

/// Liveness of one collaborator, as reported by [`Engine::health`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentStatus {
    Up,
    Down,
}

/// Health snapshot across the engine's collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Health {
    pub log_store: ComponentStatus,
    pub curated_index: ComponentStatus,
    pub web_tool: ComponentStatus,
}

/// The conversational safety engine.
pub struct Engine {
    policy: PolicyConfig,
    store: AsyncMutex<SubstanceLog>,
    index: Arc<InteractionIndex>,
    threads: ThreadRegistry,
    extractor: Extractor,
    resolver: Resolver,
    composer: Composer,
    web_configured: bool,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("web_configured", &self.web_configured)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Assemble an engine from already-constructed collaborators.
    pub fn new(
        policy: PolicyConfig,
        store: SubstanceLog,
        index: InteractionIndex,
        chat: Arc<dyn ChatModel>,
        web: Option<Arc<dyn EvidenceSearch>>,
    ) -> Self {
        let index = Arc::new(index);
        let resolver_policy = ResolverPolicy {
            similarity_threshold: policy.similarity_threshold,
            top_k: policy.top_k,
            web_timeout: policy.web_timeout,
            web_default_confidence: policy.web_default_confidence,
            pair_concurrency: policy.pair_concurrency,
        };
        let web_configured = web.is_some();

        Self {
            threads: ThreadRegistry::new(policy.idle_eviction),
            extractor: Extractor::new(Arc::clone(&chat)),
            resolver: Resolver::new(Arc::clone(&index), web, resolver_policy),
            composer: Composer::new(chat),
            store: AsyncMutex::new(store),
            index,
            policy,
            web_configured,
        }
    }

    /// Open the substance log and curated corpus from disk and assemble
    /// the engine. A store that cannot be opened is fatal for the whole
    /// service.
    pub async fn bootstrap(
        config: &KavaConfig,
        db_path: &Path,
        corpus_path: &Path,
        chat: Arc<dyn ChatModel>,
        embedder: Option<Arc<dyn Embedder>>,
        web: Option<Arc<dyn EvidenceSearch>>,
    ) -> Result<Self, EngineError> {
        let store = SubstanceLog::open(db_path)
            .map_err(|e| EngineError::StoreUnreachable(format!("{e:#}")))?;
        let corpus = Corpus::load(corpus_path)?;
        let index = InteractionIndex::build(corpus, embedder).await;

        Ok(Self::new(config.policy.clone(), store, index, chat, web))
    }

    /// Process one user turn for a thread, driving the turn state machine
    /// to `Committed` (or `Failed` on a persistence error).
    pub async fn submit_turn(
        &self,
        thread_id: &ThreadId,
        text: &str,
    ) -> Result<TurnResult, TurnError> {
        let arrival = Utc::now();
        let handle = self.threads.obtain(thread_id, arrival);

        // Thread-scoped critical section: held from extraction through
        // commit so concurrent turns on the same thread serialize, and
        // idle eviction cannot race an in-flight turn.
        let mut state = handle.state.lock().await;

        let mut machine = TurnMachine::new(thread_id.clone());
        machine.advance(TurnPhase::Extracting)?;
        let mentions = self
            .extractor
            .extract(thread_id, text, arrival, &self.index)
            .await;

        let bundles = if mentions.is_empty() {
            // Pure conversational turn: nothing to log or resolve.
            machine.advance(TurnPhase::Composing)?;
            Vec::new()
        } else {
            machine.advance(TurnPhase::Logging)?;
            let fresh = {
                let mut store = self.store.lock().await;
                let mut fresh = Vec::with_capacity(mentions.len());
                for mention in &mentions {
                    match store.append(mention, self.policy.dedup_tolerance) {
                        Ok(AppendOutcome::Committed(id)) => fresh.push((id, mention.clone())),
                        Ok(AppendOutcome::Duplicate(_)) => {}
                        Err(e) => {
                            machine.fail();
                            return Err(TurnError::Persistence(format!("{e:#}")));
                        }
                    }
                }
                fresh
            };

            machine.advance(TurnPhase::Resolving)?;
            let active = {
                let store = self.store.lock().await;
                store
                    .active_since(thread_id, self.policy.active_window, arrival)
                    .map_err(|e| {
                        machine.fail();
                        TurnError::Persistence(format!("{e:#}"))
                    })?
            };

            let mut bundles = Vec::with_capacity(fresh.len());
            for (id, mention) in &fresh {
                let partners = partner_names(&active, *id, &mention.name);
                if partners.is_empty() {
                    bundles.push(EvidenceBundle {
                        subject: mention.clone(),
                        pairs: Vec::new(),
                    });
                    continue;
                }
                bundles.push(self.resolver.resolve(mention, &partners).await);
            }

            machine.advance(TurnPhase::Composing)?;
            bundles
        };

        let reply = self.composer.compose(text, &bundles, &state.history).await;

        state.record_exchange(text, &reply, arrival);
        machine.advance(TurnPhase::Committed)?;
        tracing::info!(
            thread = %thread_id,
            bundles = bundles.len(),
            phase = %machine.phase(),
            "Turn committed"
        );

        Ok(TurnResult {
            reply,
            evidence: bundles,
            completed_at: Utc::now(),
        })
    }

    /// Atomically clear one thread's log and conversation state.
    pub async fn reset_thread(&self, thread_id: &ThreadId) -> Result<(), TurnError> {
        let now = Utc::now();
        let handle = self.threads.obtain(thread_id, now);
        // Waits for any in-flight turn on this thread before clearing.
        let mut state = handle.state.lock().await;

        self.store
            .lock()
            .await
            .reset_thread(thread_id)
            .map_err(|e| TurnError::Persistence(format!("{e:#}")))?;
        state.clear(now);

        Ok(())
    }

    /// Liveness of the engine's collaborators.
    pub async fn health(&self) -> Health {
        let log_store = if self.store.lock().await.ping().is_ok() {
            ComponentStatus::Up
        } else {
            ComponentStatus::Down
        };

        let status = self.index.status();
        let curated_index = if status.exact_entries > 0 || status.semantic_available {
            ComponentStatus::Up
        } else {
            ComponentStatus::Down
        };

        let web_tool = if self.web_configured {
            ComponentStatus::Up
        } else {
            ComponentStatus::Down
        };

        Health {
            log_store,
            curated_index,
            web_tool,
        }
    }

    /// Evict threads idle past the configured timeout. Threads with a turn
    /// in flight are skipped. Returns how many were evicted.
    pub fn evict_idle_threads(&self) -> usize {
        self.threads.evict_idle(Utc::now())
    }
}

/// Partners for a subject mention: every active substance logged before it
/// (by row id), minus the subject itself. Pairing each new mention only
/// against earlier rows checks each pair exactly once even when one turn
/// logs several substances.
fn partner_names(
    active: &[LoggedMention],
    subject_id: kava_types::MentionId,
    subject_name: &SubstanceName,
) -> Vec<SubstanceName> {
    let mut seen = std::collections::HashSet::new();
    active
        .iter()
        .filter(|logged| logged.id.value() < subject_id.value())
        .map(|logged| logged.mention.name.clone())
        .filter(|name| name != subject_name && seen.insert(name.clone()))
        .collect()
}
