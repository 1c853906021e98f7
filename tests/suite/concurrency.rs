//! Scheduling model: same-thread turns serialize, cross-thread turns run
//! in parallel.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use kava_providers::{ChatModel, CompletionRequest, CompletionResponse, ProviderError};
use kava_types::{PairOutcome, ThreadId};

use crate::common::{build_engine, test_policy};

/// Chat model that tracks how many completions run at once and injects a
/// delay into each call so overlap windows actually exist. Extraction
/// requests (recognized by the extractor's system prompt) pop scripted
/// answers; everything else gets a canned lead-in.
struct TrackingChat {
    extractions: Mutex<VecDeque<String>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
    delay: Duration,
}

impl TrackingChat {
    fn new<I, S>(extractions: I, delay: Duration) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            extractions: Mutex::new(extractions.into_iter().map(Into::into).collect()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            delay,
        })
    }

    fn max_concurrency(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatModel for TrackingChat {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let current = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(current, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;

        let is_extraction = request
            .messages
            .first()
            .is_some_and(|m| m.content.contains("JSON array"));
        let content = if is_extraction {
            self.extractions
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| "[]".to_string())
        } else {
            "Noted!".to_string()
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(CompletionResponse { content })
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn same_thread_turns_never_overlap_and_writes_are_visible() {
    let chat = TrackingChat::new(
        [
            r#"[{"name": "warfarin", "category": "drug"}]"#,
            r#"[{"name": "grapefruit", "category": "food"}]"#,
        ],
        Duration::from_millis(100),
    );
    let engine = Arc::new(build_engine(test_policy(), chat.clone(), None, None).await);
    let thread = ThreadId::from("serial");

    let first = {
        let engine = Arc::clone(&engine);
        let thread = thread.clone();
        tokio::spawn(async move { engine.submit_turn(&thread, "I took warfarin").await })
    };
    // give the first turn a head start into its critical section
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = {
        let engine = Arc::clone(&engine);
        let thread = thread.clone();
        tokio::spawn(async move { engine.submit_turn(&thread, "I had grapefruit").await })
    };

    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();

    // the thread lock serializes the two turns completely
    assert_eq!(chat.max_concurrency(), 1);

    // and the first turn's log write was visible to the second's resolver
    assert!(first.evidence[0].pairs.is_empty());
    assert_eq!(second.evidence[0].pairs.len(), 1);
    assert!(matches!(
        second.evidence[0].pairs[0].outcome,
        PairOutcome::Interaction { .. }
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn different_threads_run_in_parallel() {
    let chat = TrackingChat::new(
        [
            r#"[{"name": "warfarin", "category": "drug"}]"#,
            r#"[{"name": "metformin", "category": "drug"}]"#,
        ],
        Duration::from_millis(100),
    );
    let engine = Arc::new(build_engine(test_policy(), chat.clone(), None, None).await);

    let a = {
        let engine = Arc::clone(&engine);
        tokio::spawn(
            async move { engine.submit_turn(&ThreadId::from("par-a"), "warfarin").await },
        )
    };
    let b = {
        let engine = Arc::clone(&engine);
        tokio::spawn(
            async move { engine.submit_turn(&ThreadId::from("par-b"), "metformin").await },
        )
    };

    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    // the two threads' model calls overlapped
    assert!(chat.max_concurrency() >= 2, "expected cross-thread parallelism");
}
