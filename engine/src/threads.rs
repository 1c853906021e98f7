//! Per-thread conversation state and its lifecycle.
//!
//! Turns for the same thread run strictly serially: the thread's state sits
//! behind a `tokio::sync::Mutex` that a turn holds from extraction through
//! commit. Turns on different threads proceed in parallel - the registry
//! map itself is only locked long enough to hand out a handle.
//!
//! Idle eviction never races an in-flight turn: a thread whose state lock
//! is currently held is skipped and picked up on a later sweep.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex as AsyncMutex;

use kava_types::ThreadId;

/// Upper bound on retained conversation history per thread.
const MAX_HISTORY: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HistoryRole {
    User,
    Assistant,
}

#[derive(Debug, Clone)]
pub(crate) struct HistoryEntry {
    pub role: HistoryRole,
    pub text: String,
}

/// Mutable per-thread state, owned by at most one turn at a time.
#[derive(Debug)]
pub(crate) struct ThreadState {
    pub last_activity: DateTime<Utc>,
    pub history: Vec<HistoryEntry>,
}

impl ThreadState {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            last_activity: now,
            history: Vec::new(),
        }
    }

    pub fn record_exchange(&mut self, user: &str, assistant: &str, now: DateTime<Utc>) {
        self.history.push(HistoryEntry {
            role: HistoryRole::User,
            text: user.to_string(),
        });
        self.history.push(HistoryEntry {
            role: HistoryRole::Assistant,
            text: assistant.to_string(),
        });
        if self.history.len() > MAX_HISTORY {
            let excess = self.history.len() - MAX_HISTORY;
            self.history.drain(..excess);
        }
        self.last_activity = now;
    }

    pub fn clear(&mut self, now: DateTime<Utc>) {
        self.history.clear();
        self.last_activity = now;
    }
}

#[derive(Debug)]
pub(crate) struct ThreadHandle {
    pub state: AsyncMutex<ThreadState>,
}

/// Registry of live conversation threads.
pub(crate) struct ThreadRegistry {
    threads: Mutex<HashMap<ThreadId, Arc<ThreadHandle>>>,
    idle_timeout: Duration,
}

impl ThreadRegistry {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            threads: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    /// Existing handle for the thread, or a fresh one created on first
    /// message.
    pub fn obtain(&self, id: &ThreadId, now: DateTime<Utc>) -> Arc<ThreadHandle> {
        let mut threads = self.threads.lock().expect("thread registry poisoned");
        threads
            .entry(id.clone())
            .or_insert_with(|| {
                tracing::debug!(thread = %id, "Thread created");
                Arc::new(ThreadHandle {
                    state: AsyncMutex::new(ThreadState::new(now)),
                })
            })
            .clone()
    }

    /// Drop threads idle past the timeout. Threads whose state lock is
    /// held (a turn is in flight) are left alone until a later sweep.
    pub fn evict_idle(&self, now: DateTime<Utc>) -> usize {
        let mut threads = self.threads.lock().expect("thread registry poisoned");
        let idle_timeout = self.idle_timeout;
        let before = threads.len();

        threads.retain(|id, handle| {
            let Ok(state) = handle.state.try_lock() else {
                // Turn in flight; eviction is deferred.
                return true;
            };
            let idle = now.signed_duration_since(state.last_activity);
            let expired = idle.to_std().map(|d| d >= idle_timeout).unwrap_or(false);
            if expired {
                tracing::info!(thread = %id, "Evicting idle thread");
            }
            !expired
        });

        before - threads.len()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.threads.lock().expect("thread registry poisoned").len()
    }
}
