//! Turn state machine.
//!
//! One conversation turn moves through a fixed sequence of phases:
//!
//! ```text
//! Idle -> Extracting -> Logging -> Resolving -> Composing -> Committed
//!                   \______________________________/
//!                    (skip when nothing was extracted)
//! ```
//!
//! `Failed` is terminal and reachable from any phase. Transitions are
//! validated at runtime so each step can be unit-tested in isolation and a
//! skipped phase is an explicit path, not an accident of control flow.

use std::fmt;

use kava_types::ThreadId;

use crate::error::TurnError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    Extracting,
    Logging,
    Resolving,
    Composing,
    Committed,
    Failed,
}

impl TurnPhase {
    /// Legal forward transitions. `Failed` is reachable from anywhere via
    /// [`TurnMachine::fail`], not through this table.
    #[must_use]
    pub fn can_advance_to(self, next: TurnPhase) -> bool {
        matches!(
            (self, next),
            (TurnPhase::Idle, TurnPhase::Extracting)
                | (TurnPhase::Extracting, TurnPhase::Logging)
                // A turn with zero extracted mentions skips straight to
                // composition with an empty evidence set.
                | (TurnPhase::Extracting, TurnPhase::Composing)
                | (TurnPhase::Logging, TurnPhase::Resolving)
                | (TurnPhase::Resolving, TurnPhase::Composing)
                | (TurnPhase::Composing, TurnPhase::Committed)
        )
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, TurnPhase::Committed | TurnPhase::Failed)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Extracting => "extracting",
            Self::Logging => "logging",
            Self::Resolving => "resolving",
            Self::Composing => "composing",
            Self::Committed => "committed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Drives one turn through its phases, rejecting out-of-order transitions.
#[derive(Debug)]
pub struct TurnMachine {
    thread: ThreadId,
    phase: TurnPhase,
}

impl TurnMachine {
    #[must_use]
    pub fn new(thread: ThreadId) -> Self {
        Self {
            thread,
            phase: TurnPhase::Idle,
        }
    }

    #[must_use]
    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// Move to the next phase, or error when the sequence is violated.
    pub fn advance(&mut self, next: TurnPhase) -> Result<(), TurnError> {
        if !self.phase.can_advance_to(next) {
            return Err(TurnError::InvalidTransition(format!(
                "{} -> {} (thread {})",
                self.phase, next, self.thread
            )));
        }
        tracing::debug!(thread = %self.thread, from = %self.phase, to = %next, "Turn transition");
        self.phase = next;
        Ok(())
    }

    /// Terminal failure, legal from any phase.
    pub fn fail(&mut self) {
        tracing::warn!(thread = %self.thread, from = %self.phase, "Turn failed");
        self.phase = TurnPhase::Failed;
    }
}
