use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::ThreadId;
use crate::substance::{SubstanceCategory, SubstanceName};

/// One substance mention extracted from a user turn.
///
/// Immutable once logged. The timestamp is absolute: relative phrases like
/// "today at 1pm" are resolved against the turn's arrival time before a
/// mention is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstanceMention {
    pub thread: ThreadId,
    pub name: SubstanceName,
    pub category: SubstanceCategory,
    /// Verbatim span of the source message this mention was read from.
    pub span: String,
    /// When the substance was consumed or taken.
    pub taken_at: DateTime<Utc>,
    /// Set when the name was not recognized in any vocabulary or the time
    /// phrase was ambiguous. Flagged mentions are passed through, not
    /// dropped; downstream components decide how much weight to give them.
    pub low_confidence: bool,
}

impl SubstanceMention {
    #[must_use]
    pub fn new(
        thread: ThreadId,
        name: SubstanceName,
        category: SubstanceCategory,
        span: impl Into<String>,
        taken_at: DateTime<Utc>,
    ) -> Self {
        Self {
            thread,
            name,
            category,
            span: span.into(),
            taken_at,
            low_confidence: false,
        }
    }

    #[must_use]
    pub fn with_low_confidence(mut self, low_confidence: bool) -> Self {
        self.low_confidence = low_confidence;
        self
    }
}
