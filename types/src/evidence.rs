use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::interaction::InteractionRecord;
use crate::mention::SubstanceMention;
use crate::substance::SubstanceName;

/// The resolver's verdict for one substance pair.
///
/// Exactly one of three outcomes; absence of evidence is explicit, never a
/// missing entry. "No known interaction" is a real answer, distinct from
/// "lookup failed".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum PairOutcome {
    /// Best evidence found across the tiers.
    Interaction { record: InteractionRecord },
    /// Every tier was consulted and none produced evidence.
    NoKnownInteraction,
    /// A tier failed (timeout, unavailable) before the pair could be
    /// answered; the reply must say so rather than omit the pair.
    Unresolved { reason: String },
}

impl PairOutcome {
    #[must_use]
    pub fn record(&self) -> Option<&InteractionRecord> {
        match self {
            Self::Interaction { record } => Some(record),
            Self::NoKnownInteraction | Self::Unresolved { .. } => None,
        }
    }

    #[must_use]
    pub fn is_unresolved(&self) -> bool {
        matches!(self, Self::Unresolved { .. })
    }
}

/// Evidence for one pair: the partner substance and its outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairEvidence {
    pub other: SubstanceName,
    pub outcome: PairOutcome,
}

/// The resolver's output for one newly logged substance: one outcome per
/// active partner it was checked against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceBundle {
    /// The substance that triggered the check.
    pub subject: SubstanceMention,
    /// One entry per partner, in active-window order. Never more than one
    /// record per pair.
    pub pairs: Vec<PairEvidence>,
}

impl EvidenceBundle {
    /// True when at least one pair carries an interaction record.
    #[must_use]
    pub fn has_findings(&self) -> bool {
        self.pairs.iter().any(|p| p.outcome.record().is_some())
    }

    /// Pairs whose evidence could not be retrieved.
    pub fn unresolved(&self) -> impl Iterator<Item = &PairEvidence> {
        self.pairs.iter().filter(|p| p.outcome.is_unresolved())
    }
}

/// The atomic unit returned to the boundary layer for one turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnResult {
    pub reply: String,
    pub evidence: Vec<EvidenceBundle>,
    pub completed_at: DateTime<Utc>,
}
