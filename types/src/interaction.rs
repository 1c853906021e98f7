use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::substance::SubstanceName;

/// Canonical, order-independent key for a substance pair.
///
/// The two names are sorted lexicographically at construction, so
/// `PairKey::new(a, b) == PairKey::new(b, a)` always holds. Deserialized
/// keys are re-canonicalized, so the invariant survives round trips
/// through external data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "UncheckedPairKey")]
pub struct PairKey {
    first: SubstanceName,
    second: SubstanceName,
}

#[derive(Deserialize)]
struct UncheckedPairKey {
    first: SubstanceName,
    second: SubstanceName,
}

impl From<UncheckedPairKey> for PairKey {
    fn from(raw: UncheckedPairKey) -> Self {
        Self::new(raw.first, raw.second)
    }
}

impl PairKey {
    #[must_use]
    pub fn new(a: SubstanceName, b: SubstanceName) -> Self {
        if a <= b {
            Self { first: a, second: b }
        } else {
            Self { first: b, second: a }
        }
    }

    #[must_use]
    pub fn first(&self) -> &SubstanceName {
        &self.first
    }

    #[must_use]
    pub fn second(&self) -> &SubstanceName {
        &self.second
    }

    /// The partner of `name` in this pair, if `name` is a member.
    #[must_use]
    pub fn other(&self, name: &SubstanceName) -> Option<&SubstanceName> {
        if &self.first == name {
            Some(&self.second)
        } else if &self.second == name {
            Some(&self.first)
        } else {
            None
        }
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} + {}", self.first, self.second)
    }
}

/// Severity tier of a known interaction.
///
/// The derive order matters: `Minor < Moderate < High` drives tie-breaking
/// when several candidate records survive a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Minor,
    Moderate,
    High,
}

impl Severity {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Minor => "minor",
            Self::Moderate => "moderate",
            Self::High => "high",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "minor" => Some(Self::Minor),
            "moderate" => Some(Self::Moderate),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which evidence tier produced a record.
///
/// Used for response hedging and for tie-breaking: an `Exact` record always
/// beats a `Similar` one, which always beats `Web`, regardless of scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Exact,
    Similar,
    Web,
}

impl Provenance {
    /// Strict tier rank; higher wins.
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::Exact => 2,
            Self::Similar => 1,
            Self::Web => 0,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Similar => "similar",
            Self::Web => "web",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One piece of interaction evidence for a canonical substance pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub pair: PairKey,
    pub severity: Severity,
    pub description: String,
    pub provenance: Provenance,
    /// Only meaningful for `Similar` (similarity score) and `Web`
    /// (tool-reported relevance, or a fixed low default).
    pub confidence: Option<f32>,
    /// Corpus revision date (RFC 3339 date), used as the final tie-break.
    pub updated_at: String,
}

impl InteractionRecord {
    /// Ordering used to pick the single best record for a pair.
    ///
    /// Provenance rank first, then severity, then confidence, then most
    /// recently updated.
    #[must_use]
    pub fn beats(&self, other: &Self) -> bool {
        self.cmp_preference(other) == Ordering::Greater
    }

    fn cmp_preference(&self, other: &Self) -> Ordering {
        self.provenance
            .rank()
            .cmp(&other.provenance.rank())
            .then(self.severity.cmp(&other.severity))
            .then(
                self.confidence
                    .unwrap_or(0.0)
                    .total_cmp(&other.confidence.unwrap_or(0.0)),
            )
            .then(self.updated_at.cmp(&other.updated_at))
    }
}
