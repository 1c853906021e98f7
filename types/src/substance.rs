use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A normalized substance name: trimmed, lowercased, inner whitespace
/// collapsed, guaranteed non-empty.
///
/// Normalization happens at construction so that equality, pair-key
/// canonicalization, and log dedup all operate on the same form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubstanceName(String);

#[derive(Debug, Error)]
#[error("substance name must not be empty")]
pub struct InvalidSubstanceName;

impl SubstanceName {
    pub fn new(value: impl AsRef<str>) -> Result<Self, InvalidSubstanceName> {
        let normalized = value
            .as_ref()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        if normalized.is_empty() {
            Err(InvalidSubstanceName)
        } else {
            Ok(Self(normalized))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for SubstanceName {
    type Error = InvalidSubstanceName;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for SubstanceName {
    type Error = InvalidSubstanceName;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SubstanceName> for String {
    fn from(value: SubstanceName) -> Self {
        value.0
    }
}

impl fmt::Display for SubstanceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for SubstanceName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Whether a mention refers to something eaten or something taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubstanceCategory {
    Food,
    Drug,
}

impl SubstanceCategory {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Food => "food",
            Self::Drug => "drug",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "food" => Some(Self::Food),
            "drug" => Some(Self::Drug),
            _ => None,
        }
    }
}

impl fmt::Display for SubstanceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
