//! Curated corpus loading.
//!
//! The corpus is a TOML file of interaction entries. The loader
//! canonicalizes every pair key and rejects duplicates, which keeps the
//! exact map a function from pair to exactly one record.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use kava_types::{InteractionRecord, PairKey, Provenance, Severity, SubstanceName};

#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    #[error("failed to read corpus file {path}: {message}")]
    Io { path: String, message: String },
    #[error("failed to parse corpus: {0}")]
    Parse(String),
    #[error("corpus entry {index}: {message}")]
    InvalidEntry { index: usize, message: String },
    #[error("duplicate curated entry for pair {pair}")]
    DuplicatePair { pair: String },
}

#[derive(Debug, Deserialize)]
struct RawCorpus {
    #[serde(default, rename = "interaction")]
    interactions: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    food: String,
    drug: String,
    severity: String,
    description: String,
    updated_at: String,
}

/// A validated curated corpus, ready to back the interaction index.
#[derive(Debug)]
pub struct Corpus {
    records: Vec<InteractionRecord>,
}

impl Corpus {
    /// Load and validate a corpus file.
    pub fn load(path: &Path) -> Result<Self, CorpusError> {
        let text = std::fs::read_to_string(path).map_err(|e| CorpusError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml(&text)
    }

    /// Parse and validate corpus TOML.
    pub fn from_toml(text: &str) -> Result<Self, CorpusError> {
        let raw: RawCorpus = toml::from_str(text).map_err(|e| CorpusError::Parse(e.to_string()))?;

        let mut seen: HashSet<PairKey> = HashSet::with_capacity(raw.interactions.len());
        let mut records = Vec::with_capacity(raw.interactions.len());

        for (index, entry) in raw.interactions.into_iter().enumerate() {
            let food = SubstanceName::new(&entry.food).map_err(|e| CorpusError::InvalidEntry {
                index,
                message: format!("food: {e}"),
            })?;
            let drug = SubstanceName::new(&entry.drug).map_err(|e| CorpusError::InvalidEntry {
                index,
                message: format!("drug: {e}"),
            })?;
            let severity =
                Severity::parse(&entry.severity).ok_or_else(|| CorpusError::InvalidEntry {
                    index,
                    message: format!("unknown severity: {}", entry.severity),
                })?;
            if entry.description.trim().is_empty() {
                return Err(CorpusError::InvalidEntry {
                    index,
                    message: "description must not be empty".to_string(),
                });
            }

            let pair = PairKey::new(food, drug);
            if !seen.insert(pair.clone()) {
                return Err(CorpusError::DuplicatePair {
                    pair: pair.to_string(),
                });
            }

            records.push(InteractionRecord {
                pair,
                severity,
                description: entry.description,
                provenance: Provenance::Exact,
                confidence: None,
                updated_at: entry.updated_at,
            });
        }

        tracing::debug!(entries = records.len(), "Curated corpus loaded");
        Ok(Self { records })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn into_records(self) -> Vec<InteractionRecord> {
        self.records
    }
}
