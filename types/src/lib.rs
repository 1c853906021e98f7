//! Core domain types for Kava.
//!
//! This crate contains pure domain types with no IO, no async, and minimal
//! dependencies. Everything here can be used from any layer of the
//! application.

mod evidence;
mod ids;
mod interaction;
mod mention;
mod substance;

pub use evidence::{EvidenceBundle, PairEvidence, PairOutcome, TurnResult};
pub use ids::{MentionId, ThreadId};
pub use interaction::{InteractionRecord, PairKey, Provenance, Severity};
pub use mention::SubstanceMention;
pub use substance::{InvalidSubstanceName, SubstanceCategory, SubstanceName};
