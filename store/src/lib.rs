//! Substance log - persistent storage for logged food/medication mentions.
//!
//! This crate provides SQLite-backed, append-only storage for substance
//! mentions per conversation thread. Writes are transactional per mention:
//! an append either fully commits or is fully rejected as a duplicate,
//! never partially applied.
//!
//! Duplicate detection makes logging idempotent inside a configurable
//! window: the same normalized substance in the same thread with a
//! timestamp within the tolerance is rejected rather than re-inserted.
//! There is no update or delete of an individual mention; the only
//! destructive operation is an explicit per-thread reset.

mod db_path;
mod log;

pub use log::{AppendOutcome, LoggedMention, SubstanceLog};
