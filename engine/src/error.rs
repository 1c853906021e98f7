use thiserror::Error;

/// Errors surfaced across the engine boundary.
///
/// Resolver-tier failures (index offline, web timeouts) never appear here;
/// they are absorbed into per-pair outcomes. Only log-store failures make a
/// turn fail, because committed evidence can no longer be trusted to be
/// complete.
#[derive(Debug, Error)]
pub enum TurnError {
    /// A substance log write or read could not be guaranteed. The turn
    /// moves to `Failed` and the user gets a generic apology instead of a
    /// partial advisory.
    #[error("substance log failure: {0}")]
    Persistence(String),

    /// A turn-machine invariant was violated. Indicates a bug, not an
    /// environmental condition.
    #[error("invalid turn transition: {0}")]
    InvalidTransition(String),
}

/// Errors that prevent the engine from starting at all.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("substance log unreachable at startup: {0}")]
    StoreUnreachable(String),

    #[error("curated corpus failed to load: {0}")]
    Corpus(#[from] kava_index::CorpusError),
}
