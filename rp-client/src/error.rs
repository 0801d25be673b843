//! Errors surfaced by the database client abstraction (§4.1/§7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("optimistic concurrency conflict on {0}")]
    Conflict(String),

    /// The change feed's continuation token for a range was rejected by the backend as
    /// stale. Distinct from [`Error::Io`] so the reader knows to restart the range from
    /// its beginning rather than retry the same token with backoff.
    #[error("feed range continuation expired: {0}")]
    FeedRangeExpired(String),

    #[error("backend transport error: {0}")]
    Io(String),

    #[error("failed to decode stored document")]
    Decode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
