//! Error kinds shared by every layer built on top of `rp-core` (§7).
//!
//! These are the client-less error kinds: `NotFound`/`Conflict` are distinguished here
//! because every layer above (the database client, the listers, the controllers) needs
//! to match on them specifically, not just treat them as opaque I/O failures.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("optimistic concurrency conflict on {0}")]
    Conflict(String),
}
