//! The per-document metadata block every kind carries in the authoritative store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque version tag plus timestamp attached to every stored document.
///
/// `etag` is never interpreted by this crate; it is only ever compared for equality by
/// `Backend::replace`, which is where optimistic concurrency is enforced.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CosmosMetadata {
    pub etag: String,
    pub last_modified: Option<DateTime<Utc>>,
}

impl CosmosMetadata {
    #[must_use]
    pub fn new(etag: impl Into<String>, last_modified: DateTime<Utc>) -> Self {
        Self {
            etag: etag.into(),
            last_modified: Some(last_modified),
        }
    }
}
