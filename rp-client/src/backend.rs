//! The `Backend` trait: the database transport seam (§4.1). A concrete implementation
//! talks to the real document store over HTTPS; that transport, credential handling,
//! and request signing are out of scope here (§1) — this crate only defines the
//! contract and a typed client built on top of it.

use chrono::{DateTime, Utc};
use rp_core::{ResourceId, ResourceKind};
use serde_json::Value;

use crate::error::Result;
use crate::params::{ListParams, ListScope};

/// One page of untyped documents plus the token to fetch the next page, if any.
#[derive(Clone, Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub continuation: Option<String>,
}

/// A change-feed partition. Backends may have one range or many; the reader spawns one
/// worker task per range (§4.2) and treats ranges as opaque beyond their id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FeedRange(pub String);

/// The kind-tagged header every change-feed document carries, independent of its body.
#[derive(Clone, Debug)]
pub struct DocumentHeader {
    pub kind: ResourceKind,
    pub id: ResourceId,
    pub timestamp: DateTime<Utc>,
}

/// A single change-feed entry. The feed does not distinguish a new document from an
/// updated one (§4.1) — that classification happens one layer up, in the watcher
/// (§4.3), against its own known-keys set.
#[derive(Clone, Debug)]
pub struct ChangeFeedDocument {
    pub header: DocumentHeader,
    pub body: Value,
}

/// One page of change-feed documents read from a single [`FeedRange`].
#[derive(Clone, Debug)]
pub struct FeedPage {
    pub documents: Vec<ChangeFeedDocument>,
    /// The continuation to resume this range from. Advances only when the caller
    /// successfully processes every document in the page (§4.2) — it is the reader's
    /// job to withhold persisting this token until then, not this type's.
    pub continuation: String,
    pub has_more: bool,
}

/// The database transport seam. Every method is keyed by [`ResourceKind`] rather than
/// by a generic type parameter because the backend itself is untyped — typed
/// (de)serialization lives one layer up in [`crate::api::DocumentApi`].
pub trait Backend: Send + Sync + 'static {
    fn get(
        &self,
        kind: ResourceKind,
        id: &ResourceId,
    ) -> impl Future<Output = Result<Value>> + Send;

    fn create(&self, kind: ResourceKind, body: Value) -> impl Future<Output = Result<Value>> + Send;

    /// Optimistic concurrency: the backend must reject with [`crate::error::Error::Conflict`]
    /// if `etag` does not match the currently stored document's etag.
    fn replace(
        &self,
        kind: ResourceKind,
        id: &ResourceId,
        etag: &str,
        body: Value,
    ) -> impl Future<Output = Result<Value>> + Send;

    fn delete(&self, kind: ResourceKind, id: &ResourceId) -> impl Future<Output = Result<()>> + Send;

    fn list_page(
        &self,
        kind: ResourceKind,
        scope: &ListScope,
        params: ListParams,
    ) -> impl Future<Output = Result<Page<Value>>> + Send;

    /// Cross-subscription listing, used only by the informer's initial list and by the
    /// orphan sweep / mismatch detector's full scans (§4.11).
    fn list_all_page(
        &self,
        kind: ResourceKind,
        params: ListParams,
    ) -> impl Future<Output = Result<Page<Value>>> + Send;

    fn feed_ranges(&self) -> impl Future<Output = Result<Vec<FeedRange>>> + Send;

    fn read_feed_page(
        &self,
        range: &FeedRange,
        continuation: Option<&str>,
    ) -> impl Future<Output = Result<FeedPage>> + Send;
}
