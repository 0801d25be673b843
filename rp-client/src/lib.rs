//! The database client abstraction (§4.1) and the change feed (§4.2): typed CRUD,
//! global listers, and a feed-range-partitioned change feed, all behind a [`Backend`]
//! trait whose concrete (HTTP/TLS/Cosmos-SDK) implementation is out of scope here.
//!
//! `rp-runtime` builds its watcher sets and informer on top of this crate exactly the
//! way `kube_runtime::watcher` builds on `kube_client::Api`.

pub mod api;
pub mod backend;
pub mod changefeed;
pub mod client;
pub mod error;
pub mod lister;
pub mod params;

#[cfg(feature = "testing")]
pub mod testing;

pub use api::{DocumentApi, Pages};
pub use backend::{Backend, ChangeFeedDocument, DocumentHeader, FeedPage, FeedRange, Page};
pub use changefeed::ChangeFeedClient;
pub use client::Client;
pub use error::{Error, Result};
pub use lister::GlobalLister;
pub use params::{ListParams, ListScope};
