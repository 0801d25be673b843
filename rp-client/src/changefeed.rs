//! The change feed client (§4.1/§4.2): feed-range discovery and raw, kind-tagged
//! document pages. Decoding into a typed [`rp_core::Resource`] and dispatch to a
//! [`crate::backend::FeedRange`]-scoped watcher set happens one layer up, in
//! `rp-runtime`'s change-feed reader.

use std::sync::Arc;

use crate::backend::{Backend, FeedPage, FeedRange};
use crate::error::Result;

pub struct ChangeFeedClient<B> {
    backend: Arc<B>,
}

impl<B> Clone for ChangeFeedClient<B> {
    fn clone(&self) -> Self {
        Self { backend: Arc::clone(&self.backend) }
    }
}

impl<B: Backend> ChangeFeedClient<B> {
    #[must_use]
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub async fn feed_ranges(&self) -> Result<Vec<FeedRange>> {
        self.backend.feed_ranges().await
    }

    /// Read the next page from `range`. Pass `None` on a range's first read (the
    /// backend computes a start-from-time); pass the prior page's continuation on every
    /// subsequent call. The reader must only persist the returned continuation after it
    /// has successfully processed every document in the page (§4.2).
    pub async fn read_from(&self, range: &FeedRange, continuation: Option<&str>) -> Result<FeedPage> {
        self.backend.read_feed_page(range, continuation).await
    }
}
