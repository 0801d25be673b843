//! The facade most callers reach for: one `Client<B>` per process, handed out to every
//! controller, from which per-kind typed APIs are cheaply constructed (mirrors
//! `kube::Client` fanning out into `kube::Api<K>` handles over a shared connection).

use std::sync::Arc;

use rp_core::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::api::DocumentApi;
use crate::backend::Backend;
use crate::changefeed::ChangeFeedClient;
use crate::lister::GlobalLister;

#[derive(Clone)]
pub struct Client<B> {
    backend: Arc<B>,
}

impl<B: Backend> Client<B> {
    #[must_use]
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    #[must_use]
    pub fn api<K>(&self) -> DocumentApi<K, B>
    where
        K: Resource + Serialize + DeserializeOwned,
    {
        DocumentApi::new(Arc::clone(&self.backend))
    }

    #[must_use]
    pub fn global_lister<K>(&self) -> GlobalLister<K, B>
    where
        K: Resource + DeserializeOwned,
    {
        GlobalLister::new(Arc::clone(&self.backend))
    }

    #[must_use]
    pub fn change_feed(&self) -> ChangeFeedClient<B> {
        ChangeFeedClient::new(Arc::clone(&self.backend))
    }
}
