//! Typed CRUD over a [`Backend`], mirroring the shape of `kube_client::Api`'s
//! get/create/replace/delete/list methods but against a document kind instead of a
//! Kubernetes API resource.

use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use rp_core::{Resource, ResourceId};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::params::{ListParams, ListScope};

/// A lazily-paginated stream of typed documents. Continues fetching continuation pages
/// until the backend signals no more results; a decode failure or backend error
/// surfaces as the stream's final `Err` item and ends the stream (§4.1).
pub struct Pages<K> {
    inner: Pin<Box<dyn Stream<Item = Result<K>> + Send>>,
}

impl<K> Stream for Pages<K> {
    type Item = Result<K>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl<K: DeserializeOwned + Send + 'static> Pages<K> {
    fn scoped<B: Backend>(backend: Arc<B>, kind: rp_core::ResourceKind, scope: ListScope) -> Self {
        let stream = async_stream::stream! {
            let mut continuation = None;
            loop {
                let params = ListParams { continuation: continuation.clone(), limit: None };
                let page = match backend.list_page(kind.clone(), &scope, params).await {
                    Ok(page) => page,
                    Err(err) => {
                        yield Err(err);
                        return;
                    }
                };
                for item in page.items {
                    yield serde_json::from_value::<K>(item).map_err(Error::from);
                }
                match page.continuation {
                    Some(token) => continuation = Some(token),
                    None => return,
                }
            }
        };
        Self { inner: Box::pin(stream) }
    }

    pub(crate) fn global<B: Backend>(backend: Arc<B>, kind: rp_core::ResourceKind) -> Self {
        let stream = async_stream::stream! {
            let mut continuation = None;
            loop {
                let params = ListParams { continuation: continuation.clone(), limit: None };
                let page = match backend.list_all_page(kind.clone(), params).await {
                    Ok(page) => page,
                    Err(err) => {
                        yield Err(err);
                        return;
                    }
                };
                for item in page.items {
                    yield serde_json::from_value::<K>(item).map_err(Error::from);
                }
                match page.continuation {
                    Some(token) => continuation = Some(token),
                    None => return,
                }
            }
        };
        Self { inner: Box::pin(stream) }
    }
}

/// Thin typed wrapper over a [`Backend`] for one resource kind `K`.
pub struct DocumentApi<K, B> {
    backend: Arc<B>,
    _kind: PhantomData<fn() -> K>,
}

impl<K, B> Clone for DocumentApi<K, B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            _kind: PhantomData,
        }
    }
}

impl<K, B> DocumentApi<K, B>
where
    K: Resource + Serialize + DeserializeOwned,
    B: Backend,
{
    #[must_use]
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend, _kind: PhantomData }
    }

    pub async fn get(&self, id: &ResourceId) -> Result<K> {
        let value = self.backend.get(K::kind(), id).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn create(&self, doc: &K) -> Result<K> {
        let body = serde_json::to_value(doc)?;
        let created = self.backend.create(K::kind(), body).await?;
        Ok(serde_json::from_value(created)?)
    }

    /// Optimistic concurrency: `doc.metadata().etag` must match the stored document's
    /// etag or the backend returns [`Error::Conflict`] (§4.1).
    pub async fn replace(&self, doc: &K) -> Result<K> {
        let etag = doc.metadata().etag.clone();
        let body = serde_json::to_value(doc)?;
        let replaced = self.backend.replace(K::kind(), doc.id(), &etag, body).await?;
        Ok(serde_json::from_value(replaced)?)
    }

    pub async fn delete(&self, id: &ResourceId) -> Result<()> {
        self.backend.delete(K::kind(), id).await
    }

    #[must_use]
    pub fn list(&self, scope: ListScope) -> Pages<K> {
        Pages::scoped(Arc::clone(&self.backend), K::kind(), scope)
    }
}
