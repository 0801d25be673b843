//! Cross-subscription listing, used only by the informer's initial list and by the
//! orphan sweep / mismatch detector's full scans (§4.11) — everything else goes through
//! [`crate::api::DocumentApi::list`]'s scoped listing instead.

use std::marker::PhantomData;
use std::sync::Arc;

use rp_core::Resource;
use serde::de::DeserializeOwned;

use crate::api::Pages;
use crate::backend::Backend;

pub struct GlobalLister<K, B> {
    backend: Arc<B>,
    _kind: PhantomData<fn() -> K>,
}

impl<K, B> Clone for GlobalLister<K, B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            _kind: PhantomData,
        }
    }
}

impl<K, B> GlobalLister<K, B>
where
    K: Resource + DeserializeOwned,
    B: Backend,
{
    #[must_use]
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend, _kind: PhantomData }
    }

    #[must_use]
    pub fn list_all(&self) -> Pages<K> {
        Pages::global(Arc::clone(&self.backend), K::kind())
    }
}
