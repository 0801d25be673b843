//! Fans store changes out to registered handlers (§4.4), with two guarantees called
//! out by name: a handler registered after startup gets a synthetic `on_add` replay
//! of everything already in the store, and that replay can never interleave with a
//! live update for the same key; and a handler can ask to be resynced (replayed in
//! full) on a period independent of real change traffic.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use rp_core::Resource;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::reflector::store::{Change, Store};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A reconciliation-agnostic subscriber to one kind's store changes. The cluster
/// watching controller skeleton (§4.8) is itself a `Handler` that turns `on_add`/
/// `on_update` into work-queue admissions after a cooldown check.
pub trait Handler<K>: Send + Sync {
    fn on_add(&self, obj: Arc<K>) -> BoxFuture<'_, ()>;
    fn on_update(&self, old: Arc<K>, new: Arc<K>) -> BoxFuture<'_, ()>;
    fn on_delete(&self, obj: Arc<K>) -> BoxFuture<'_, ()>;

    /// `None` disables periodic resync for this handler (the default).
    fn resync_period(&self) -> Option<Duration> {
        None
    }
}

struct Registered<K> {
    handler: Arc<dyn Handler<K>>,
    last_resync: Instant,
}

pub struct Dispatcher<K> {
    store: Store<K>,
    handlers: Mutex<Vec<Registered<K>>>,
}

impl<K: Resource> Dispatcher<K> {
    #[must_use]
    pub fn new(store: Store<K>) -> Self {
        Self { store, handlers: Mutex::new(Vec::new()) }
    }

    /// Register a handler. Blocks on the store's startup gate (§4.4 supplemented
    /// feature) so a late join's replay never races the initial list, then replays the
    /// store's current contents as synthetic `on_add` calls while holding the
    /// dispatcher's own lock — which is also what `dispatch` holds, so no concurrent
    /// `on_update` for the same key can land mid-replay (§9).
    pub async fn register(&self, handler: Arc<dyn Handler<K>>) {
        self.store.wait_until_ready().await;
        let mut handlers = self.handlers.lock().await;
        for obj in self.store.list() {
            handler.on_add(obj).await;
        }
        handlers.push(Registered { handler, last_resync: Instant::now() });
    }

    pub async fn dispatch(&self, change: Change<K>) {
        let handlers = self.handlers.lock().await;
        for reg in handlers.iter() {
            match &change {
                Change::Add(obj) => reg.handler.on_add(Arc::clone(obj)).await,
                Change::Update { old, new } => {
                    reg.handler.on_update(Arc::clone(old), Arc::clone(new)).await;
                }
                Change::Delete(obj) => reg.handler.on_delete(Arc::clone(obj)).await,
            }
        }
    }

    /// Called on a fixed check period (`resync_check_period`, always `<=` every
    /// registered handler's own `resync_period`, per §4.4: a handler's effective resync
    /// period is clamped up to at least the check period). Replays the whole store as
    /// `on_update(old, old)` for every handler whose period has elapsed.
    pub async fn resync_tick(&self) {
        let mut handlers = self.handlers.lock().await;
        let now = Instant::now();
        for reg in handlers.iter_mut() {
            let Some(period) = reg.handler.resync_period() else { continue };
            if now.duration_since(reg.last_resync) < period {
                continue;
            }
            reg.last_resync = now;
            for obj in self.store.list() {
                reg.handler.on_update(Arc::clone(&obj), obj).await;
            }
        }
    }
}
