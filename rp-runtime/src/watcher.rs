//! Watcher sets and the expiring watcher (§4.3) — the layer between the per-feed-range
//! change-feed reader (owned by [`crate::changefeed_reader`]) and the reflector
//! (§4.4). A `WatcherSet<K>` fans each decoded document out to every handle registered
//! for that kind; an `ExpiringWatcher<K, B>` is the reflector's list-then-watch
//! interface over one such set.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use futures::StreamExt;
use rp_client::{Backend, GlobalLister};
use rp_core::{Resource, ResourceId};
use tokio::sync::mpsc;
use tokio::time::Instant;

/// A change to a stored document. The change feed itself only ever produces
/// [`Event::Applied`] (§4.3: "the framework never emits Deleted from the change feed");
/// [`Event::Deleted`] is synthesized by the reflector when a relist finds a key has
/// dropped out of the listing (§4.4/§9) — it never travels through a [`WatcherSet`].
#[derive(Clone, Debug)]
pub enum Event<K> {
    Applied(Arc<K>),
    Deleted(ResourceId),
}

struct Sink<K> {
    id: u64,
    sender: mpsc::UnboundedSender<Event<K>>,
}

/// Registered listeners for one kind's change-feed traffic. `publish` drops the event
/// on the floor if nobody is registered (§4.3) — there is always exactly one live
/// registrant in practice (the reflector), but the set doesn't assume that.
pub struct WatcherSet<K> {
    sinks: Mutex<Vec<Sink<K>>>,
    next_id: AtomicU64,
}

impl<K> Default for WatcherSet<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> WatcherSet<K> {
    #[must_use]
    pub fn new() -> Self {
        Self { sinks: Mutex::new(Vec::new()), next_id: AtomicU64::new(0) }
    }

    pub fn publish(&self, doc: Arc<K>) {
        let sinks = self.sinks.lock().expect("watcher set lock poisoned");
        for sink in sinks.iter() {
            // A closed receiver means the handle was dropped; the next deregister call
            // (or the set's own lazy cleanup) will drop the dead sink.
            let _ = sink.sender.send(Event::Applied(Arc::clone(&doc)));
        }
    }

    fn deregister(&self, id: u64) {
        self.sinks.lock().expect("watcher set lock poisoned").retain(|s| s.id != id);
    }
}

impl<K> WatcherSet<K>
where
    K: Send + 'static,
{
    #[must_use]
    pub fn register(self: &Arc<Self>) -> WatcherHandle<K> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.sinks.lock().expect("watcher set lock poisoned").push(Sink { id, sender });
        WatcherHandle {
            id,
            owner: Arc::downgrade(self),
            receiver,
            known_keys: HashSet::new(),
        }
    }
}

/// One registered listener's view of a [`WatcherSet`]: an event receiver plus the set
/// of keys this handle has already seen, so a caller can tell an initial `Applied`
/// apart from a later update within one list-to-relist epoch (§4.3).
pub struct WatcherHandle<K> {
    id: u64,
    owner: Weak<WatcherSet<K>>,
    receiver: mpsc::UnboundedReceiver<Event<K>>,
    known_keys: HashSet<ResourceId>,
}

impl<K> WatcherHandle<K> {
    pub async fn recv(&mut self) -> Option<Event<K>> {
        self.receiver.recv().await
    }

    /// Record `id` as seen, returning whether it had not been seen before since the
    /// last [`Self::clear_known_keys`].
    pub fn mark_seen(&mut self, id: &ResourceId) -> bool {
        self.known_keys.insert(id.clone())
    }

    pub fn clear_known_keys(&mut self) {
        self.known_keys.clear();
    }
}

impl<K> Drop for WatcherHandle<K> {
    fn drop(&mut self) {
        if let Some(owner) = self.owner.upgrade() {
            owner.deregister(self.id);
        }
    }
}

/// Reported when the live watch has run for `relist_period` without the caller calling
/// [`ExpiringWatcher::list`] again. Mirrors the 410-Gone-triggered relist in
/// `kube_runtime::watcher`, except expiry here is purely time-based — the change feed
/// carries no resource-version concept to signal staleness with (§4.3).
#[derive(Debug)]
pub struct WatchExpired;

/// The reflector's list-then-watch interface over one kind's [`WatcherSet`], backed by
/// a [`GlobalLister`] for the "list" half.
pub struct ExpiringWatcher<K, B> {
    watchers: Arc<WatcherSet<K>>,
    lister: GlobalLister<K, B>,
    relist_period: Duration,
    handle: Option<WatcherHandle<K>>,
    deadline: Option<Instant>,
}

impl<K, B> ExpiringWatcher<K, B>
where
    K: Resource + serde::de::DeserializeOwned,
    B: Backend,
{
    #[must_use]
    pub fn new(watchers: Arc<WatcherSet<K>>, lister: GlobalLister<K, B>, relist_period: Duration) -> Self {
        Self { watchers, lister, relist_period, handle: None, deadline: None }
    }

    /// List every document of this kind, across subscriptions, and (re)establish the
    /// live watch subscription `watch()` streams from. Clears the subscription's
    /// known-keys set so the caller can again distinguish add from update.
    pub async fn list(&mut self) -> Result<Vec<Arc<K>>, rp_client::Error> {
        let mut handle = self.watchers.register();
        handle.clear_known_keys();

        let mut items = Vec::new();
        let mut pages = self.lister.list_all();
        while let Some(item) = pages.next().await {
            let item = Arc::new(item?);
            handle.mark_seen(item.id());
            items.push(item);
        }

        self.deadline = Some(Instant::now() + self.relist_period);
        self.handle = Some(handle);
        Ok(items)
    }

    /// Await the next event, or [`WatchExpired`] once `relist_period` has elapsed since
    /// the last [`Self::list`]. The caller (the reflector) relists on expiry.
    pub async fn watch(&mut self) -> Result<Event<K>, WatchExpired> {
        let deadline = self.deadline.ok_or(WatchExpired)?;
        let handle = self.handle.as_mut().ok_or(WatchExpired)?;
        tokio::select! {
            event = handle.recv() => event.ok_or(WatchExpired),
            () = tokio::time::sleep_until(deadline) => Err(WatchExpired),
        }
    }
}

/// Type-erased publish target for the change-feed reader's kind registry (§4.2): the
/// reader only knows a document's [`rp_core::ResourceKind`] at runtime, so it looks up
/// a `dyn RawSink` rather than a `WatcherSet<K>` directly.
pub trait RawSink: Send + Sync {
    fn publish_raw(&self, body: serde_json::Value) -> Result<(), serde_json::Error>;
}

impl<K> RawSink for Arc<WatcherSet<K>>
where
    K: serde::de::DeserializeOwned + Send + Sync + 'static,
{
    fn publish_raw(&self, body: serde_json::Value) -> Result<(), serde_json::Error> {
        let doc: K = serde_json::from_value(body)?;
        self.publish(Arc::new(doc));
        Ok(())
    }
}
