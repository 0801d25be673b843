//! The shared indexed store (§4.4): a `Writer`/`Store` split over a `DashMap`, mirroring
//! `kube_runtime::reflector::store`, plus named secondary indexes fed by user-supplied
//! index functions (needed here because `rp-runtime`'s listers query by resource group,
//! owning cluster, and "active operations for a cluster" rather than just by id).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rp_core::{Resource, ResourceId};
use tokio::sync::watch;

use crate::watcher::Event;

/// Computes the index keys a document should be filed under for one named index.
/// Returns zero keys to mean "not indexed under this name".
pub type IndexFn<K> = fn(&K) -> Vec<String>;

/// The classified effect of applying one [`Event`] to the store, handed to the
/// dispatcher so it can tell an add from an update (the store has already overwritten
/// the old value by the time a handler would otherwise ask).
pub enum Change<K> {
    Add(Arc<K>),
    Update { old: Arc<K>, new: Arc<K> },
    Delete(Arc<K>),
}

struct Indexed<K> {
    func: IndexFn<K>,
    by_value: dashmap::DashMap<String, HashSet<ResourceId>>,
}

struct Inner<K> {
    store: dashmap::DashMap<ResourceId, Arc<K>>,
    indexes: HashMap<&'static str, Indexed<K>>,
}

/// The write side of the store. Exactly one `Writer` exists per kind, owned by that
/// kind's reflector task.
pub struct Writer<K> {
    inner: Arc<Inner<K>>,
    ready_tx: watch::Sender<bool>,
}

/// A cheaply `Clone`-able read handle, handed out to listers and the orphan sweep.
#[derive(Clone)]
pub struct Store<K> {
    inner: Arc<Inner<K>>,
    ready_rx: watch::Receiver<bool>,
}

impl<K: Resource> Writer<K> {
    #[must_use]
    pub fn new(indexes: Vec<(&'static str, IndexFn<K>)>) -> Self {
        let indexes = indexes
            .into_iter()
            .map(|(name, func)| (name, Indexed { func, by_value: dashmap::DashMap::new() }))
            .collect();
        let (ready_tx, _ready_rx) = watch::channel(false);
        Self {
            inner: Arc::new(Inner { store: dashmap::DashMap::new(), indexes }),
            ready_tx,
        }
    }

    #[must_use]
    pub fn as_reader(&self) -> Store<K> {
        Store { inner: Arc::clone(&self.inner), ready_rx: self.ready_tx.subscribe() }
    }

    /// Signal that the store is safe to read from: the first list has landed. Lets the
    /// controller skeleton and the orphan sweep avoid a thundering herd of `NotFound`
    /// reconciles right after process start (§4.4 supplemented feature).
    pub fn mark_ready(&self) {
        let _ = self.ready_tx.send(true);
    }

    /// Apply one event, updating the store and every named index. Returns the
    /// classified [`Change`] for the dispatcher, or `None` if a `Deleted` event named a
    /// key that was already absent (a duplicate relist diff, harmless but not worth
    /// dispatching).
    pub fn apply(&self, event: Event<K>) -> Option<Change<K>> {
        match event {
            Event::Applied(doc) => {
                let id = doc.id().clone();
                let old = self.inner.store.insert(id.clone(), Arc::clone(&doc));
                if let Some(old) = &old {
                    self.unindex(old, &id);
                }
                self.index(&doc, &id);
                Some(match old {
                    Some(old) => Change::Update { old, new: doc },
                    None => Change::Add(doc),
                })
            }
            Event::Deleted(id) => {
                let removed = self.inner.store.remove(&id);
                removed.map(|(_, old)| {
                    self.unindex(&old, &id);
                    Change::Delete(old)
                })
            }
        }
    }

    fn index(&self, doc: &K, id: &ResourceId) {
        for indexed in self.inner.indexes.values() {
            for key in (indexed.func)(doc) {
                indexed.by_value.entry(key).or_default().insert(id.clone());
            }
        }
    }

    fn unindex(&self, doc: &K, id: &ResourceId) {
        for indexed in self.inner.indexes.values() {
            for key in (indexed.func)(doc) {
                if let Some(mut ids) = indexed.by_value.get_mut(&key) {
                    ids.remove(id);
                }
            }
        }
    }
}

impl<K: Resource> Store<K> {
    #[must_use]
    pub fn get(&self, id: &ResourceId) -> Option<Arc<K>> {
        self.inner.store.get(id).map(|entry| Arc::clone(entry.value()))
    }

    #[must_use]
    pub fn list(&self) -> Vec<Arc<K>> {
        self.inner.store.iter().map(|entry| Arc::clone(entry.value())).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.store.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.store.is_empty()
    }

    /// Documents filed under `value` in the named index, or an empty vec if the index
    /// doesn't exist or has nothing filed under that value.
    #[must_use]
    pub fn list_by_index(&self, index: &str, value: &str) -> Vec<Arc<K>> {
        let Some(indexed) = self.inner.indexes.get(index) else {
            return Vec::new();
        };
        let Some(ids) = indexed.by_value.get(value) else {
            return Vec::new();
        };
        ids.iter().filter_map(|id| self.get(id)).collect()
    }

    /// Resolves once the initial list has landed.
    pub async fn wait_until_ready(&self) {
        let mut rx = self.ready_rx.clone();
        if *rx.borrow() {
            return;
        }
        while rx.changed().await.is_ok() {
            if *rx.borrow() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rp_core::entities::{Operation, OperationStatus};
    use rp_core::{CosmosMetadata, ResourceId};
    use uuid::Uuid;

    use super::*;

    fn sub() -> Uuid {
        "11111111-1111-1111-1111-111111111111".parse().unwrap()
    }

    fn op(name: &str, external: ResourceId, status: OperationStatus) -> Operation {
        Operation {
            id: ResourceId::new_subscription_scoped(
                sub(),
                rp_core::resource_id::PROVIDER_NAMESPACE,
                vec![("operations".into(), name.into())],
            ),
            metadata: CosmosMetadata::new("e0", chrono::Utc::now()),
            external_id: external,
            status,
        }
    }

    fn by_external(o: &Operation) -> Vec<String> {
        vec![o.external_id.to_string()]
    }

    #[test]
    fn applied_then_applied_again_is_an_update() {
        let writer: Writer<Operation> = Writer::new(vec![("external", by_external)]);
        let cluster = ResourceId::new(
            sub(),
            "rg",
            rp_core::resource_id::PROVIDER_NAMESPACE,
            vec![("hcpopenshiftclusters".into(), "c".into())],
        );
        let first = op("op1", cluster.clone(), OperationStatus::Running);
        let change = writer.apply(Event::Applied(Arc::new(first))).unwrap();
        assert!(matches!(change, Change::Add(_)));

        let second = op("op1", cluster.clone(), OperationStatus::Succeeded);
        let change = writer.apply(Event::Applied(Arc::new(second))).unwrap();
        assert!(matches!(change, Change::Update { .. }));

        let reader = writer.as_reader();
        let found = reader.list_by_index("external", &cluster.to_string());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].status, OperationStatus::Succeeded);
    }

    #[test]
    fn deleted_removes_from_store_and_index() {
        let writer: Writer<Operation> = Writer::new(vec![("external", by_external)]);
        let cluster = ResourceId::new(
            sub(),
            "rg",
            rp_core::resource_id::PROVIDER_NAMESPACE,
            vec![("hcpopenshiftclusters".into(), "c".into())],
        );
        let doc = op("op1", cluster.clone(), OperationStatus::Running);
        let id = doc.id.clone();
        writer.apply(Event::Applied(Arc::new(doc)));
        writer.apply(Event::Deleted(id.clone()));

        let reader = writer.as_reader();
        assert!(reader.get(&id).is_none());
        assert!(reader.list_by_index("external", &cluster.to_string()).is_empty());
    }

    #[tokio::test]
    async fn wait_until_ready_resolves_after_mark_ready() {
        let writer: Writer<Operation> = Writer::new(Vec::new());
        let reader = writer.as_reader();
        writer.mark_ready();
        tokio::time::timeout(std::time::Duration::from_millis(50), reader.wait_until_ready())
            .await
            .expect("wait_until_ready should resolve promptly once marked ready");
    }
}
