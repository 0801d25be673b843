//! Typed, store-backed listers (§4.5). Every query goes through the shared indexed
//! store rather than the database — the lowercase canonical [`ResourceId`] string is
//! the single source of truth for equality across this whole layer.

use std::sync::Arc;

use rp_core::entities::Operation;
use rp_core::{Resource, ResourceId};

use crate::reflector::store::Store;

pub const INDEX_RESOURCE_GROUP: &str = "resource_group";
pub const INDEX_CLUSTER: &str = "cluster";

#[derive(Debug)]
pub struct NotFound(pub ResourceId);

/// A read-only, store-backed view over one kind.
#[derive(Clone)]
pub struct Lister<K> {
    store: Store<K>,
}

impl<K: Resource> Lister<K> {
    #[must_use]
    pub fn new(store: Store<K>) -> Self {
        Self { store }
    }

    pub fn get(&self, id: &ResourceId) -> Result<Arc<K>, NotFound> {
        self.store.get(id).ok_or_else(|| NotFound(id.clone()))
    }

    #[must_use]
    pub fn list(&self) -> Vec<Arc<K>> {
        self.store.list()
    }

    /// Every stored document whose resource group matches `resource_group_id`'s.
    /// Requires the store to have been built with an index named
    /// [`INDEX_RESOURCE_GROUP`].
    #[must_use]
    pub fn list_for_resource_group(&self, resource_group_id: &ResourceId) -> Vec<Arc<K>> {
        match resource_group_id.resource_group() {
            Some(rg) => self.store.list_by_index(INDEX_RESOURCE_GROUP, rg),
            None => Vec::new(),
        }
    }

    /// Every stored document owned, directly or transitively, by the given cluster.
    /// Requires the store to have been built with an index named [`INDEX_CLUSTER`].
    #[must_use]
    pub fn list_for_cluster(&self, cluster_id: &ResourceId) -> Vec<Arc<K>> {
        self.store.list_by_index(INDEX_CLUSTER, &cluster_id.to_string())
    }
}

impl Lister<Operation> {
    /// Non-terminal operations owned by the given cluster — the query the cooldown
    /// checker's `ActiveOperationPrioritizingCooldown` variant is built on (§4.7).
    #[must_use]
    pub fn list_active_operations_for_cluster(&self, cluster_id: &ResourceId) -> Vec<Arc<Operation>> {
        self.list_for_cluster(cluster_id)
            .into_iter()
            .filter(|op| !op.is_terminal())
            .collect()
    }
}

/// Index function: file a document under its own resource group, if any (for use with
/// [`crate::reflector::store::Writer::new`]).
pub fn index_by_resource_group<K: Resource>(doc: &K) -> Vec<String> {
    doc.id().resource_group().map(str::to_owned).into_iter().collect()
}

/// Index function: file an `Operation` under the cluster its `external_id` targets,
/// rather than under its own id — an operation's id has no cluster segment of its own
/// (§3), it only references one via `external_id`.
pub fn index_operation_by_cluster(op: &Operation) -> Vec<String> {
    op.external_id.cluster_id().map(|id| id.to_string()).into_iter().collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rp_core::entities::{HcpCluster, Operation, OperationStatus};
    use rp_core::entities::hcp_cluster::{DnsSpec, ProvisioningState};
    use rp_core::CosmosMetadata;
    use uuid::Uuid;

    use super::*;
    use crate::reflector::store::Writer;
    use crate::watcher::Event;

    fn sub() -> Uuid {
        "88888888-8888-8888-8888-888888888888".parse().unwrap()
    }

    fn cluster_id(rg: &str, name: &str) -> ResourceId {
        ResourceId::new(sub(), rg, rp_core::resource_id::PROVIDER_NAMESPACE, vec![("hcpopenshiftclusters".into(), name.into())])
    }

    fn cluster(rg: &str, name: &str) -> HcpCluster {
        HcpCluster {
            id: cluster_id(rg, name),
            metadata: CosmosMetadata::new("e0", chrono::Utc::now()),
            cluster_service_id: None,
            dns: DnsSpec::default(),
            provisioning_state: ProvisioningState::Succeeded,
        }
    }

    #[test]
    fn get_finds_a_stored_document_by_id_and_rejects_an_absent_one() {
        let writer: Writer<HcpCluster> = Writer::new(vec![(INDEX_RESOURCE_GROUP, index_by_resource_group)]);
        let c = cluster("rg-a", "one");
        writer.apply(Event::Applied(Arc::new(c.clone())));
        let lister = Lister::new(writer.as_reader());

        assert_eq!(lister.get(&c.id).unwrap().id, c.id);
        assert!(lister.get(&cluster_id("rg-a", "missing")).is_err());
    }

    #[test]
    fn list_for_resource_group_only_returns_that_groups_documents() {
        let writer: Writer<HcpCluster> = Writer::new(vec![(INDEX_RESOURCE_GROUP, index_by_resource_group)]);
        writer.apply(Event::Applied(Arc::new(cluster("rg-a", "one"))));
        writer.apply(Event::Applied(Arc::new(cluster("rg-a", "two"))));
        writer.apply(Event::Applied(Arc::new(cluster("rg-b", "three"))));
        let lister = Lister::new(writer.as_reader());

        let rg_a = lister.list_for_resource_group(&cluster_id("rg-a", "one"));
        assert_eq!(rg_a.len(), 2);
        assert_eq!(lister.list().len(), 3);
    }

    fn op(cluster: &ResourceId, name: &str, status: OperationStatus) -> Operation {
        Operation {
            id: ResourceId::new_subscription_scoped(sub(), rp_core::resource_id::PROVIDER_NAMESPACE, vec![("operations".into(), name.into())]),
            metadata: CosmosMetadata::new("e0", chrono::Utc::now()),
            external_id: cluster.clone(),
            status,
        }
    }

    #[test]
    fn list_active_operations_for_cluster_excludes_terminal_ones() {
        let writer: Writer<Operation> = Writer::new(vec![(INDEX_CLUSTER, index_operation_by_cluster)]);
        let cluster = cluster_id("rg-a", "one");
        writer.apply(Event::Applied(Arc::new(op(&cluster, "running", OperationStatus::Running))));
        writer.apply(Event::Applied(Arc::new(op(&cluster, "done", OperationStatus::Succeeded))));
        writer.apply(Event::Applied(Arc::new(op(&cluster_id("rg-a", "other"), "elsewhere", OperationStatus::Running))));
        let lister = Lister::new(writer.as_reader());

        let active = lister.list_active_operations_for_cluster(&cluster);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].status, OperationStatus::Running);
    }
}
