//! The orphan sweep (§4.11): a periodic full-scan job per subscription that deletes
//! children of deleted parents. In this worked example only `ServiceProviderCluster`
//! ends up eligible for deletion by this generic rule — `HcpCluster` is explicitly
//! exempt ("cluster resources are never considered orphans"), and `Subscription` /
//! `Operation` / `DnsReservation` are all either provider-namespace-less or
//! resource-group-less and so are filtered out by the same skip rule that excludes
//! subscriptions and operations. `DnsReservation`'s own lifecycle is the dedicated
//! cleanup controller's job (§4.10), not this sweep's.

use std::collections::HashSet;

use rp_client::{Backend, ListParams, ListScope};
use rp_core::{ResourceId, ResourceKind};
use tracing::{info, warn};
use uuid::Uuid;

/// Kinds the sweep lists when building one subscription's snapshot. `Subscription` is
/// deliberately absent: a subscription is never anyone's child to evaluate, and it can
/// never itself be orphaned by this rule (§4.11).
const SWEPT_KINDS: &[ResourceKind] = &[
    ResourceKind::HcpCluster,
    ResourceKind::ServiceProviderCluster,
    ResourceKind::DnsReservation,
    ResourceKind::Operation,
];

/// True when a listed resource is exempt from orphan deletion: it sits outside the
/// framework's provider namespace, outside any resource group, or is a cluster resource
/// itself (§4.11).
fn is_exempt(id: &ResourceId) -> bool {
    !id.is_in_provider_namespace() || !id.is_in_resource_group() || id.is_cluster()
}

fn extract_id(body: &serde_json::Value) -> Option<ResourceId> {
    serde_json::from_value(body.get("id")?.clone()).ok()
}

/// Lists every swept-kind resource under `subscription`, deletes any non-exempt one
/// whose parent id is absent from that listed snapshot, and returns the deleted ids.
/// Children are evaluated before parents (descending id-string length) so a multi-level
/// orphan chain is fully swept in one pass.
pub async fn orphan_sweep<B: Backend>(backend: &B, subscription: Uuid) -> Result<Vec<ResourceId>, rp_client::Error> {
    let mut listed: Vec<(ResourceKind, ResourceId)> = Vec::new();
    for kind in SWEPT_KINDS {
        let mut continuation = None;
        loop {
            let page = backend
                .list_page(
                    kind.clone(),
                    &ListScope::Subscription(subscription),
                    ListParams { continuation: continuation.clone(), limit: None },
                )
                .await?;
            for item in &page.items {
                if let Some(id) = extract_id(item) {
                    listed.push((kind.clone(), id));
                } else {
                    warn!(?kind, "orphan sweep could not read an id off a listed document, skipping it");
                }
            }
            match page.continuation {
                Some(token) => continuation = Some(token),
                None => break,
            }
        }
    }

    listed.sort_by_key(|(_, id)| std::cmp::Reverse(id.to_string().len()));
    let present: HashSet<String> = listed.iter().map(|(_, id)| id.to_string()).collect();

    let mut deleted = Vec::new();
    for (kind, id) in &listed {
        if is_exempt(id) {
            continue;
        }
        let Some(parent) = id.parent() else { continue };
        if present.contains(&parent.to_string()) {
            continue;
        }
        match backend.delete(kind.clone(), id).await {
            Ok(()) | Err(rp_client::Error::NotFound(_)) => {
                info!(resource = %id, parent = %parent, "deleted orphaned resource");
                deleted.push(id.clone());
            }
            Err(err) => return Err(err),
        }
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use rp_client::testing::InMemoryBackend;
    use rp_core::entities::service_provider_cluster::ServiceProviderClusterStatus;
    use rp_core::entities::{HcpCluster, ServiceProviderCluster};
    use rp_core::entities::hcp_cluster::{DnsSpec, ProvisioningState};
    use rp_core::CosmosMetadata;

    use super::*;

    fn sub() -> Uuid {
        "33333333-3333-3333-3333-333333333333".parse().unwrap()
    }

    fn cluster_id(name: &str) -> ResourceId {
        ResourceId::new(
            sub(),
            "rg",
            rp_core::resource_id::PROVIDER_NAMESPACE,
            vec![("hcpopenshiftclusters".into(), name.into())],
        )
    }

    fn cluster_doc(name: &str) -> HcpCluster {
        HcpCluster {
            id: cluster_id(name),
            metadata: CosmosMetadata::new("e0", chrono::Utc::now()),
            cluster_service_id: None,
            dns: DnsSpec::default(),
            provisioning_state: ProvisioningState::Succeeded,
        }
    }

    fn spc_doc(cluster: &ResourceId) -> ServiceProviderCluster {
        ServiceProviderCluster {
            id: ServiceProviderCluster::id_for_cluster(cluster),
            metadata: CosmosMetadata::new("e0", chrono::Utc::now()),
            status: ServiceProviderClusterStatus::default(),
        }
    }

    #[tokio::test]
    async fn deletes_an_spc_whose_cluster_is_gone() {
        let backend = InMemoryBackend::new();
        let orphan_cluster = cluster_id("gone");
        backend.seed(
            ResourceKind::ServiceProviderCluster,
            ServiceProviderCluster::id_for_cluster(&orphan_cluster),
            serde_json::to_value(spc_doc(&orphan_cluster)).unwrap(),
        );

        let deleted = orphan_sweep(&backend, sub()).await.unwrap();
        assert_eq!(deleted, vec![ServiceProviderCluster::id_for_cluster(&orphan_cluster)]);
    }

    #[tokio::test]
    async fn keeps_an_spc_whose_cluster_is_present() {
        let backend = InMemoryBackend::new();
        let live_cluster = cluster_id("live");
        backend.seed(
            ResourceKind::HcpCluster,
            live_cluster.clone(),
            serde_json::to_value(cluster_doc("live")).unwrap(),
        );
        backend.seed(
            ResourceKind::ServiceProviderCluster,
            ServiceProviderCluster::id_for_cluster(&live_cluster),
            serde_json::to_value(spc_doc(&live_cluster)).unwrap(),
        );

        let deleted = orphan_sweep(&backend, sub()).await.unwrap();
        assert!(deleted.is_empty());
    }

    #[tokio::test]
    async fn never_treats_a_cluster_itself_as_an_orphan() {
        let backend = InMemoryBackend::new();
        backend.seed(
            ResourceKind::HcpCluster,
            cluster_id("standalone"),
            serde_json::to_value(cluster_doc("standalone")).unwrap(),
        );

        let deleted = orphan_sweep(&backend, sub()).await.unwrap();
        assert!(deleted.is_empty());
    }
}
