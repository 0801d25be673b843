use serde::{Deserialize, Serialize};

use crate::metadata::CosmosMetadata;
use crate::resource::{Resource, ResourceKind};
use crate::resource_id::ResourceId;

/// The resource-type segment used when building this singleton child's [`ResourceId`].
pub const RESOURCE_TYPE: &str = "serviceProviderClusters";
/// The fixed name of the singleton; every `HcpCluster` owns exactly one, named `default`.
pub const SINGLETON_NAME: &str = "default";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceProviderClusterStatus {
    /// Weak reference to the bound `DnsReservation`, or `None` if not yet assigned.
    pub kube_api_server_dns_reservation: Option<ResourceId>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceProviderCluster {
    pub id: ResourceId,
    pub metadata: CosmosMetadata,
    pub status: ServiceProviderClusterStatus,
}

impl ServiceProviderCluster {
    /// Build the singleton child id of the given cluster.
    #[must_use]
    pub fn id_for_cluster(cluster_id: &ResourceId) -> ResourceId {
        cluster_id.child(RESOURCE_TYPE, SINGLETON_NAME)
    }
}

impl Resource for ServiceProviderCluster {
    fn kind() -> ResourceKind {
        ResourceKind::ServiceProviderCluster
    }
    fn id(&self) -> &ResourceId {
        &self.id
    }
    fn metadata(&self) -> &CosmosMetadata {
        &self.metadata
    }
    fn metadata_mut(&mut self) -> &mut CosmosMetadata {
        &mut self.metadata
    }
}
