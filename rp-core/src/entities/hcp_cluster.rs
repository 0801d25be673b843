use serde::{Deserialize, Serialize};

use crate::metadata::CosmosMetadata;
use crate::resource::{Resource, ResourceKind};
use crate::resource_id::ResourceId;

/// The resource-type segment used when building a cluster's [`ResourceId`].
pub const RESOURCE_TYPE: &str = "hcpOpenShiftClusters";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProvisioningState {
    Accepted,
    Provisioning,
    Succeeded,
    Failed,
    Deleting,
}

/// DNS-related desired state a customer sets on cluster creation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsSpec {
    /// The customer-chosen subdomain prefix the reservation name is built from.
    ///
    /// Absent until the customer opts into a managed DNS reservation; the lifecycle
    /// controller's `SyncOnce` (§4.9 step 2) returns early while this is `None`.
    pub base_domain_prefix: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HcpCluster {
    pub id: ResourceId,
    pub metadata: CosmosMetadata,
    /// Cross-system identifier used to correlate with the cluster-service store.
    ///
    /// Immutable once set (§3).
    pub cluster_service_id: Option<String>,
    pub dns: DnsSpec,
    pub provisioning_state: ProvisioningState,
}

impl Resource for HcpCluster {
    fn kind() -> ResourceKind {
        ResourceKind::HcpCluster
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
