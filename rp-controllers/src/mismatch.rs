//! The cluster-service mismatch detector (§4.11): compares the local store against the
//! external cluster-service store and logs every cluster present in exactly one of the
//! two. The cluster-service HTTP client itself is out of scope (§1/§6); this module only
//! defines the narrow trait a real client implements.

use std::collections::HashSet;
use std::future::Future;

use rp_core::entities::HcpCluster;
use rp_core::ResourceId;
use rp_runtime::Lister;
use tracing::warn;

use crate::error::ControllerError;

/// The slice of the cluster-service HTTP client (§6) the mismatch detector needs: the
/// set of cluster ids it believes exist. A real implementation calls the cluster-service
/// list-clusters endpoint; out of scope here.
pub trait ClusterServiceStore: Send + Sync {
    fn list_cluster_ids(&self) -> impl Future<Output = Result<Vec<ResourceId>, ControllerError>> + Send;
}

#[derive(Debug, Default, Clone)]
pub struct MismatchReport {
    /// Clusters present in the local store but absent from the cluster-service store.
    pub local_only: Vec<ResourceId>,
    /// Clusters present in the cluster-service store but absent from the local store.
    pub remote_only: Vec<ResourceId>,
}

impl MismatchReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.local_only.is_empty() && self.remote_only.is_empty()
    }
}

/// Build a key→cluster map from `local` and `remote` and report every key present in
/// exactly one of the two (§4.11).
pub async fn mismatch_report<C: ClusterServiceStore>(
    local: &Lister<HcpCluster>,
    remote: &C,
) -> Result<MismatchReport, ControllerError> {
    let local_ids: HashSet<ResourceId> = local.list().into_iter().map(|c| c.id.clone()).collect();
    let remote_ids: HashSet<ResourceId> = remote.list_cluster_ids().await?.into_iter().collect();

    let local_only: Vec<_> = local_ids.difference(&remote_ids).cloned().collect();
    let remote_only: Vec<_> = remote_ids.difference(&local_ids).cloned().collect();

    for id in &local_only {
        warn!(cluster = %id, "cluster present in the local store but absent from cluster-service");
    }
    for id in &remote_only {
        warn!(cluster = %id, "cluster present in cluster-service but absent from the local store");
    }

    Ok(MismatchReport { local_only, remote_only })
}
