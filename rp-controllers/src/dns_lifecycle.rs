//! The DNS reservation lifecycle controller (§4.9): per-cluster `SyncOnce` that reserves
//! a random DNS name the first time a cluster opts into managed DNS, then best-effort
//! marks the reservation `Bound` once the cluster's `ServiceProviderCluster` points at
//! it. Crash safety comes entirely from the order the steps below run in (§4.9 closing
//! paragraph): every prefix of this sequence is a valid, convergent input to the
//! cleanup controller's state machine (§4.10).

use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use rp_client::{Backend, Client};
use rp_core::entities::{dns_reservation, service_provider_cluster, DnsReservation, HcpCluster, ServiceProviderCluster};
use rp_core::{CosmosMetadata, ResourceId};
use rp_runtime::{Action, CooldownChecker, Lister, SyncError, SyncOutcome, Syncer};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::dns_name;
use crate::error::ControllerError;

pub struct DnsLifecycleController<B> {
    client: Client<B>,
    clusters: Lister<HcpCluster>,
    cooldown: Arc<dyn CooldownChecker>,
}

impl<B: Backend> DnsLifecycleController<B> {
    #[must_use]
    pub fn new(client: Client<B>, clusters: Lister<HcpCluster>, cooldown: Arc<dyn CooldownChecker>) -> Self {
        Self { client, clusters, cooldown }
    }

    /// §4.9 step 3: load the cluster's singleton `ServiceProviderCluster`, creating it
    /// if absent. Creation is idempotent against a concurrent winner: a `Conflict` on
    /// `create` means another syncer just created it, so this re-fetches rather than
    /// erroring (§9 "Singletons as children").
    async fn load_or_create_spc(&self, cluster_id: &ResourceId) -> Result<ServiceProviderCluster, ControllerError> {
        let spc_id = ServiceProviderCluster::id_for_cluster(cluster_id);
        let api = self.client.api::<ServiceProviderCluster>();
        match api.get(&spc_id).await {
            Ok(spc) => Ok(spc),
            Err(rp_client::Error::NotFound(_)) => {
                let fresh = ServiceProviderCluster {
                    id: spc_id.clone(),
                    metadata: CosmosMetadata::default(),
                    status: service_provider_cluster::ServiceProviderClusterStatus::default(),
                };
                match api.create(&fresh).await {
                    Ok(created) => Ok(created),
                    Err(rp_client::Error::Conflict(_)) => Ok(api.get(&spc_id).await?),
                    Err(err) => Err(err.into()),
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn sync(&self, key: &ResourceId) -> Result<SyncOutcome, ControllerError> {
        // Step 1: NotFound short-circuits to success (§4.10 closing paragraph applies
        // equally here: the cluster may have been deleted between enqueue and dequeue).
        let cluster = match self.clusters.get(key) {
            Ok(cluster) => cluster,
            Err(_not_found) => return Ok(Action::await_change()),
        };

        // Step 2.
        let Some(prefix) = cluster.dns.base_domain_prefix.clone() else {
            return Ok(Action::await_change());
        };

        // Step 3.
        let mut spc = self.load_or_create_spc(&cluster.id).await?;
        if spc.status.kube_api_server_dns_reservation.is_some() {
            return Ok(Action::await_change());
        }

        // Step 4.
        let mut rng = rand::rng();
        let suffix = dns_name::generate_suffix(&mut rng).ok_or(ControllerError::SuffixExhausted {
            cluster: cluster.id.clone(),
            attempts: dns_name::MAX_ATTEMPTS,
        })?;
        let name = format!("{prefix}.{suffix}");
        let reservation_id = ResourceId::new_subscription_scoped(
            cluster.id.subscription_id(),
            rp_core::resource_id::PROVIDER_NAMESPACE,
            vec![(dns_reservation::RESOURCE_TYPE.to_string(), name)],
        );

        // Step 5: a name conflict (or any other create failure) is returned as-is; the
        // next dequeue of this key redraws a fresh suffix.
        let now = Utc::now();
        let mut reservation = DnsReservation::new_pending(reservation_id.clone(), cluster.id.clone(), now);
        let reservation_api = self.client.api::<DnsReservation>();
        reservation = reservation_api.create(&reservation).await?;
        info!(cluster = %cluster.id, reservation = %reservation.id, "reserved dns name");

        // Step 6: the SPC pointer is only ever set after the reservation exists.
        spc.status.kube_api_server_dns_reservation = Some(reservation.id.clone());
        let spc_api = self.client.api::<ServiceProviderCluster>();
        spc = spc_api.replace(&spc).await?;
        let _ = &spc;

        // Step 7: best-effort; the cleanup controller's case 6 reconciles a lingering
        // Pending reservation the cluster already points to (§9 Open Question).
        reservation.mark_bound();
        if let Err(err) = reservation_api.replace(&reservation).await {
            warn!(reservation = %reservation.id, %err, "best-effort bound-marking failed, cleanup controller will reconcile");
        }

        Ok(Action::await_change())
    }
}

impl<B: Backend> Syncer<HcpCluster> for DnsLifecycleController<B> {
    async fn sync_once(&self, _cancel: &CancellationToken, key: &ResourceId) -> Result<SyncOutcome, SyncError> {
        self.sync(key).await.map_err(|err| match err {
            ControllerError::Client(client_err) => SyncError::Client(client_err),
            other => SyncError::Other(other.to_string()),
        })
    }

    fn cooldown(&self) -> Arc<dyn CooldownChecker> {
        Arc::clone(&self.cooldown)
    }
}

#[cfg(test)]
mod tests {
    use rp_client::testing::InMemoryBackend;
    use rp_core::entities::hcp_cluster::{DnsSpec, ProvisioningState};
    use rp_core::entities::BindingState;
    use rp_core::ResourceKind;
    use rp_runtime::cooldown::TimeBasedCooldown;
    use rp_runtime::reflector::store::Writer;
    use uuid::Uuid;

    use super::*;

    fn sub() -> Uuid {
        "11111111-1111-1111-1111-111111111111".parse().unwrap()
    }

    fn cluster_id() -> ResourceId {
        ResourceId::new(
            sub(),
            "rg",
            rp_core::resource_id::PROVIDER_NAMESPACE,
            vec![("hcpopenshiftclusters".into(), "c".into())],
        )
    }

    fn cluster(prefix: Option<&str>) -> HcpCluster {
        HcpCluster {
            id: cluster_id(),
            metadata: CosmosMetadata::new("e0", Utc::now()),
            cluster_service_id: Some("css-1".to_string()),
            dns: DnsSpec { base_domain_prefix: prefix.map(str::to_string) },
            provisioning_state: ProvisioningState::Provisioning,
        }
    }

    fn lister_with(cluster: HcpCluster) -> Lister<HcpCluster> {
        let writer: Writer<HcpCluster> = Writer::new(Vec::new());
        writer.apply(rp_runtime::Event::Applied(Arc::new(cluster)));
        Lister::new(writer.as_reader())
    }

    #[tokio::test]
    async fn no_dns_prefix_is_a_quiet_no_op() {
        let backend = Arc::new(InMemoryBackend::new());
        let client = Client::new(backend);
        let controller = DnsLifecycleController::new(
            client,
            lister_with(cluster(None)),
            Arc::new(TimeBasedCooldown::new(std::time::Duration::from_secs(1))),
        );
        let cancel = CancellationToken::new();
        let outcome = controller.sync_once(&cancel, &cluster_id()).await.unwrap();
        assert!(matches!(outcome, Action::AwaitChange));
    }

    #[tokio::test]
    async fn reserves_a_name_and_points_the_spc_at_it() {
        let backend = Arc::new(InMemoryBackend::new());
        let client = Client::new(backend);
        let controller = DnsLifecycleController::new(
            client.clone(),
            lister_with(cluster(Some("api"))),
            Arc::new(TimeBasedCooldown::new(std::time::Duration::from_secs(1))),
        );
        let cancel = CancellationToken::new();
        controller.sync_once(&cancel, &cluster_id()).await.unwrap();

        let spc_id = ServiceProviderCluster::id_for_cluster(&cluster_id());
        let spc = client.api::<ServiceProviderCluster>().get(&spc_id).await.unwrap();
        let reservation_id = spc.status.kube_api_server_dns_reservation.expect("pointer should be set");
        let reservation = client.api::<DnsReservation>().get(&reservation_id).await.unwrap();
        assert_eq!(reservation.binding_state, BindingState::Bound);
        assert!(reservation.id.to_string().contains("api."));
        let _ = ResourceKind::DnsReservation;
    }

    #[tokio::test]
    async fn second_sync_is_a_no_op_once_the_spc_already_points_somewhere() {
        let backend = Arc::new(InMemoryBackend::new());
        let client = Client::new(backend);
        let controller = DnsLifecycleController::new(
            client.clone(),
            lister_with(cluster(Some("api"))),
            Arc::new(TimeBasedCooldown::new(std::time::Duration::from_secs(1))),
        );
        let cancel = CancellationToken::new();
        controller.sync_once(&cancel, &cluster_id()).await.unwrap();

        let spc_id = ServiceProviderCluster::id_for_cluster(&cluster_id());
        let before = client.api::<ServiceProviderCluster>().get(&spc_id).await.unwrap();

        controller.sync_once(&cancel, &cluster_id()).await.unwrap();
        let after = client.api::<ServiceProviderCluster>().get(&spc_id).await.unwrap();
        assert_eq!(
            before.status.kube_api_server_dns_reservation,
            after.status.kube_api_server_dns_reservation
        );
    }
}
