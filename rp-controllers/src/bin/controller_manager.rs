//! The thin binary that wires every crate in this workspace together (§6):
//! change-feed reader, per-kind reflectors, the two worked DNS controllers, and the
//! periodic orphan sweep. Stands alone against the in-memory backend for
//! demonstration, the way kube-rs's `examples/` binaries stand alone against a real
//! cluster — a real deployment supplies a concrete `Backend` behind the same trait and
//! otherwise reuses this wiring unchanged.

use std::sync::Arc;
use std::time::Duration;

use rp_client::testing::InMemoryBackend;
use rp_client::{Backend, Client};
use rp_controllers::{Config, DnsCleanupController, DnsLifecycleController};
use rp_core::entities::hcp_cluster::{DnsSpec, ProvisioningState};
use rp_core::entities::subscription::RegistrationState;
use rp_core::entities::{DnsReservation, HcpCluster, Operation, Subscription};
use rp_core::{CosmosMetadata, ResourceId, ResourceKind};
use rp_runtime::cooldown::{ActiveOperationPrioritizingCooldown, CooldownChecker, TimeBasedCooldown};
use rp_runtime::listers::{index_by_resource_group, index_operation_by_cluster, INDEX_CLUSTER, INDEX_RESOURCE_GROUP};
use rp_runtime::reflector::store::Writer;
use rp_runtime::{reflector, ChangeFeedReader, Controller, Dispatcher, ExpiringWatcher, KindRegistry, Lister, WatcherSet};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

const DEMO_SUBSCRIPTION: &str = "00000000-0000-0000-0000-0000000000aa";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let config = Config::from_env();
    let backend = Arc::new(InMemoryBackend::new());
    let client = Client::new(Arc::clone(&backend));
    seed_demo_data(&client).await;

    let shutdown = CancellationToken::new();

    let cluster_watchers: Arc<WatcherSet<HcpCluster>> = Arc::new(WatcherSet::new());
    let cluster_writer: Writer<HcpCluster> = Writer::new(vec![(INDEX_RESOURCE_GROUP, index_by_resource_group)]);
    let cluster_store = cluster_writer.as_reader();
    let cluster_dispatcher = Arc::new(Dispatcher::new(cluster_store.clone()));
    let cluster_watcher = ExpiringWatcher::new(Arc::clone(&cluster_watchers), client.global_lister::<HcpCluster>(), config.relist_period);
    let cluster_reflector_handle = tokio::spawn(reflector(cluster_writer, Arc::clone(&cluster_dispatcher), cluster_watcher, shutdown.clone()));

    let dns_watchers: Arc<WatcherSet<DnsReservation>> = Arc::new(WatcherSet::new());
    let dns_writer: Writer<DnsReservation> = Writer::new(Vec::new());
    let dns_store = dns_writer.as_reader();
    let dns_dispatcher = Arc::new(Dispatcher::new(dns_store.clone()));
    let dns_watcher = ExpiringWatcher::new(Arc::clone(&dns_watchers), client.global_lister::<DnsReservation>(), config.relist_period);
    let dns_reflector_handle = tokio::spawn(reflector(dns_writer, Arc::clone(&dns_dispatcher), dns_watcher, shutdown.clone()));

    let op_watchers: Arc<WatcherSet<Operation>> = Arc::new(WatcherSet::new());
    let op_writer: Writer<Operation> = Writer::new(vec![(INDEX_CLUSTER, index_operation_by_cluster)]);
    let op_store = op_writer.as_reader();
    let op_dispatcher = Arc::new(Dispatcher::new(op_store.clone()));
    let op_watcher = ExpiringWatcher::new(Arc::clone(&op_watchers), client.global_lister::<Operation>(), config.relist_period);
    let op_reflector_handle = tokio::spawn(reflector(op_writer, Arc::clone(&op_dispatcher), op_watcher, shutdown.clone()));

    let mut registry: KindRegistry = KindRegistry::new();
    registry.insert(ResourceKind::HcpCluster, Arc::new(Arc::clone(&cluster_watchers)));
    registry.insert(ResourceKind::DnsReservation, Arc::new(Arc::clone(&dns_watchers)));
    registry.insert(ResourceKind::Operation, Arc::new(Arc::clone(&op_watchers)));
    let reader_handle = tokio::spawn(ChangeFeedReader::new(client.change_feed(), registry, 2).run(shutdown.clone()));

    let resync_handle = tokio::spawn(resync_loop(
        vec![Arc::clone(&cluster_dispatcher) as _, Arc::clone(&dns_dispatcher) as _, Arc::clone(&op_dispatcher) as _],
        config.resync_check_period,
        shutdown.clone(),
    ));

    let operations_lister = Lister::new(op_store);
    let cooldown: Arc<dyn CooldownChecker> = Arc::new(ActiveOperationPrioritizingCooldown::new(
        operations_lister,
        Arc::new(TimeBasedCooldown::new(config.cooldown_period)),
    ));

    let clusters_lister = Lister::new(cluster_store);
    let lifecycle = Arc::new(DnsLifecycleController::new(client.clone(), clusters_lister.clone(), Arc::clone(&cooldown)));
    let lifecycle_controller = Controller::new(
        Arc::clone(&cluster_dispatcher),
        clusters_lister,
        lifecycle,
        config.worker_count,
        config.cluster_relist_period,
    );

    let dns_lister = Lister::new(dns_store);
    let cleanup = Arc::new(DnsCleanupController::new(client.clone(), Arc::clone(&cooldown)));
    let cleanup_controller = Controller::new(Arc::clone(&dns_dispatcher), dns_lister, cleanup, config.worker_count, config.cluster_relist_period);

    let lifecycle_handle = tokio::spawn(lifecycle_controller.run(shutdown.clone()));
    let cleanup_handle = tokio::spawn(cleanup_controller.run(shutdown.clone()));
    let sweep_handle = tokio::spawn(sweep_loop(backend, config.sweep_period, shutdown.clone()));

    info!("controller-manager started against the in-memory demonstration backend");
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(%err, "failed to listen for ctrl-c, shutting down anyway");
    }
    info!("shutting down");
    shutdown.cancel();
    let _ = tokio::join!(
        lifecycle_handle,
        cleanup_handle,
        sweep_handle,
        reader_handle,
        resync_handle,
        cluster_reflector_handle,
        dns_reflector_handle,
        op_reflector_handle,
    );
}

/// One `tokio::time::interval(resync_check_period)` shared across every kind's
/// dispatcher (§4.4: a single process-wide check period, each handler's own
/// `resync_period()` clamped up to it).
async fn resync_loop(dispatchers: Vec<Arc<dyn Resync>>, period: Duration, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                for dispatcher in &dispatchers {
                    dispatcher.drive_resync().await;
                }
            }
            () = shutdown.cancelled() => return,
        }
    }
}

/// Type-erases `Dispatcher<K>::resync_tick` so [`resync_loop`] can drive every kind's
/// dispatcher from one task without being generic over them.
trait Resync: Send + Sync {
    fn drive_resync(&self) -> rp_runtime::BoxFuture<'_, ()>;
}

impl<K: rp_core::Resource> Resync for Dispatcher<K> {
    fn drive_resync(&self) -> rp_runtime::BoxFuture<'_, ()> {
        Box::pin(self.resync_tick())
    }
}

async fn sweep_loop(backend: Arc<InMemoryBackend>, period: Duration, shutdown: CancellationToken) {
    let subscription: Uuid = DEMO_SUBSCRIPTION.parse().expect("valid demo subscription id");
    let mut interval = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = interval.tick() => {
                match rp_controllers::orphan_sweep(backend.as_ref(), subscription).await {
                    Ok(deleted) if !deleted.is_empty() => info!(count = deleted.len(), "orphan sweep deleted resources"),
                    Ok(_) => {}
                    Err(err) => warn!(%err, "orphan sweep failed"),
                }
            }
            () = shutdown.cancelled() => return,
        }
    }
}

/// Seeds one subscription and one managed-DNS cluster so the wiring visibly does
/// something: the lifecycle controller reserves a name for it on the first relist, and
/// the cleanup controller then holds steady once the reservation is bound.
async fn seed_demo_data<B: Backend>(client: &Client<B>) {
    let subscription: Uuid = DEMO_SUBSCRIPTION.parse().expect("valid demo subscription id");
    let now = chrono::Utc::now();

    let subscription_doc = Subscription {
        id: ResourceId::subscription_root(subscription),
        metadata: CosmosMetadata::new("seed", now),
        registration_state: RegistrationState::Registered,
    };
    if let Err(err) = client.api::<Subscription>().create(&subscription_doc).await {
        warn!(%err, "failed to seed demo subscription");
    }

    let cluster = HcpCluster {
        id: ResourceId::new(
            subscription,
            "demo-rg",
            rp_core::resource_id::PROVIDER_NAMESPACE,
            vec![("hcpOpenShiftClusters".into(), "demo".into())],
        ),
        metadata: CosmosMetadata::new("seed", now),
        cluster_service_id: Some("css-demo".to_string()),
        dns: DnsSpec { base_domain_prefix: Some("api".to_string()) },
        provisioning_state: ProvisioningState::Succeeded,
    };
    if let Err(err) = client.api::<HcpCluster>().create(&cluster).await {
        warn!(%err, "failed to seed demo cluster");
    }
}
