//! The shared indexed informer (§4.4): alternates listing and watching one kind's
//! [`crate::watcher::ExpiringWatcher`], keeping a [`store::Store`] and a
//! [`crate::dispatcher::Dispatcher`] in sync with it.

pub mod store;

use std::collections::HashSet;
use std::sync::Arc;

use rp_client::Backend;
use rp_core::Resource;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dispatcher::Dispatcher;
use crate::reflector::store::Writer;
use crate::watcher::{Event, ExpiringWatcher};

/// Runs until `shutdown` is cancelled. Alternates `watcher.list()` (populate the store,
/// diffing out anything that has disappeared since the last list as a synthetic
/// `Event::Deleted`, §4.4/§9) and `watcher.watch()` (stream live `Applied` events until
/// the subscription expires, then relist).
pub async fn reflector<K, B>(
    writer: Writer<K>,
    dispatcher: Arc<Dispatcher<K>>,
    mut watcher: ExpiringWatcher<K, B>,
    shutdown: CancellationToken,
) where
    K: Resource + serde::de::DeserializeOwned,
    B: Backend,
{
    while !shutdown.is_cancelled() {
        let items = tokio::select! {
            result = watcher.list() => match result {
                Ok(items) => items,
                Err(err) => {
                    warn!(%err, "informer list failed, retrying");
                    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                    continue;
                }
            },
            () = shutdown.cancelled() => break,
        };

        let fresh: HashSet<_> = items.iter().map(|item| item.id().clone()).collect();
        let stale: Vec<_> = writer
            .as_reader()
            .list()
            .into_iter()
            .map(|item| item.id().clone())
            .filter(|id| !fresh.contains(id))
            .collect();

        for item in items {
            if let Some(change) = writer.apply(Event::Applied(item)) {
                dispatcher.dispatch(change).await;
            }
        }
        for id in stale {
            if let Some(change) = writer.apply(Event::Deleted(id)) {
                dispatcher.dispatch(change).await;
            }
        }
        writer.mark_ready();
        debug!(count = writer.as_reader().len(), "informer relisted");

        loop {
            let event = tokio::select! {
                event = watcher.watch() => event,
                () = shutdown.cancelled() => return,
            };
            match event {
                Ok(event) => {
                    if let Some(change) = writer.apply(event) {
                        dispatcher.dispatch(change).await;
                    }
                }
                Err(_expired) => {
                    info!("watch subscription expired, relisting");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rp_client::testing::InMemoryBackend;
    use rp_client::Client;
    use rp_core::entities::subscription::RegistrationState;
    use rp_core::entities::Subscription;
    use rp_core::{CosmosMetadata, ResourceId};
    use uuid::Uuid;

    use super::*;
    use crate::watcher::WatcherSet;

    fn sub_doc(id: Uuid) -> Subscription {
        Subscription {
            id: ResourceId::subscription_root(id),
            metadata: CosmosMetadata::new("e0", chrono::Utc::now()),
            registration_state: RegistrationState::Registered,
        }
    }

    async fn wait_for<F: Fn() -> bool>(predicate: F) {
        tokio::time::timeout(Duration::from_secs(1), async {
            while !predicate() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("condition did not become true in time");
    }

    #[tokio::test]
    async fn an_initial_list_populates_the_store_and_is_dispatched_as_an_add() {
        let backend = Arc::new(InMemoryBackend::new());
        let client = Client::new(Arc::clone(&backend));
        let seeded = sub_doc("99999999-9999-9999-9999-999999999999".parse().unwrap());
        backend.seed(Subscription::kind(), seeded.id.clone(), serde_json::to_value(&seeded).unwrap());

        let watchers: Arc<WatcherSet<Subscription>> = Arc::new(WatcherSet::new());
        let watcher = ExpiringWatcher::new(Arc::clone(&watchers), client.global_lister::<Subscription>(), Duration::from_secs(30));
        let writer: Writer<Subscription> = Writer::new(Vec::new());
        let reader = writer.as_reader();
        let dispatcher = Arc::new(Dispatcher::new(reader.clone()));
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(reflector(writer, Arc::clone(&dispatcher), watcher, shutdown.clone()));

        wait_for(|| reader.get(&seeded.id).is_some()).await;
        assert_eq!(reader.list().len(), 1);

        shutdown.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn a_live_event_updates_the_store_without_waiting_for_a_relist() {
        let backend = Arc::new(InMemoryBackend::new());
        let client = Client::new(Arc::clone(&backend));

        let watchers: Arc<WatcherSet<Subscription>> = Arc::new(WatcherSet::new());
        let watcher = ExpiringWatcher::new(Arc::clone(&watchers), client.global_lister::<Subscription>(), Duration::from_secs(30));
        let writer: Writer<Subscription> = Writer::new(Vec::new());
        let reader = writer.as_reader();
        let dispatcher = Arc::new(Dispatcher::new(reader.clone()));
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(reflector(writer, Arc::clone(&dispatcher), watcher, shutdown.clone()));
        tokio::time::timeout(Duration::from_secs(1), reader.wait_until_ready())
            .await
            .expect("initial (empty) list should mark the store ready promptly");

        let live = sub_doc("88888888-0000-0000-0000-000000000000".parse().unwrap());
        watchers.publish(Arc::new(live.clone()));
        wait_for(|| reader.get(&live.id).is_some()).await;

        shutdown.cancel();
        task.await.unwrap();
    }
}
