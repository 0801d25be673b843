//! The change-feed reader (§4.2): one logical worker per [`FeedRange`], decoding each
//! document's kind-tagged header and handing it to the [`crate::watcher::WatcherSet`]
//! registered for that kind. Sits at the boundary between `rp-client`'s untyped
//! `ChangeFeedClient` and `rp-runtime`'s typed watcher sets.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rp_client::{Backend, ChangeFeedClient, ChangeFeedDocument, FeedRange};
use rp_core::ResourceKind;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::watcher::RawSink;

/// Where decoded documents of each kind are published. Built once at process start by
/// registering every kind the `controller-manager` binary cares about.
pub type KindRegistry = HashMap<ResourceKind, Arc<dyn RawSink>>;

/// How long a range worker waits after a successful pass before polling the same range
/// again (§4.2: "between successful passes a worker waits a short fixed interval before
/// polling again").
const POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct ChangeFeedReader<B> {
    client: ChangeFeedClient<B>,
    registry: Arc<KindRegistry>,
    queue: Arc<crate::workqueue::WorkQueue<FeedRange>>,
    continuations: Arc<DashMap<FeedRange, Option<String>>>,
    worker_count: usize,
}

impl<B: Backend> ChangeFeedReader<B> {
    #[must_use]
    pub fn new(client: ChangeFeedClient<B>, registry: KindRegistry, worker_count: usize) -> Self {
        Self {
            client,
            registry: Arc::new(registry),
            queue: Arc::new(crate::workqueue::WorkQueue::new(
                Duration::from_millis(250),
                Duration::from_secs(30),
            )),
            continuations: Arc::new(DashMap::new()),
            worker_count: worker_count.max(1),
        }
    }

    /// Discovers feed ranges and spawns `worker_count` tasks to drain them, until
    /// `shutdown` is cancelled (§4.2 — "a `CancellationToken` aborts all range tasks
    /// and closes the range work queue").
    pub async fn run(self, shutdown: CancellationToken) {
        let ranges = match self.client.feed_ranges().await {
            Ok(ranges) => ranges,
            Err(err) => {
                error!(%err, "failed to discover change feed ranges");
                return;
            }
        };
        for range in ranges {
            self.continuations.insert(range.clone(), None);
            self.queue.add(range);
        }

        let mut workers = Vec::with_capacity(self.worker_count);
        for _ in 0..self.worker_count {
            let client = self.client.clone();
            let registry = Arc::clone(&self.registry);
            let queue = Arc::clone(&self.queue);
            let continuations = Arc::clone(&self.continuations);
            let shutdown = shutdown.clone();
            workers.push(tokio::spawn(range_worker(client, registry, queue, continuations, shutdown)));
        }

        shutdown.cancelled().await;
        self.queue.shutdown();
        for worker in workers {
            let _ = worker.await;
        }
    }
}

async fn range_worker<B: Backend>(
    client: ChangeFeedClient<B>,
    registry: Arc<KindRegistry>,
    queue: Arc<crate::workqueue::WorkQueue<FeedRange>>,
    continuations: Arc<DashMap<FeedRange, Option<String>>>,
    shutdown: CancellationToken,
) {
    loop {
        let Some(range) = queue.get().await else { return };
        if shutdown.is_cancelled() {
            queue.done(&range);
            return;
        }

        let continuation = continuations.get(&range).and_then(|entry| entry.clone());
        match client.read_from(&range, continuation.as_deref()).await {
            Ok(page) => {
                let all_ok = page.documents.iter().all(|doc| dispatch(&registry, doc));
                if all_ok {
                    continuations.insert(range.clone(), Some(page.continuation));
                    queue.forget(&range);
                    queue.add_after(range.clone(), POLL_INTERVAL);
                } else {
                    queue.add_rate_limited(range.clone());
                }
            }
            Err(rp_client::Error::FeedRangeExpired(_)) => {
                warn!(range = %range.0, "feed range continuation expired, restarting range from the beginning");
                continuations.insert(range.clone(), None);
                queue.add(range.clone());
            }
            Err(err) => {
                warn!(range = %range.0, %err, "failed to read change feed page, retrying with backoff");
                queue.add_rate_limited(range.clone());
            }
        }
        queue.done(&range);
    }
}

/// Returns `false` if the document failed to decode (counts against the batch, §4.2);
/// an unrecognized kind or a terminal operation is a successful, silent drop.
fn dispatch(registry: &KindRegistry, doc: &ChangeFeedDocument) -> bool {
    if let ResourceKind::Unknown(name) = &doc.header.kind {
        warn!(kind = %name, "unrecognized change-feed document kind, dropping");
        return true;
    }
    if doc.header.kind == ResourceKind::Operation && is_terminal_operation(doc) {
        return true;
    }
    match registry.get(&doc.header.kind) {
        Some(sink) => match sink.publish_raw(doc.body.clone()) {
            Ok(()) => true,
            Err(err) => {
                warn!(kind = %doc.header.kind, %err, "failed to decode change-feed document");
                false
            }
        },
        None => {
            warn!(kind = %doc.header.kind, "no watcher set registered for this kind, dropping");
            true
        }
    }
}

fn is_terminal_operation(doc: &ChangeFeedDocument) -> bool {
    match serde_json::from_value::<rp_core::entities::Operation>(doc.body.clone()) {
        Ok(op) => op.is_terminal(),
        Err(_) => false,
    }
}
