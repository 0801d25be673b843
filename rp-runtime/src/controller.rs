//! The generic cluster-watching controller skeleton (§4.8): wires an informer's store
//! changes into a work queue through a cooldown check, then drains that queue with a
//! pool of worker tasks that call into a [`Syncer`].

use std::future::Future;
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use rand::Rng;
use rp_core::{Resource, ResourceId};
use tokio_util::sync::CancellationToken;
use tracing::{error, info_span, warn, Instrument};

use crate::cooldown::CooldownChecker;
use crate::dispatcher::{BoxFuture, Dispatcher, Handler};
use crate::listers::Lister;
use crate::workqueue::WorkQueue;

/// What a [`Syncer`] asks the controller to do next, mirroring
/// `kube_runtime::controller::Action`'s `requeue`/`await_change` split (§4.8
/// supplemented feature) — a syncer can ask to be revisited at a specific time even on
/// success, instead of only relying on the next change-feed event or safety-net relist.
#[derive(Debug, Clone, Copy)]
pub enum Action {
    RequeueAfter(Duration),
    AwaitChange,
}

impl Action {
    #[must_use]
    pub fn requeue_after(duration: Duration) -> Self {
        Action::RequeueAfter(duration)
    }

    #[must_use]
    pub fn await_change() -> Self {
        Action::AwaitChange
    }
}

pub type SyncOutcome = Action;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Client(#[from] rp_client::Error),
    #[error(transparent)]
    Core(#[from] rp_core::CoreError),
    #[error("{0}")]
    Other(String),
}

/// One controller's reconciliation logic for kind `K`, keyed by [`ResourceId`].
pub trait Syncer<K>: Send + Sync + 'static {
    fn sync_once(
        &self,
        cancel: &CancellationToken,
        key: &ResourceId,
    ) -> impl Future<Output = Result<SyncOutcome, SyncError>> + Send;

    fn cooldown(&self) -> Arc<dyn CooldownChecker>;
}

struct QueueAdmission<K> {
    queue: Arc<WorkQueue<ResourceId>>,
    cooldown: Arc<dyn CooldownChecker>,
    _kind: PhantomData<fn() -> K>,
}

impl<K: Resource> Handler<K> for QueueAdmission<K> {
    fn on_add(&self, obj: Arc<K>) -> BoxFuture<'_, ()> {
        Box::pin(async move { self.admit(obj.id()) })
    }

    fn on_update(&self, _old: Arc<K>, new: Arc<K>) -> BoxFuture<'_, ()> {
        Box::pin(async move { self.admit(new.id()) })
    }

    fn on_delete(&self, _obj: Arc<K>) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }
}

impl<K> QueueAdmission<K> {
    fn admit(&self, key: &ResourceId) {
        if self.cooldown.can_sync(key) {
            self.queue.add(key.clone());
        }
    }
}

/// Drives one kind's [`Syncer`]: registers a [`Handler`] on `dispatcher` that admits
/// changed keys into a work queue after a cooldown check (1), runs a jittered periodic
/// full-relist safety net for missed events (2), and spawns `worker_count` worker tasks
/// that drain the queue (3), per §4.8.
pub struct Controller<K, S> {
    dispatcher: Arc<Dispatcher<K>>,
    lister: Lister<K>,
    queue: Arc<WorkQueue<ResourceId>>,
    syncer: Arc<S>,
    worker_count: usize,
    relist_period: Duration,
}

impl<K, S> Controller<K, S>
where
    K: Resource,
    S: Syncer<K>,
{
    #[must_use]
    pub fn new(
        dispatcher: Arc<Dispatcher<K>>,
        lister: Lister<K>,
        syncer: Arc<S>,
        worker_count: usize,
        relist_period: Duration,
    ) -> Self {
        Self {
            dispatcher,
            lister,
            queue: Arc::new(WorkQueue::new(Duration::from_millis(100), Duration::from_secs(60))),
            syncer,
            worker_count,
            relist_period,
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        let admission = Arc::new(QueueAdmission::<K> {
            queue: Arc::clone(&self.queue),
            cooldown: self.syncer.cooldown(),
            _kind: PhantomData,
        });
        self.dispatcher.register(admission).await;

        let relist_handle = {
            let queue = Arc::clone(&self.queue);
            let lister = self.lister.clone();
            let period = self.relist_period;
            let cancel = cancel.clone();
            tokio::spawn(async move { relist_safety_net(queue, lister, period, cancel).await })
        };

        let mut workers = Vec::with_capacity(self.worker_count);
        for worker_id in 0..self.worker_count {
            let queue = Arc::clone(&self.queue);
            let syncer = Arc::clone(&self.syncer);
            let cancel = cancel.clone();
            workers.push(tokio::spawn(worker_loop(worker_id, queue, syncer, cancel)));
        }

        cancel.cancelled().await;
        self.queue.shutdown();
        for worker in workers {
            let _ = worker.await;
        }
        let _ = relist_handle.await;
    }
}

/// §4.8: "a background loop that lists every cluster on a jittered period". Each
/// tick's delay is `period` scaled by a fresh random factor in `[0.8, 1.2)` so that
/// many replicas of this controller don't all relist in lockstep.
fn jittered(period: Duration) -> Duration {
    let factor: f64 = rand::rng().random_range(0.8..1.2);
    period.mul_f64(factor)
}

async fn relist_safety_net<K: Resource>(
    queue: Arc<WorkQueue<ResourceId>>,
    lister: Lister<K>,
    period: Duration,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            () = tokio::time::sleep(jittered(period)) => {
                for obj in lister.list() {
                    queue.add_rate_limited(obj.id().clone());
                }
            }
            () = cancel.cancelled() => return,
        }
    }
}

async fn worker_loop<K, S: Syncer<K>>(
    worker_id: usize,
    queue: Arc<WorkQueue<ResourceId>>,
    syncer: Arc<S>,
    cancel: CancellationToken,
) {
    let cooldown = syncer.cooldown();
    loop {
        let Some(key) = queue.get().await else { return };
        let span = info_span!("sync", worker_id, %key);
        let outcome = AssertUnwindSafe(syncer.sync_once(&cancel, &key))
            .catch_unwind()
            .instrument(span)
            .await;
        match outcome {
            Ok(Ok(Action::RequeueAfter(delay))) => {
                cooldown.record_sync(&key);
                queue.forget(&key);
                queue.add_after(key.clone(), delay);
            }
            Ok(Ok(Action::AwaitChange)) => {
                cooldown.record_sync(&key);
                queue.forget(&key);
            }
            Ok(Err(err)) => {
                warn!(%key, %err, "sync failed, retrying with backoff");
                queue.add_rate_limited(key.clone());
            }
            Err(_panic) => {
                error!(%key, "sync panicked, retrying with backoff");
                queue.add_rate_limited(key.clone());
            }
        }
        queue.done(&key);
    }
}
