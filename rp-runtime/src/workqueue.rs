//! The work queue (§4.6): per-key deduplication, at-most-one-worker-per-key in-flight
//! tracking, and per-key exponential backoff, with a `tokio_util::time::DelayQueue`
//! behind `add_after` (mirrors `kube_runtime::scheduler`'s `DelayQueue`-backed
//! scheduler, generalized from a single-consumer stream to a queue `worker_count`
//! workers pull from concurrently, per §4.8).

use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use futures::StreamExt;
use tokio::sync::{mpsc, Notify};
use tokio_util::time::DelayQueue;

struct State<T: Eq + Hash + Clone> {
    ready: VecDeque<T>,
    queued: HashSet<T>,
    processing: HashSet<T>,
    /// Re-`add`ed while in-flight; re-enqueued on `done` (§4.6).
    dirty: HashSet<T>,
    /// Already has an outstanding `add_after`/`add_rate_limited` entry in the delay
    /// pump; a second one for the same key is dropped rather than double-scheduled.
    delayed_pending: HashSet<T>,
    /// One backoff tracker per key with an outstanding failure, mirroring
    /// `kube_runtime::controller`'s `BackoffErrorPolicy` (§4.6).
    backoffs: HashMap<T, ExponentialBackoff>,
    shutdown: bool,
}

enum DelayedInsert<T> {
    Insert(T, Duration),
}

/// A deduplicating, rate-limiting, delay-capable work queue. `T` is typically a
/// [`rp_core::ResourceId`] (§4.6).
pub struct WorkQueue<T: Eq + Hash + Clone + Send + 'static> {
    state: Arc<Mutex<State<T>>>,
    notify: Arc<Notify>,
    delayed_tx: mpsc::UnboundedSender<DelayedInsert<T>>,
    base_delay: Duration,
    max_delay: Duration,
}

impl<T: Eq + Hash + Clone + Send + 'static> WorkQueue<T> {
    #[must_use]
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        let state = Arc::new(Mutex::new(State {
            ready: VecDeque::new(),
            queued: HashSet::new(),
            processing: HashSet::new(),
            dirty: HashSet::new(),
            delayed_pending: HashSet::new(),
            backoffs: HashMap::new(),
            shutdown: false,
        }));
        let notify = Arc::new(Notify::new());
        let (delayed_tx, delayed_rx) = mpsc::unbounded_channel();
        spawn_delay_pump(Arc::clone(&state), Arc::clone(&notify), delayed_rx);
        Self { state, notify, delayed_tx, base_delay, max_delay }
    }

    fn new_backoff(&self) -> ExponentialBackoff {
        backoff::ExponentialBackoffBuilder::new()
            .with_initial_interval(self.base_delay)
            .with_max_interval(self.max_delay)
            .with_multiplier(2.0)
            .with_randomization_factor(0.0)
            .with_max_elapsed_time(None)
            .build()
    }

    /// No-op if `item` is already queued or in-flight (§4.6).
    pub fn add(&self, item: T) {
        let mut s = self.state.lock().expect("work queue lock poisoned");
        if s.shutdown {
            return;
        }
        if s.processing.contains(&item) {
            s.dirty.insert(item);
            return;
        }
        if s.queued.insert(item.clone()) {
            s.ready.push_back(item);
            drop(s);
            self.notify.notify_one();
        }
    }

    /// Blocks until an item is ready, or the queue has been shut down and drained.
    pub async fn get(&self) -> Option<T> {
        loop {
            // Register the notification *before* checking state, and `enable()` it
            // so a `notify_waiters()` that lands after the check below but before
            // `notified.await` is still observed — otherwise a `shutdown()` racing
            // the lock-release right above could be missed entirely, since
            // `notify_waiters()` (unlike `notify_one()`) stores no permit for a
            // future `notified()` call to pick up.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut s = self.state.lock().expect("work queue lock poisoned");
                if let Some(item) = s.ready.pop_front() {
                    s.queued.remove(&item);
                    s.processing.insert(item.clone());
                    return Some(item);
                }
                if s.shutdown {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Marks `item` no longer in-flight. If it was re-`add`ed while processing, it is
    /// re-enqueued immediately (§4.6).
    pub fn done(&self, item: &T) {
        let mut s = self.state.lock().expect("work queue lock poisoned");
        s.processing.remove(item);
        if s.dirty.remove(item) && s.queued.insert(item.clone()) {
            s.ready.push_back(item.clone());
            drop(s);
            self.notify.notify_one();
        }
    }

    /// Schedule `item` with the current exponential backoff delay for its key,
    /// advancing that key's backoff tracker a step (§4.6). Does not clear in-flight
    /// status — callers call this instead of `done` on failure so the backoff
    /// persists.
    pub fn add_rate_limited(&self, item: T) {
        let delay = {
            let mut s = self.state.lock().expect("work queue lock poisoned");
            let backoff = s.backoffs.entry(item.clone()).or_insert_with(|| self.new_backoff());
            // `ExponentialBackoff` only returns `None` once `max_elapsed_time` has
            // passed; we build every tracker with `max_elapsed_time: None`, so this
            // always yields a delay capped at `max_delay`.
            backoff.next_backoff().unwrap_or(self.max_delay)
        };
        self.add_after(item, delay);
    }

    /// Schedule `item` to become ready after `delay`. A second call for an already
    /// outstanding delayed `item` is dropped (first-scheduled wins).
    pub fn add_after(&self, item: T, delay: Duration) {
        if delay.is_zero() {
            self.add(item);
            return;
        }
        let mut s = self.state.lock().expect("work queue lock poisoned");
        if s.shutdown || !s.delayed_pending.insert(item.clone()) {
            return;
        }
        drop(s);
        let _ = self.delayed_tx.send(DelayedInsert::Insert(item, delay));
    }

    /// Drop `item`'s backoff tracker, resetting it to the base delay on its next
    /// failure.
    pub fn forget(&self, item: &T) {
        self.state.lock().expect("work queue lock poisoned").backoffs.remove(item);
    }

    /// No more items become ready after this; `get()` drains anything already ready,
    /// then returns `None` forever.
    pub fn shutdown(&self) {
        let mut s = self.state.lock().expect("work queue lock poisoned");
        s.shutdown = true;
        drop(s);
        self.notify.notify_waiters();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().expect("work queue lock poisoned").ready.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn spawn_delay_pump<T: Eq + Hash + Clone + Send + 'static>(
    state: Arc<Mutex<State<T>>>,
    notify: Arc<Notify>,
    mut rx: mpsc::UnboundedReceiver<DelayedInsert<T>>,
) {
    tokio::spawn(async move {
        let mut queue: DelayQueue<T> = DelayQueue::new();
        loop {
            tokio::select! {
                biased;
                maybe = rx.recv() => {
                    match maybe {
                        Some(DelayedInsert::Insert(item, delay)) => {
                            queue.insert(item, delay);
                        }
                        None => return,
                    }
                }
                expired = queue.next(), if !queue.is_empty() => {
                    if let Some(Ok(expired)) = expired {
                        push_expired(&state, &notify, expired.into_inner());
                    }
                }
            }
        }
    });
}

fn push_expired<T: Eq + Hash + Clone>(state: &Mutex<State<T>>, notify: &Notify, item: T) {
    let mut s = state.lock().expect("work queue lock poisoned");
    s.delayed_pending.remove(&item);
    if s.shutdown {
        return;
    }
    if s.processing.contains(&item) {
        s.dirty.insert(item);
        return;
    }
    if s.queued.insert(item.clone()) {
        s.ready.push_back(item);
        drop(s);
        notify.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn duplicate_add_coalesces_into_one_get() {
        let queue: WorkQueue<u32> = WorkQueue::new(Duration::from_millis(1), Duration::from_secs(1));
        queue.add(1);
        queue.add(1);
        assert_eq!(queue.get().await, Some(1));
        // Nothing else was queued; shut down to unblock the second `get`.
        queue.shutdown();
        assert_eq!(queue.get().await, None);
    }

    #[tokio::test]
    async fn add_while_processing_requeues_on_done() {
        let queue: WorkQueue<u32> = WorkQueue::new(Duration::from_millis(1), Duration::from_secs(1));
        queue.add(1);
        assert_eq!(queue.get().await, Some(1));
        queue.add(1); // re-added while in-flight
        queue.done(&1);
        assert_eq!(queue.get().await, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn add_after_becomes_ready_once_the_delay_elapses() {
        let queue: WorkQueue<u32> = WorkQueue::new(Duration::from_millis(1), Duration::from_secs(1));
        queue.add_after(7, Duration::from_secs(5));

        let not_yet = tokio::time::timeout(Duration::from_millis(10), queue.get()).await;
        assert!(not_yet.is_err(), "item should not be ready before its delay elapses");

        tokio::time::advance(Duration::from_secs(6)).await;
        let item = tokio::time::timeout(Duration::from_secs(1), queue.get()).await.unwrap();
        assert_eq!(item, Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_backoff_doubles_and_caps() {
        let queue: WorkQueue<u32> = WorkQueue::new(Duration::from_millis(10), Duration::from_millis(30));

        queue.add_rate_limited(1);
        let first = tokio::time::timeout(Duration::from_millis(15), queue.get()).await.unwrap();
        assert_eq!(first, Some(1));
        queue.done(&1);

        // Second failure should at least double the first delay (10ms -> 20ms); it
        // must not be ready before 15ms has passed...
        queue.add_rate_limited(1);
        let too_soon = tokio::time::timeout(Duration::from_millis(15), queue.get()).await;
        assert!(too_soon.is_err(), "second backoff should be longer than the first");

        // ...but it is capped at max_delay (30ms), so it is ready well before, say, a
        // full second.
        let second = tokio::time::timeout(Duration::from_secs(1), queue.get()).await.unwrap();
        assert_eq!(second, Some(1));
        queue.done(&1);

        // forget() resets the tracker, so the next failure is back to the base delay.
        queue.forget(&1);
        queue.add_rate_limited(1);
        let reset = tokio::time::timeout(Duration::from_millis(15), queue.get()).await.unwrap();
        assert_eq!(reset, Some(1));
    }

    #[tokio::test]
    async fn shutdown_drains_ready_then_returns_none() {
        let queue: WorkQueue<u32> = WorkQueue::new(Duration::from_millis(1), Duration::from_secs(1));
        queue.add(1);
        queue.shutdown();
        assert_eq!(queue.get().await, Some(1));
        assert_eq!(queue.get().await, None);
    }

    #[tokio::test]
    async fn shutdown_wakes_every_worker_already_parked_in_get() {
        // Several workers blocked on an empty queue's `get()` must all be woken by
        // `shutdown()`'s `notify_waiters()`, not just one (as `notify_one()` would do).
        let queue: Arc<WorkQueue<u32>> = Arc::new(WorkQueue::new(Duration::from_millis(1), Duration::from_secs(1)));
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let queue = Arc::clone(&queue);
                tokio::spawn(async move { queue.get().await })
            })
            .collect();

        // Give every worker a chance to register its `notified()` future before the
        // shutdown signal fires.
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.shutdown();

        for worker in workers {
            let result = tokio::time::timeout(Duration::from_secs(1), worker)
                .await
                .expect("a worker parked in get() should be woken by shutdown, not hang forever")
                .unwrap();
            assert_eq!(result, None);
        }
    }
}
