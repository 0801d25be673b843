//! Watcher sets, the expiring watcher, the shared indexed informer, typed listers, the
//! work queue, the cooldown checker, and the generic cluster-watching controller
//! skeleton (§4.2–§4.8). Builds on `rp-client` exactly the way `kube_runtime` builds on
//! `kube_client`.

pub mod changefeed_reader;
pub mod controller;
pub mod cooldown;
pub mod dispatcher;
pub mod listers;
pub mod reflector;
pub mod watcher;
pub mod workqueue;

pub use changefeed_reader::{ChangeFeedReader, KindRegistry};
pub use controller::{Action, Controller, SyncError, SyncOutcome, Syncer};
pub use cooldown::{ActiveOperationPrioritizingCooldown, CooldownChecker, TimeBasedCooldown};
pub use dispatcher::{BoxFuture, Dispatcher, Handler};
pub use listers::{Lister, NotFound};
pub use reflector::reflector;
pub use reflector::store::{Change, Store, Writer};
pub use watcher::{Event, ExpiringWatcher, RawSink, WatchExpired, WatcherHandle, WatcherSet};
pub use workqueue::WorkQueue;
