//! Cooldown admission filters (§4.7): decide whether a key may be synced right now,
//! independent of whether it's otherwise due for processing.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rp_core::ResourceId;
use tokio::time::Instant;

use crate::listers::Lister;

pub trait CooldownChecker: Send + Sync {
    fn can_sync(&self, key: &ResourceId) -> bool;

    /// Called by the controller skeleton once a sync of `key` has actually completed
    /// successfully (§4.7), so a time-based policy has something to measure the quiet
    /// period from. A no-op by default: only [`TimeBasedCooldown`] (and anything
    /// delegating to one) needs to remember anything here.
    fn record_sync(&self, _key: &ResourceId) {}
}

/// Admits a key at most once per `period`, measured from the last time
/// [`CooldownChecker::record_sync`] was called for that key (the controller skeleton
/// calls it after every successful `sync_once`, §4.7/§4.8).
pub struct TimeBasedCooldown {
    period: Duration,
    last_sync: DashMap<ResourceId, Instant>,
}

impl TimeBasedCooldown {
    #[must_use]
    pub fn new(period: Duration) -> Self {
        Self { period, last_sync: DashMap::new() }
    }
}

impl CooldownChecker for TimeBasedCooldown {
    fn can_sync(&self, key: &ResourceId) -> bool {
        match self.last_sync.get(key) {
            Some(last) => last.elapsed() >= self.period,
            None => true,
        }
    }

    fn record_sync(&self, key: &ResourceId) {
        self.last_sync.insert(key.clone(), Instant::now());
    }
}

/// Always admits a key whose owning cluster has an active (non-terminal) operation in
/// flight; otherwise delegates to a fallback cooldown (§4.7 — active operations should
/// not wait out an idle-period cooldown).
pub struct ActiveOperationPrioritizingCooldown {
    operations: Lister<rp_core::entities::Operation>,
    fallback: Arc<dyn CooldownChecker>,
}

impl ActiveOperationPrioritizingCooldown {
    #[must_use]
    pub fn new(operations: Lister<rp_core::entities::Operation>, fallback: Arc<dyn CooldownChecker>) -> Self {
        Self { operations, fallback }
    }
}

impl CooldownChecker for ActiveOperationPrioritizingCooldown {
    fn can_sync(&self, key: &ResourceId) -> bool {
        if !self.operations.list_active_operations_for_cluster(key).is_empty() {
            return true;
        }
        self.fallback.can_sync(key)
    }

    fn record_sync(&self, key: &ResourceId) {
        self.fallback.record_sync(key);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rp_core::entities::{Operation, OperationStatus};
    use rp_core::CosmosMetadata;
    use uuid::Uuid;

    use super::*;
    use crate::reflector::store::Writer;
    use crate::watcher::Event;

    fn cluster_id() -> ResourceId {
        ResourceId::new(
            "55555555-5555-5555-5555-555555555555".parse::<Uuid>().unwrap(),
            "rg",
            rp_core::resource_id::PROVIDER_NAMESPACE,
            vec![("hcpopenshiftclusters".into(), "c".into())],
        )
    }

    #[test]
    fn a_fresh_key_is_always_admitted() {
        let cooldown = TimeBasedCooldown::new(Duration::from_secs(30));
        assert!(cooldown.can_sync(&cluster_id()));
    }

    #[test]
    fn a_key_synced_just_now_is_refused_until_the_period_elapses() {
        let cooldown = TimeBasedCooldown::new(Duration::from_secs(30));
        cooldown.record_sync(&cluster_id());
        assert!(!cooldown.can_sync(&cluster_id()));
    }

    #[test]
    fn an_active_operation_overrides_a_cooling_down_fallback() {
        let fallback = Arc::new(TimeBasedCooldown::new(Duration::from_secs(30)));
        fallback.record_sync(&cluster_id());
        assert!(!fallback.can_sync(&cluster_id()));

        let writer: Writer<Operation> = Writer::new(vec![("cluster", crate::listers::index_operation_by_cluster)]);
        let op = Operation {
            id: ResourceId::new_subscription_scoped(
                cluster_id().subscription_id(),
                rp_core::resource_id::PROVIDER_NAMESPACE,
                vec![("operations".into(), "op1".into())],
            ),
            metadata: CosmosMetadata::new("e0", chrono::Utc::now()),
            external_id: cluster_id(),
            status: OperationStatus::Running,
        };
        writer.apply(Event::Applied(Arc::new(op)));

        let cooldown = ActiveOperationPrioritizingCooldown::new(
            crate::listers::Lister::new(writer.as_reader()),
            fallback,
        );
        assert!(cooldown.can_sync(&cluster_id()));
    }
}
