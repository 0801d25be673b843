use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::metadata::CosmosMetadata;
use crate::resource::{Resource, ResourceKind};
use crate::resource_id::ResourceId;

pub const RESOURCE_TYPE: &str = "dnsReservations";

/// The grace period a `Bound` reservation whose owning cluster has vanished is kept
/// around for, before the cleanup controller deletes it (§4.10 cases 3 and 10, §8
/// property 2).
pub const ORPHAN_GRACE_PERIOD: Duration = Duration::days(7);

/// How long the lifecycle controller gives a freshly created reservation to be bound
/// before the cleanup controller reclaims it (§4.9 step 5).
pub const MUST_BIND_WITHIN: Duration = Duration::minutes(61);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BindingState {
    Pending,
    Bound,
    PendingDeletion,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DnsReservation {
    pub id: ResourceId,
    pub metadata: CosmosMetadata,
    pub owning_cluster: ResourceId,
    pub binding_state: BindingState,
    pub must_bind_by_time: Option<DateTime<Utc>>,
    pub cleanup_time: Option<DateTime<Utc>>,
}

impl DnsReservation {
    /// Construct a freshly reserved, not-yet-bound reservation (§4.9 step 5).
    #[must_use]
    pub fn new_pending(id: ResourceId, owning_cluster: ResourceId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            metadata: CosmosMetadata::default(),
            owning_cluster,
            binding_state: BindingState::Pending,
            must_bind_by_time: Some(now + MUST_BIND_WITHIN),
            cleanup_time: None,
        }
    }

    /// §4.9 step 7 / §4.10 case 6: mark as bound, the steady state for a reservation
    /// its cluster points to.
    pub fn mark_bound(&mut self) {
        self.binding_state = BindingState::Bound;
        self.must_bind_by_time = None;
        self.cleanup_time = None;
    }

    /// §4.10 cases 3 and 10: start the grace-period countdown to deletion.
    pub fn mark_pending_deletion(&mut self, now: DateTime<Utc>) {
        self.binding_state = BindingState::PendingDeletion;
        self.must_bind_by_time = None;
        self.cleanup_time = Some(now + ORPHAN_GRACE_PERIOD);
    }

    /// Invariant check used by tests and debug assertions: `cleanup_time` is set iff
    /// the binding state is `PendingDeletion` (§3).
    #[must_use]
    pub fn invariant_holds(&self) -> bool {
        self.cleanup_time.is_some() == (self.binding_state == BindingState::PendingDeletion)
    }
}

impl Resource for DnsReservation {
    fn kind() -> ResourceKind {
        ResourceKind::DnsReservation
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
