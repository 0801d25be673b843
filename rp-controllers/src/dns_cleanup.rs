//! The DNS reservation cleanup controller (§4.10): a 10-case state machine that garbage
//! collects orphaned or superseded reservations. [`decide`] is a pure function so the
//! seven literal scenarios in §8 are unit-testable without a queue, store, or backend
//! in the loop; [`DnsCleanupController`] is the thin `Syncer` that loads the inputs and
//! applies the decision.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Utc};
use rp_client::{Backend, Client};
use rp_core::entities::{dns_reservation, BindingState, DnsReservation, ServiceProviderCluster};
use rp_core::ResourceId;
use rp_runtime::{Action, CooldownChecker, SyncError, SyncOutcome, Syncer};
use tokio_util::sync::CancellationToken;

use crate::error::ControllerError;

/// How the owning cluster's `ServiceProviderCluster` currently refers to a reservation
/// (§4.10, "Classify the cluster reference").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClusterRef {
    Absent,
    PointsHere,
    HasNoDns,
    PointsElsewhere,
}

fn classify(reservation: &DnsReservation, spc: Option<&ServiceProviderCluster>) -> ClusterRef {
    match spc {
        None => ClusterRef::Absent,
        Some(spc) => match &spc.status.kube_api_server_dns_reservation {
            None => ClusterRef::HasNoDns,
            Some(ptr) if *ptr == reservation.id => ClusterRef::PointsHere,
            Some(_) => ClusterRef::PointsElsewhere,
        },
    }
}

/// What §4.10's table says to do once a case matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupAction {
    Delete,
    /// Return without acting; the carried time is when this key should next be
    /// revisited (mirrors `kube_runtime::controller::Action::requeue`).
    WaitUntil(DateTime<Utc>),
    NoOp,
    MarkBound,
    MarkPendingDeletion,
}

/// Evaluate the 10 cases in §4.10's table, in order, against one reservation and its
/// owning cluster's `ServiceProviderCluster` (`None` if the cluster itself is gone,
/// §4.10 "SPC absent").
#[must_use]
pub fn decide(now: DateTime<Utc>, reservation: &DnsReservation, spc: Option<&ServiceProviderCluster>) -> CleanupAction {
    // Cases 1-2 don't need the cluster reference classified at all.
    if let Some(cleanup_time) = reservation.cleanup_time {
        return if cleanup_time <= now {
            CleanupAction::Delete
        } else {
            CleanupAction::WaitUntil(cleanup_time)
        };
    }

    let cluster_ref = classify(reservation, spc);
    match (cluster_ref, reservation.binding_state) {
        // Case 3.
        (ClusterRef::Absent, BindingState::Bound) => CleanupAction::MarkPendingDeletion,
        // Case 4.
        (ClusterRef::Absent, BindingState::Pending) => CleanupAction::Delete,
        // Case 5.
        (ClusterRef::PointsHere, BindingState::Bound) => CleanupAction::NoOp,
        // Case 6.
        (ClusterRef::PointsHere, _) => CleanupAction::MarkBound,
        // Cases 7-8.
        (ClusterRef::HasNoDns, BindingState::Pending) => match reservation.must_bind_by_time {
            Some(deadline) if deadline > now => CleanupAction::WaitUntil(deadline),
            _ => CleanupAction::Delete,
        },
        // Case 9.
        (ClusterRef::PointsElsewhere, BindingState::Pending) => CleanupAction::Delete,
        // Case 10.
        (ClusterRef::PointsElsewhere | ClusterRef::HasNoDns, BindingState::Bound) => CleanupAction::MarkPendingDeletion,
        // A reservation can only be PendingDeletion with cleanup_time set (§3
        // invariant), which cases 1-2 above already handled unconditionally.
        (_, BindingState::PendingDeletion) => CleanupAction::NoOp,
    }
}

pub struct DnsCleanupController<B> {
    client: Client<B>,
    cooldown: Arc<dyn CooldownChecker>,
}

impl<B: Backend> DnsCleanupController<B> {
    #[must_use]
    pub fn new(client: Client<B>, cooldown: Arc<dyn CooldownChecker>) -> Self {
        Self { client, cooldown }
    }

    async fn sync(&self, key: &ResourceId) -> Result<SyncOutcome, ControllerError> {
        let reservations = self.client.api::<DnsReservation>();
        let reservation = match reservations.get(key).await {
            Ok(r) => r,
            Err(rp_client::Error::NotFound(_)) => return Ok(Action::await_change()),
            Err(err) => return Err(err.into()),
        };

        let spc_id = ServiceProviderCluster::id_for_cluster(&reservation.owning_cluster);
        let spcs = self.client.api::<ServiceProviderCluster>();
        let spc = match spcs.get(&spc_id).await {
            Ok(spc) => Some(spc),
            Err(rp_client::Error::NotFound(_)) => None,
            Err(err) => return Err(err.into()),
        };

        let now = Utc::now();
        match decide(now, &reservation, spc.as_ref()) {
            CleanupAction::Delete => {
                match reservations.delete(&reservation.id).await {
                    Ok(()) | Err(rp_client::Error::NotFound(_)) => {}
                    Err(err) => return Err(err.into()),
                }
                Ok(Action::await_change())
            }
            CleanupAction::WaitUntil(deadline) => {
                let remaining = (deadline - now).to_std().unwrap_or(StdDuration::ZERO);
                Ok(Action::requeue_after(remaining))
            }
            CleanupAction::NoOp => Ok(Action::await_change()),
            CleanupAction::MarkBound => {
                let mut updated = reservation.clone();
                updated.mark_bound();
                reservations.replace(&updated).await?;
                Ok(Action::await_change())
            }
            CleanupAction::MarkPendingDeletion => {
                let mut updated = reservation.clone();
                updated.mark_pending_deletion(now);
                reservations.replace(&updated).await?;
                let grace = dns_reservation::ORPHAN_GRACE_PERIOD.to_std().unwrap_or(StdDuration::ZERO);
                Ok(Action::requeue_after(grace))
            }
        }
    }
}

impl<B: Backend> Syncer<DnsReservation> for DnsCleanupController<B> {
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
    use chrono::Duration;
    use rp_core::entities::service_provider_cluster::ServiceProviderClusterStatus;
    use rp_core::CosmosMetadata;
    use uuid::Uuid;

    use super::*;

    const CLOCK: &str = "2025-01-15T12:00:00Z";

    fn now() -> DateTime<Utc> {
        CLOCK.parse().unwrap()
    }

    fn sub() -> Uuid {
        "22222222-2222-2222-2222-222222222222".parse().unwrap()
    }

    fn cluster_id() -> ResourceId {
        ResourceId::new(
            sub(),
            "rg",
            rp_core::resource_id::PROVIDER_NAMESPACE,
            vec![("hcpopenshiftclusters".into(), "c".into())],
        )
    }

    fn reservation_id(name: &str) -> ResourceId {
        ResourceId::new_subscription_scoped(
            sub(),
            rp_core::resource_id::PROVIDER_NAMESPACE,
            vec![(dns_reservation::RESOURCE_TYPE.to_string(), name.to_string())],
        )
    }

    fn base_reservation(state: BindingState) -> DnsReservation {
        DnsReservation {
            id: reservation_id("my-dns"),
            metadata: CosmosMetadata::new("e0", now()),
            owning_cluster: cluster_id(),
            binding_state: state,
            must_bind_by_time: None,
            cleanup_time: None,
        }
    }

    fn spc_pointing_at(reservation: Option<&ResourceId>) -> ServiceProviderCluster {
        ServiceProviderCluster {
            id: ServiceProviderCluster::id_for_cluster(&cluster_id()),
            metadata: CosmosMetadata::new("e0", now()),
            status: ServiceProviderClusterStatus {
                kube_api_server_dns_reservation: reservation.cloned(),
            },
        }
    }

    fn at(hhmmss: &str) -> DateTime<Utc> {
        format!("2025-01-15T{hhmmss}Z").parse().unwrap()
    }

    #[test]
    fn s1_cleanup_time_elapsed_with_spc_absent_deletes() {
        let mut r = base_reservation(BindingState::PendingDeletion);
        r.cleanup_time = Some(at("11:00:00"));
        assert_eq!(decide(now(), &r, None), CleanupAction::Delete);
    }

    #[test]
    fn s2_cleanup_time_in_future_with_spc_absent_waits() {
        let mut r = base_reservation(BindingState::PendingDeletion);
        r.cleanup_time = Some(at("13:00:00"));
        assert_eq!(decide(now(), &r, None), CleanupAction::WaitUntil(at("13:00:00")));
    }

    #[test]
    fn s3_bound_with_spc_absent_starts_the_grace_period() {
        let r = base_reservation(BindingState::Bound);
        assert_eq!(decide(now(), &r, None), CleanupAction::MarkPendingDeletion);
    }

    #[test]
    fn s4_pending_with_spc_absent_deletes() {
        let mut r = base_reservation(BindingState::Pending);
        r.must_bind_by_time = Some(at("13:00:00"));
        assert_eq!(decide(now(), &r, None), CleanupAction::Delete);
    }

    #[test]
    fn s5_pending_with_spc_pointing_here_marks_bound_case_six() {
        let mut r = base_reservation(BindingState::Pending);
        r.must_bind_by_time = Some(at("13:00:00"));
        let spc = spc_pointing_at(Some(&r.id));
        assert_eq!(decide(now(), &r, Some(&spc)), CleanupAction::MarkBound);
    }

    #[test]
    fn s6_pending_past_deadline_with_no_dns_pointer_deletes_case_eight() {
        let mut r = base_reservation(BindingState::Pending);
        r.must_bind_by_time = Some(at("11:00:00"));
        let spc = spc_pointing_at(None);
        assert_eq!(decide(now(), &r, Some(&spc)), CleanupAction::Delete);
    }

    #[test]
    fn s7_bound_with_spc_pointing_elsewhere_starts_the_grace_period_case_ten() {
        let r = base_reservation(BindingState::Bound);
        let other = reservation_id("other-dns");
        let spc = spc_pointing_at(Some(&other));
        assert_eq!(decide(now(), &r, Some(&spc)), CleanupAction::MarkPendingDeletion);
    }

    #[test]
    fn case_six_wins_over_case_eight_even_past_deadline() {
        let mut r = base_reservation(BindingState::Pending);
        r.must_bind_by_time = Some(at("11:00:00"));
        let spc = spc_pointing_at(Some(&r.id));
        assert_eq!(decide(now(), &r, Some(&spc)), CleanupAction::MarkBound);
    }

    #[test]
    fn steady_state_is_untouched() {
        let r = base_reservation(BindingState::Bound);
        let spc = spc_pointing_at(Some(&r.id));
        assert_eq!(decide(now(), &r, Some(&spc)), CleanupAction::NoOp);
    }

    #[test]
    fn mark_pending_deletion_sets_a_grace_period_exactly_seven_days_out() {
        let mut updated = base_reservation(BindingState::Bound);
        updated.mark_pending_deletion(now());
        assert_eq!(updated.cleanup_time, Some(now() + Duration::days(7)));
        assert!(updated.invariant_holds());
    }
}
