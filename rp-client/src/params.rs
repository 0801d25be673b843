//! Pagination and scoping parameters for [`crate::backend::Backend`] list calls.

use rp_core::ResourceId;
use uuid::Uuid;

/// A page token plus an optional page-size hint. The continuation token is the only
/// piece of list state that must survive a process restart (§4.2), so it is always a
/// plain `String` the caller can persist and replay verbatim.
#[derive(Clone, Debug, Default)]
pub struct ListParams {
    pub continuation: Option<String>,
    pub limit: Option<u32>,
}

impl ListParams {
    #[must_use]
    pub fn continue_from(token: impl Into<String>) -> Self {
        Self {
            continuation: Some(token.into()),
            limit: None,
        }
    }
}

/// How a [`crate::api::DocumentApi::list`] call is scoped. Resources in this framework
/// never carry a free-standing "owner" field; scoping is always expressed in terms of
/// the canonical [`ResourceId`] hierarchy (§2/§4.5).
#[derive(Clone, Debug)]
pub enum ListScope {
    /// Every resource of the requested kind under one resource group.
    ResourceGroup(ResourceId),
    /// Every resource of the requested kind whose `.parent()` is exactly this id (e.g.
    /// the singleton `ServiceProviderCluster` under a cluster, or a cluster's
    /// `DnsReservation`s).
    Parent(ResourceId),
    /// Every resource of the requested kind in one subscription, across resource
    /// groups.
    Subscription(Uuid),
}
