//! The `Resource` trait implemented by every domain entity.

use std::fmt;

use crate::metadata::CosmosMetadata;
use crate::resource_id::ResourceId;

/// The kind tag carried by a change-feed document header (§4.2), and used to pick a
/// dynamic dispatch target (the watcher set for that kind) at runtime.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ResourceKind {
    Subscription,
    HcpCluster,
    ServiceProviderCluster,
    DnsReservation,
    Operation,
    /// A kind the change-feed reader doesn't recognize; logged and dropped (§4.2).
    Unknown(String),
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Subscription => write!(f, "Subscription"),
            ResourceKind::HcpCluster => write!(f, "HcpCluster"),
            ResourceKind::ServiceProviderCluster => write!(f, "ServiceProviderCluster"),
            ResourceKind::DnsReservation => write!(f, "DnsReservation"),
            ResourceKind::Operation => write!(f, "Operation"),
            ResourceKind::Unknown(s) => write!(f, "Unknown({s})"),
        }
    }
}

/// Implemented by every domain entity stored in the authoritative database.
pub trait Resource: Clone + Send + Sync + 'static {
    /// The kind tag for this type, as carried on change-feed document headers.
    fn kind() -> ResourceKind;
    fn id(&self) -> &ResourceId;
    fn metadata(&self) -> &CosmosMetadata;
    fn metadata_mut(&mut self) -> &mut CosmosMetadata;
}
