//! Domain entities used by the worked DNS reservation examples (§3).

pub mod dns_reservation;
pub mod hcp_cluster;
pub mod operation;
pub mod service_provider_cluster;
pub mod subscription;

pub use dns_reservation::{BindingState, DnsReservation};
pub use hcp_cluster::HcpCluster;
pub use operation::{Operation, OperationStatus};
pub use service_provider_cluster::ServiceProviderCluster;
pub use subscription::Subscription;
