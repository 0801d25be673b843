//! The two worked DNS controllers (§4.9/§4.10), the orphan sweep and cluster-service
//! mismatch detector (§4.11), and process configuration for the `controller-manager`
//! binary. Builds on `rp-runtime`'s controller skeleton exactly the way a real
//! kube-rs-based operator builds its reconcilers on `kube_runtime::Controller`.

pub mod config;
pub mod dns_cleanup;
pub mod dns_lifecycle;
pub mod dns_name;
pub mod error;
pub mod mismatch;
pub mod orphan_sweep;

pub use config::Config;
pub use dns_cleanup::{decide, CleanupAction, DnsCleanupController};
pub use dns_lifecycle::DnsLifecycleController;
pub use error::ControllerError;
pub use mismatch::{mismatch_report, ClusterServiceStore, MismatchReport};
pub use orphan_sweep::orphan_sweep;
