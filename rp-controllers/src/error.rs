//! Error kinds for the worked DNS controllers (§4.9/§4.10) and the periodic sweep jobs
//! (§4.11), composed from `rp-client`'s and `rp-core`'s the way `kube-client::Error`
//! composes `kube_core::Error` (§7).

use rp_core::ResourceId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Client(#[from] rp_client::Error),

    /// §4.9 step 4: every candidate suffix was rejected by the ambiguity/profanity
    /// filter after the configured number of attempts (see the design notes for the
    /// retry bound's rationale).
    #[error("exhausted {attempts} suffix candidates for cluster {cluster}, all rejected by the naming filter")]
    SuffixExhausted { cluster: ResourceId, attempts: u32 },
}

pub type Result<T> = std::result::Result<T, ControllerError>;
