use serde::{Deserialize, Serialize};

use crate::metadata::CosmosMetadata;
use crate::resource::{Resource, ResourceKind};
use crate::resource_id::ResourceId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationState {
    Registered,
    Unregistered,
    Warned,
    Suspended,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Subscription {
    pub id: ResourceId,
    pub metadata: CosmosMetadata,
    pub registration_state: RegistrationState,
}

impl Resource for Subscription {
    fn kind() -> ResourceKind {
        ResourceKind::Subscription
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
