use serde::{Deserialize, Serialize};

use crate::metadata::CosmosMetadata;
use crate::resource::{Resource, ResourceKind};
use crate::resource_id::ResourceId;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationStatus {
    Accepted,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl OperationStatus {
    /// Terminal-status operations are dropped by the change-feed reader rather than
    /// forwarded (§4.2) because downstream consumers only care about active operations.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationStatus::Succeeded | OperationStatus::Failed | OperationStatus::Canceled
        )
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Operation {
    pub id: ResourceId,
    pub metadata: CosmosMetadata,
    /// The resource this operation mutates.
    pub external_id: ResourceId,
    pub status: OperationStatus,
}

impl Operation {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

impl Resource for Operation {
    fn kind() -> ResourceKind {
        ResourceKind::Operation
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
