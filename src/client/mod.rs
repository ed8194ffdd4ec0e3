//! Collaborator interfaces
//!
//! The jobs never talk to a cloud API directly. They drive these traits,
//! which a deployment backs with real SDK clients and tests back with the
//! in-memory implementations in [`crate::mock`].

mod ecs;
mod rds;

pub use ecs::{
    Container, Deployment, EcsClient, LoadBalancer, NetworkInterface, ServiceDescription, Task,
    PRIMARY_DEPLOYMENT, RUNNING_STATUS,
};
pub use rds::{SnapshotKind, SnapshotRecord, SnapshotStore, AVAILABLE_STATUS};

/// A collaborator call failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{operation} failed: {message}")]
pub struct ClientError {
    /// Operation name, e.g. `delete_snapshot`
    pub operation: String,
    pub message: String,
}

impl ClientError {
    pub fn new(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            message: message.into(),
        }
    }
}
