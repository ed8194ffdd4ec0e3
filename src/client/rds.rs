//! Database snapshot store interface

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ClientError;

/// Status of a snapshot that can be copied
pub const AVAILABLE_STATUS: &str = "available";

/// Who created a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotKind {
    /// Taken by the backup schedule and expired by the provider
    Automated,
    /// Created by a copy call; kept until explicitly deleted
    Manual,
}

/// One snapshot as listed by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub identifier: String,
    pub db_identifier: String,
    pub kind: SnapshotKind,
    pub created_at: DateTime<Utc>,
    pub status: String,
}

impl SnapshotRecord {
    pub fn is_available(&self) -> bool {
        self.status == AVAILABLE_STATUS
    }
}

/// Snapshot listing, copy and delete
pub trait SnapshotStore {
    /// Snapshots of one database instance, of one kind, in any order
    fn describe_snapshots(
        &self,
        db_identifier: &str,
        kind: SnapshotKind,
    ) -> Result<Vec<SnapshotRecord>, ClientError>;

    /// Copy `source` to a new manual snapshot named `target`
    fn copy_snapshot(&mut self, source: &str, target: &str) -> Result<(), ClientError>;

    fn delete_snapshot(&mut self, identifier: &str) -> Result<(), ClientError>;
}
