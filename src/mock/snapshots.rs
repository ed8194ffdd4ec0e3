//! In-memory snapshot store

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::client::{ClientError, SnapshotKind, SnapshotRecord, SnapshotStore, AVAILABLE_STATUS};

use super::failure::{FailureConfig, FailureInjector, MockOperation};

#[derive(Debug, Default)]
struct StoreState {
    snapshots: Vec<SnapshotRecord>,
    /// Identifiers whose deletion is refused
    undeletable: HashSet<String>,
    /// Copy requests as (source, target)
    copies: Vec<(String, String)>,
    /// Successful deletions in call order
    deletions: Vec<String>,
}

/// Snapshot store backed by a vector
#[derive(Debug, Clone, Default)]
pub struct MockSnapshotStore {
    state: Arc<Mutex<StoreState>>,
    failures: Arc<Mutex<FailureInjector>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockSnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: SnapshotRecord) {
        lock(&self.state).snapshots.push(record);
    }

    /// Add an automated snapshot of `db` with the given status.
    pub fn add_automated(&self, db: &str, identifier: &str, created_at: DateTime<Utc>, status: &str) {
        self.insert(SnapshotRecord {
            identifier: identifier.to_string(),
            db_identifier: db.to_string(),
            kind: SnapshotKind::Automated,
            created_at,
            status: status.to_string(),
        });
    }

    /// Add an available manual snapshot of `db`.
    pub fn add_manual(&self, db: &str, identifier: &str, created_at: DateTime<Utc>) {
        self.insert(SnapshotRecord {
            identifier: identifier.to_string(),
            db_identifier: db.to_string(),
            kind: SnapshotKind::Manual,
            created_at,
            status: AVAILABLE_STATUS.to_string(),
        });
    }

    pub fn inject(&self, op: MockOperation, config: FailureConfig) {
        lock(&self.failures).inject(op, config);
    }

    pub fn inject_error(&self, op: MockOperation, message: impl Into<String>) {
        lock(&self.failures).inject_error(op, message);
    }

    pub fn clear_failures(&self) {
        lock(&self.failures).clear();
        lock(&self.state).undeletable.clear();
    }

    /// Refuse deletion of one identifier until failures are cleared
    pub fn fail_delete_of(&self, identifier: &str) {
        lock(&self.state).undeletable.insert(identifier.to_string());
    }

    pub fn contains(&self, identifier: &str) -> bool {
        lock(&self.state)
            .snapshots
            .iter()
            .any(|s| s.identifier == identifier)
    }

    /// Manual snapshot identifiers of `db`, sorted
    pub fn manual_identifiers(&self, db: &str) -> Vec<String> {
        let mut ids: Vec<String> = lock(&self.state)
            .snapshots
            .iter()
            .filter(|s| s.kind == SnapshotKind::Manual && s.db_identifier == db)
            .map(|s| s.identifier.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn copies(&self) -> Vec<(String, String)> {
        lock(&self.state).copies.clone()
    }

    pub fn deletions(&self) -> Vec<String> {
        lock(&self.state).deletions.clone()
    }
}

impl SnapshotStore for MockSnapshotStore {
    fn describe_snapshots(
        &self,
        db_identifier: &str,
        kind: SnapshotKind,
    ) -> Result<Vec<SnapshotRecord>, ClientError> {
        lock(&self.failures).check(MockOperation::DescribeSnapshots)?;
        Ok(lock(&self.state)
            .snapshots
            .iter()
            .filter(|s| s.kind == kind && s.db_identifier == db_identifier)
            .cloned()
            .collect())
    }

    fn copy_snapshot(&mut self, source: &str, target: &str) -> Result<(), ClientError> {
        lock(&self.failures).check(MockOperation::CopySnapshot)?;
        let mut state = lock(&self.state);

        if state.snapshots.iter().any(|s| s.identifier == target) {
            return Err(ClientError::new(
                MockOperation::CopySnapshot.as_str(),
                format!("snapshot '{}' already exists", target),
            ));
        }
        let original = state
            .snapshots
            .iter()
            .find(|s| s.identifier == source)
            .cloned()
            .ok_or_else(|| {
                ClientError::new(
                    MockOperation::CopySnapshot.as_str(),
                    format!("snapshot '{}' not found", source),
                )
            })?;

        state.copies.push((source.to_string(), target.to_string()));
        state.snapshots.push(SnapshotRecord {
            identifier: target.to_string(),
            kind: SnapshotKind::Manual,
            status: AVAILABLE_STATUS.to_string(),
            ..original
        });
        Ok(())
    }

    fn delete_snapshot(&mut self, identifier: &str) -> Result<(), ClientError> {
        lock(&self.failures).check(MockOperation::DeleteSnapshot)?;
        let mut state = lock(&self.state);

        if state.undeletable.contains(identifier) {
            return Err(ClientError::new(
                MockOperation::DeleteSnapshot.as_str(),
                format!("snapshot '{}' is in use", identifier),
            ));
        }
        let before = state.snapshots.len();
        state.snapshots.retain(|s| s.identifier != identifier);
        if state.snapshots.len() == before {
            return Err(ClientError::new(
                MockOperation::DeleteSnapshot.as_str(),
                format!("snapshot '{}' not found", identifier),
            ));
        }
        state.deletions.push(identifier.to_string());
        Ok(())
    }
}
