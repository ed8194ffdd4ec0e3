//! Snapshot archive job
//!
//! Each run:
//! 1. Finds the latest automated snapshot of the database and checks it is
//!    available, not from the future, and recent enough to be worth keeping.
//! 2. Copies it to a permanent `<db>-archived-YYYY-MM-DD` snapshot unless a
//!    copy with that name exists.
//! 3. Applies the tiered retention policy to the archived copies and deletes
//!    the rest. A failed delete is recorded and the others still proceed;
//!    the next run picks up whatever is left.

mod naming;
mod report;

pub use naming::{ArchiveNaming, NamingError};
pub use report::{ArchiveReport, CopyOutcome, FailedDeletion, SCHEMA_ID};

use archivist_retention::{
    deletion_candidates, RetentionError, RetentionSelector, TimestampParser,
};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::client::{ClientError, SnapshotKind, SnapshotStore};
use crate::config::ArchiveSettings;

/// Errors that abort an archive run
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("no automated snapshots found for '{0}'")]
    NoAutomatedSnapshots(String),

    #[error("latest snapshot '{identifier}' status was \"{status}\"")]
    LatestNotAvailable { identifier: String, status: String },

    #[error("latest snapshot '{identifier}' created after current time: {created_at} vs {now}")]
    LatestInFuture {
        identifier: String,
        created_at: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    #[error("latest snapshot '{identifier}' created more than {max_age_hours} hours ago: {created_at} vs {now}")]
    LatestTooOld {
        identifier: String,
        created_at: DateTime<Utc>,
        now: DateTime<Utc>,
        max_age_hours: u64,
    },

    #[error("snapshot store error: {0}")]
    Store(#[from] ClientError),

    #[error("retention error: {0}")]
    Retention(#[from] RetentionError),

    #[error(transparent)]
    Naming(#[from] NamingError),
}

/// Retained and deletable identifiers for one listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetentionPlan {
    /// Newest first
    pub retained: Vec<String>,
    /// Ascending
    pub delete: Vec<String>,
}

impl RetentionPlan {
    /// Decide retention for `ids`, parsing each with `parser`.
    pub fn build<S, P>(
        ids: &[S],
        parser: &P,
        selector: &RetentionSelector,
        now: DateTime<Utc>,
    ) -> Result<Self, RetentionError>
    where
        S: AsRef<str>,
        P: TimestampParser + ?Sized,
    {
        let retained = selector.select_ids(ids.iter().map(|id| id.as_ref()), parser, now)?;
        let delete = deletion_candidates(ids, &retained);
        Ok(Self { retained, delete })
    }
}

/// Archive job for one database instance
pub struct Archiver<S> {
    store: S,
    naming: ArchiveNaming,
    selector: RetentionSelector,
    max_latest_age_hours: u64,
    dry_run: bool,
}

impl<S: SnapshotStore> Archiver<S> {
    pub fn new(
        store: S,
        db_identifier: &str,
        selector: RetentionSelector,
        settings: &ArchiveSettings,
    ) -> Result<Self, ArchiveError> {
        Ok(Self {
            store,
            naming: ArchiveNaming::new(db_identifier)?,
            selector,
            max_latest_age_hours: settings.max_latest_age_hours,
            dry_run: settings.dry_run,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Run the job against the store, with `now` as the reference instant.
    pub fn run(&mut self, now: DateTime<Utc>) -> Result<ArchiveReport, ArchiveError> {
        let db = self.naming.db_identifier().to_string();
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("archive", run_id = %run_id, db = %db);
        let _guard = span.enter();

        // Step 1: pick and check the latest automated snapshot
        let automated = self.store.describe_snapshots(&db, SnapshotKind::Automated)?;
        let latest = automated
            .iter()
            .max_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.identifier.cmp(&b.identifier))
            })
            .ok_or_else(|| ArchiveError::NoAutomatedSnapshots(db.clone()))?;

        if !latest.is_available() {
            return Err(ArchiveError::LatestNotAvailable {
                identifier: latest.identifier.clone(),
                status: latest.status.clone(),
            });
        }

        let age = now - latest.created_at;
        if age < Duration::zero() {
            return Err(ArchiveError::LatestInFuture {
                identifier: latest.identifier.clone(),
                created_at: latest.created_at,
                now,
            });
        }
        let max_age_ms = i64::try_from(self.max_latest_age_hours)
            .unwrap_or(i64::MAX)
            .saturating_mul(3_600_000);
        if age.num_milliseconds() > max_age_ms {
            return Err(ArchiveError::LatestTooOld {
                identifier: latest.identifier.clone(),
                created_at: latest.created_at,
                now,
                max_age_hours: self.max_latest_age_hours,
            });
        }

        // Step 2: make the permanent copy
        let source = latest.identifier.clone();
        let target = self.naming.identifier_for(&latest.created_at);
        let manual = self.store.describe_snapshots(&db, SnapshotKind::Manual)?;

        let copy = if manual.iter().any(|s| s.identifier == target) {
            tracing::info!(archive = %target, "archive copy already exists");
            CopyOutcome::AlreadyArchived { target }
        } else if self.dry_run {
            tracing::info!(source = %source, archive = %target, "dry run: would copy snapshot");
            CopyOutcome::WouldCopy { target }
        } else {
            tracing::info!(source = %source, archive = %target, "copying snapshot");
            self.store.copy_snapshot(&source, &target)?;
            CopyOutcome::Copied { target }
        };

        // Step 3: retention over archived copies as listed before the copy
        let archived: Vec<String> = manual
            .into_iter()
            .map(|s| s.identifier)
            .filter(|id| self.naming.matches(id))
            .collect();
        let plan = RetentionPlan::build(&archived, self.naming.format(), &self.selector, now)?;

        tracing::info!(
            archived = archived.len(),
            retained = plan.retained.len(),
            to_delete = plan.delete.len(),
            "retention decided"
        );

        let mut deleted = Vec::with_capacity(plan.delete.len());
        let mut failed_deletions = Vec::new();
        for identifier in plan.delete {
            if self.dry_run {
                tracing::info!(snapshot = %identifier, "dry run: would delete archived snapshot");
                deleted.push(identifier);
                continue;
            }
            tracing::info!(snapshot = %identifier, "deleting archived snapshot");
            match self.store.delete_snapshot(&identifier) {
                Ok(()) => deleted.push(identifier),
                Err(e) => {
                    tracing::warn!(snapshot = %identifier, error = %e, "failed to delete archived snapshot");
                    failed_deletions.push(FailedDeletion {
                        identifier,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(ArchiveReport {
            schema_id: SCHEMA_ID.to_string(),
            run_id,
            db_identifier: db,
            now,
            source_snapshot: source,
            copy,
            retained: plan.retained,
            deleted,
            failed_deletions,
            dry_run: self.dry_run,
        })
    }
}
