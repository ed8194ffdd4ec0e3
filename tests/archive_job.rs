//! Archive job integration tests
//!
//! Drives `Archiver` against the in-memory snapshot store: copy, retention,
//! deletion, reruns, and the checks that abort a run.

use archivist::archive::{ArchiveError, Archiver, CopyOutcome};
use archivist::client::SnapshotStore;
use archivist::config::ArchiveSettings;
use archivist::mock::{MockOperation, MockSnapshotStore};
use archivist::{RetentionError, RetentionSelector};
use chrono::{DateTime, Duration, TimeZone, Utc};

const DB: &str = "postgres";

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2019, 8, 16, 16, 2, 33).unwrap()
}

fn latest_created() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2019, 8, 16, 5, 0, 0).unwrap()
}

fn archive_id(date: DateTime<Utc>) -> String {
    format!("{}-archived-{}", DB, date.format("%Y-%m-%d"))
}

fn archived(dates: &[&str]) -> Vec<String> {
    dates
        .iter()
        .map(|d| format!("{}-archived-2019-{}", DB, d))
        .collect()
}

/// Store with a fresh automated snapshot and 62 daily archives ending the
/// day before, plus snapshots the job must never touch.
fn seeded_store() -> MockSnapshotStore {
    let store = MockSnapshotStore::new();
    store.add_automated(DB, "rds:postgres-2019-08-15-05-00", latest_created() - Duration::days(1), "available");
    store.add_automated(DB, "rds:postgres-2019-08-16-05-00", latest_created(), "available");

    let first = Utc.with_ymd_and_hms(2019, 8, 15, 0, 0, 0).unwrap();
    for day in 0..62 {
        let created = first - Duration::days(day);
        store.add_manual(DB, &archive_id(created), created);
    }

    store.add_manual(DB, "postgres-pre-upgrade", first - Duration::days(400));
    store.add_manual("other", "other-archived-2019-01-01", first - Duration::days(200));
    store
}

fn settings(dry_run: bool) -> ArchiveSettings {
    ArchiveSettings {
        db_identifier: Some(DB.to_string()),
        dry_run,
        ..ArchiveSettings::default()
    }
}

fn archiver(store: &MockSnapshotStore, dry_run: bool) -> Archiver<MockSnapshotStore> {
    Archiver::new(
        store.clone(),
        DB,
        RetentionSelector::default(),
        &settings(dry_run),
    )
    .unwrap()
}

fn first_run_retained() -> Vec<String> {
    archived(&[
        "08-15", "08-14", "08-13", "08-12", "08-11", "08-10", "08-03", "07-27", "07-20", "06-20",
        "06-15",
    ])
}

// === Copy and prune ===

#[test]
fn test_first_run_copies_and_prunes() {
    let store = seeded_store();
    let report = archiver(&store, false).run(now()).unwrap();

    assert_eq!(
        report.copy,
        CopyOutcome::Copied {
            target: "postgres-archived-2019-08-16".to_string()
        }
    );
    assert_eq!(report.source_snapshot, "rds:postgres-2019-08-16-05-00");
    assert_eq!(report.retained, first_run_retained());
    assert_eq!(report.deleted.len(), 51);
    assert!(report.is_complete());
    assert!(!report.dry_run);

    // Deletions go out in identifier order
    let mut sorted = report.deleted.clone();
    sorted.sort();
    assert_eq!(report.deleted, sorted);
    assert_eq!(store.deletions(), report.deleted);

    let mut expected = first_run_retained();
    expected.push("postgres-archived-2019-08-16".to_string());
    expected.push("postgres-pre-upgrade".to_string());
    expected.sort();
    assert_eq!(store.manual_identifiers(DB), expected);
    assert!(store.contains("other-archived-2019-01-01"));
}

#[test]
fn test_second_run_is_noop() {
    let store = seeded_store();
    archiver(&store, false).run(now()).unwrap();

    let report = archiver(&store, false).run(now()).unwrap();

    assert_eq!(
        report.copy,
        CopyOutcome::AlreadyArchived {
            target: "postgres-archived-2019-08-16".to_string()
        }
    );
    assert!(report.deleted.is_empty());
    assert_eq!(report.retained.len(), 12);
    assert_eq!(report.retained[0], "postgres-archived-2019-08-16");
    assert_eq!(store.copies().len(), 1);
}

#[test]
fn test_dry_run_changes_nothing() {
    let store = seeded_store();
    let before = store.manual_identifiers(DB);

    let report = archiver(&store, true).run(now()).unwrap();

    assert!(report.dry_run);
    assert!(matches!(report.copy, CopyOutcome::WouldCopy { .. }));
    assert_eq!(report.deleted.len(), 51);
    assert!(store.copies().is_empty());
    assert!(store.deletions().is_empty());
    assert_eq!(store.manual_identifiers(DB), before);
}

// === Partial failure and resumption ===

#[test]
fn test_failed_delete_is_recorded_and_retried_next_run() {
    let store = seeded_store();
    store.fail_delete_of("postgres-archived-2019-07-01");

    let report = archiver(&store, false).run(now()).unwrap();

    assert!(!report.is_complete());
    assert_eq!(report.failed_deletions.len(), 1);
    assert_eq!(report.failed_deletions[0].identifier, "postgres-archived-2019-07-01");
    assert_eq!(report.deleted.len(), 50);
    assert!(store.contains("postgres-archived-2019-07-01"));

    store.clear_failures();
    let rerun = archiver(&store, false).run(now()).unwrap();

    assert!(rerun.is_complete());
    assert_eq!(rerun.deleted, vec!["postgres-archived-2019-07-01"]);
    assert!(!store.contains("postgres-archived-2019-07-01"));
}

#[test]
fn test_copy_failure_aborts_before_deleting() {
    let store = seeded_store();
    store.inject_error(MockOperation::CopySnapshot, "snapshot quota exceeded");

    let err = archiver(&store, false).run(now()).unwrap_err();

    assert!(matches!(err, ArchiveError::Store(_)));
    assert!(err.to_string().contains("snapshot quota exceeded"));
    assert!(store.deletions().is_empty());
}

// === Latest snapshot checks ===

#[test]
fn test_no_automated_snapshots() {
    let store = MockSnapshotStore::new();
    store.add_manual(DB, "postgres-archived-2019-08-01", now() - Duration::days(15));

    let err = archiver(&store, false).run(now()).unwrap_err();
    assert!(matches!(err, ArchiveError::NoAutomatedSnapshots(ref db) if db == DB));
}

#[test]
fn test_latest_must_be_available() {
    let store = MockSnapshotStore::new();
    store.add_automated(DB, "rds:older", latest_created() - Duration::days(1), "available");
    store.add_automated(DB, "rds:latest", latest_created(), "creating");

    let err = archiver(&store, false).run(now()).unwrap_err();
    match err {
        ArchiveError::LatestNotAvailable { identifier, status } => {
            assert_eq!(identifier, "rds:latest");
            assert_eq!(status, "creating");
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(store.copies().is_empty());
}

#[test]
fn test_latest_in_future_rejected() {
    let store = MockSnapshotStore::new();
    store.add_automated(DB, "rds:future", now() + Duration::minutes(5), "available");

    let err = archiver(&store, false).run(now()).unwrap_err();
    assert!(matches!(err, ArchiveError::LatestInFuture { .. }));
}

#[test]
fn test_latest_too_old_rejected() {
    let store = MockSnapshotStore::new();
    store.add_automated(DB, "rds:stale", now() - Duration::hours(25), "available");

    let err = archiver(&store, false).run(now()).unwrap_err();
    assert!(matches!(err, ArchiveError::LatestTooOld { max_age_hours: 24, .. }));

    // Exactly at the limit is still acceptable
    let store = MockSnapshotStore::new();
    store.add_automated(DB, "rds:edge", now() - Duration::hours(24), "available");
    assert!(archiver(&store, false).run(now()).is_ok());
}

#[test]
fn test_invalid_archive_date_aborts_retention() {
    let store = MockSnapshotStore::new();
    store.add_automated(DB, "rds:latest", latest_created(), "available");
    store.add_manual(DB, "postgres-archived-2019-02-30", now() - Duration::days(100));

    let err = archiver(&store, false).run(now()).unwrap_err();
    match err {
        ArchiveError::Retention(RetentionError::UnparsableIdentifier { id, .. }) => {
            assert_eq!(id, "postgres-archived-2019-02-30");
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(store.deletions().is_empty());
}

// === Report ===

#[test]
fn test_report_serializes() {
    let store = seeded_store();
    let report = archiver(&store, false).run(now()).unwrap();

    let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
    assert_eq!(json["schema_id"], "archivist/archive_report@1");
    assert_eq!(json["db_identifier"], DB);
    assert_eq!(json["copy"]["outcome"], "copied");
    assert_eq!(json["copy"]["target"], "postgres-archived-2019-08-16");
    assert!(json.get("failed_deletions").is_none());
    assert!(!json["run_id"].as_str().unwrap().is_empty());
}

#[test]
fn test_into_store_returns_state() {
    let store = seeded_store();
    let mut job = archiver(&store, false);
    job.run(now()).unwrap();

    let inner = job.into_store();
    let manual = inner
        .describe_snapshots(DB, archivist::client::SnapshotKind::Manual)
        .unwrap();
    assert_eq!(manual.len(), 13);
}
