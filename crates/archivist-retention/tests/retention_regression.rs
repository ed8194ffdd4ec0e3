//! Regression and property tests for retention selection.
//!
//! The three fixed sets are historical archive listings; their retained
//! subsets must never change, since deleted snapshots cannot come back.

use std::collections::HashMap;

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use archivist_retention::{
    AgeTier, AgeTierTable, DatedArtifact, IdentifierFormat, RetentionError, RetentionSelector,
};

const FMT: &str = "xyz-%Y-%m-%d";

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2019, 8, 16, 16, 2, 33).unwrap()
}

fn selector() -> RetentionSelector {
    RetentionSelector::new(AgeTierTable::new(
        vec![AgeTier::new(7, 1), AgeTier::new(30, 7), AgeTier::new(365, 30)],
        90,
    ))
}

fn ids(dates: &[&str]) -> Vec<String> {
    dates.iter().map(|d| format!("xyz-{}", d)).collect()
}

fn daily(from: DateTime<Utc>, count: i64) -> Vec<String> {
    let format = IdentifierFormat::new(FMT).unwrap();
    (0..count)
        .map(|i| format.format(&(from - Duration::days(i))))
        .collect()
}

/// Shuffle, select, then check that selecting again from a shuffled copy of
/// the result is a no-op.
fn assert_retains(mut input: Vec<String>, expected: &[String], rng: &mut StdRng) {
    let format = IdentifierFormat::new(FMT).unwrap();
    let selector = selector();

    input.shuffle(rng);
    let retained = selector.select_ids(&input, &format, now()).unwrap();
    assert_eq!(retained, expected, "retained ids do not match");

    let mut again = retained.clone();
    again.shuffle(rng);
    assert_eq!(
        selector.select_ids(&again, &format, now()).unwrap(),
        retained,
        "selection is not idempotent"
    );
}

#[test]
fn test_mixed_density_archive() {
    let input = ids(&[
        "2019-08-16", "2019-08-15", "2019-08-14", "2019-08-13", "2019-08-12",
        "2019-08-11", "2019-08-10", "2019-08-09", "2019-08-08", "2019-08-07",
        "2019-08-06", "2019-08-05", "2019-08-04", "2019-08-03", "2019-08-02",
        "2019-08-01", "2019-07-15", "2019-07-01", "2019-06-15", "2019-06-01",
        "2019-05-15", "2019-05-01", "2019-04-15", "2019-04-01", "2018-12-01",
        "2018-10-01", "2018-08-01", "2018-06-01", "2018-04-01", "2018-02-01",
        "2018-01-01", "2017-12-01", "2017-11-01", "2017-10-01",
    ]);
    let expected = ids(&[
        "2019-08-16", "2019-08-15", "2019-08-14", "2019-08-13", "2019-08-12",
        "2019-08-11", "2019-08-10", "2019-08-03", "2019-08-01", "2019-07-15",
        "2019-06-15", "2019-06-01", "2019-05-15", "2019-04-15", "2019-04-01",
        "2018-12-01", "2018-10-01", "2018-08-01", "2018-06-01", "2018-04-01",
        "2018-01-01", "2017-11-01", "2017-10-01",
    ]);
    assert_eq!(input.len(), 34);
    assert_eq!(expected.len(), 23);

    let mut rng = StdRng::seed_from_u64(123);
    assert_retains(input, &expected, &mut rng);
}

#[test]
fn test_two_months_of_daily_snapshots() {
    // 2019-08-16 back to 2019-06-15 inclusive.
    let input = daily(Utc.with_ymd_and_hms(2019, 8, 16, 0, 0, 0).unwrap(), 63);
    assert_eq!(input.last().map(String::as_str), Some("xyz-2019-06-15"));

    let expected = ids(&[
        "2019-08-16", "2019-08-15", "2019-08-14", "2019-08-13", "2019-08-12",
        "2019-08-11", "2019-08-10", "2019-08-03", "2019-07-27", "2019-07-20",
        "2019-06-20", "2019-06-15",
    ]);

    let mut rng = StdRng::seed_from_u64(123);
    assert_retains(input, &expected, &mut rng);
}

#[test]
fn test_sparse_yearly_snapshots_all_kept() {
    let input = ids(&[
        "2019-08-16", "2018-08-15", "2017-08-15", "2016-08-15", "2010-08-15", "2009-08-15",
    ]);
    let expected = input.clone();

    let mut rng = StdRng::seed_from_u64(123);
    assert_retains(input, &expected, &mut rng);
}

#[test]
fn test_future_snapshot_aborts_selection() {
    let format = IdentifierFormat::new(FMT).unwrap();
    let input = ids(&["2019-08-15", "2019-08-17", "2019-08-01"]);

    let err = selector().select_ids(&input, &format, now()).unwrap_err();
    assert!(matches!(err, RetentionError::InvalidTimestamp { .. }));
    assert_eq!(err.id(), Some("xyz-2019-08-17"));
}

#[test]
fn test_same_day_snapshot_is_not_future() {
    // Date-only ids parse to midnight, which is before `now` on the same day.
    let format = IdentifierFormat::new(FMT).unwrap();
    let retained = selector()
        .select_ids(["xyz-2019-08-16"], &format, now())
        .unwrap();
    assert_eq!(retained, vec!["xyz-2019-08-16"]);
}

#[test]
fn test_hourly_identifiers_keep_their_hour() {
    // Early on the 16th, a snapshot named for 05:00 the same day is still
    // in the future.
    let format = IdentifierFormat::new("snap-%Y-%m-%d-%H").unwrap();
    let early = Utc.with_ymd_and_hms(2019, 8, 16, 3, 0, 0).unwrap();
    let input = ["snap-2019-08-16-05", "snap-2019-08-15-05"];

    let err = selector().select_ids(input, &format, early).unwrap_err();
    assert!(matches!(err, RetentionError::InvalidTimestamp { .. }));
    assert_eq!(err.id(), Some("snap-2019-08-16-05"));

    let later = Utc.with_ymd_and_hms(2019, 8, 16, 6, 0, 0).unwrap();
    assert_eq!(
        selector().select_ids(input, &format, later).unwrap(),
        vec!["snap-2019-08-16-05", "snap-2019-08-15-05"]
    );
}

fn random_artifacts(rng: &mut StdRng) -> Vec<DatedArtifact> {
    let count = rng.gen_range(1..80);
    let mut offsets: Vec<i64> = (0..count).map(|_| rng.gen_range(0..(3 * 365 * 24))).collect();
    offsets.sort_unstable();
    offsets.dedup();
    offsets
        .into_iter()
        .map(|hours| DatedArtifact::new(format!("a{:08}", hours), now() - Duration::hours(hours)))
        .collect()
}

#[test]
fn test_randomised_properties() {
    let selector = selector();
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..200 {
        let artifacts = random_artifacts(&mut rng);
        let by_id: HashMap<String, DateTime<Utc>> = artifacts
            .iter()
            .map(|a| (a.id.clone(), a.timestamp))
            .collect();

        let mut sorted = artifacts.clone();
        sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        let newest = sorted.first().unwrap().id.clone();
        let oldest = sorted.last().unwrap().id.clone();

        let retained = selector.select(artifacts.clone(), now()).unwrap();

        // Both ends survive.
        assert_eq!(retained.first(), Some(&newest));
        assert_eq!(retained.last(), Some(&oldest));

        // Input order does not matter.
        let mut shuffled = artifacts.clone();
        shuffled.shuffle(&mut rng);
        assert_eq!(selector.select(shuffled, now()).unwrap(), retained);

        // Re-running over the result is a no-op.
        let kept: Vec<DatedArtifact> = retained
            .iter()
            .map(|id| DatedArtifact::new(id.clone(), by_id[id]))
            .collect();
        assert_eq!(selector.select(kept, now()).unwrap(), retained);

        // Between two adjacent kept artifacts, the distance is bounded by the
        // tier of the last artifact skipped before the older one.
        let position: HashMap<&str, usize> = sorted
            .iter()
            .enumerate()
            .map(|(i, a)| (a.id.as_str(), i))
            .collect();
        for pair in retained.windows(2) {
            let (newer, older) = (position[pair[0].as_str()], position[pair[1].as_str()]);
            if older - newer < 2 {
                continue;
            }
            let skipped = &sorted[older - 1];
            let bound = selector.table().required_gap(now() - skipped.timestamp);
            assert!(
                sorted[newer].timestamp - sorted[older].timestamp <= bound,
                "gap {} -> {} exceeds tier of {}",
                sorted[newer].id,
                sorted[older].id,
                skipped.id
            );
        }
    }
}
