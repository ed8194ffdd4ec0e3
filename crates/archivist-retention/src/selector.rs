//! Greedy retention selection over dated artifacts.
//!
//! Artifacts are walked newest to oldest. An artifact is kept when it is the
//! newest, the oldest, or when dropping it would leave a gap between the last
//! kept artifact and the next older one that is wider than the artifact's
//! own age tier allows.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::artifact::{DatedArtifact, TimestampParser};
use crate::error::RetentionError;
use crate::tier::AgeTierTable;

/// Selects the artifacts to keep under an [`AgeTierTable`].
#[derive(Debug, Clone, Default)]
pub struct RetentionSelector {
    table: AgeTierTable,
}

impl RetentionSelector {
    pub fn new(table: AgeTierTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &AgeTierTable {
        &self.table
    }

    /// Ids to retain, newest first.
    ///
    /// Fails without a partial result if any timestamp is after `now` or an
    /// id appears more than once. Input order does not affect the result.
    pub fn select(
        &self,
        artifacts: Vec<DatedArtifact>,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>, RetentionError> {
        let mut sorted = artifacts;
        sorted.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| b.id.cmp(&a.id))
        });

        validate(&sorted, now)?;

        let last_idx = sorted.len().saturating_sub(1);
        let mut last_kept: Option<DateTime<Utc>> = None;
        let mut retained = Vec::new();

        for (idx, artifact) in sorted.iter().enumerate() {
            let required_gap = self.table.required_gap(now - artifact.timestamp);
            let keep = match last_kept {
                None => true,
                Some(_) if idx == last_idx => true,
                Some(last) => last - sorted[idx + 1].timestamp > required_gap,
            };

            tracing::trace!(
                id = %artifact.id,
                required_gap_days = required_gap.num_days(),
                keep,
                "retention decision"
            );

            if keep {
                last_kept = Some(artifact.timestamp);
                retained.push(artifact.id.clone());
            }
        }

        tracing::debug!(
            candidates = sorted.len(),
            retained = retained.len(),
            "retention selection complete"
        );

        Ok(retained)
    }

    /// Parse every id with `parser`, then [`select`](Self::select).
    ///
    /// The first id the parser rejects aborts the call.
    pub fn select_ids<I, S, P>(
        &self,
        ids: I,
        parser: &P,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>, RetentionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
        P: TimestampParser + ?Sized,
    {
        let artifacts = ids
            .into_iter()
            .map(|id| {
                let id = id.as_ref();
                parser
                    .parse_timestamp(id)
                    .map(|timestamp| DatedArtifact::new(id, timestamp))
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.select(artifacts, now)
    }
}

/// Checks run over the sorted sequence, so the reported offender does not
/// depend on input order.
fn validate(sorted: &[DatedArtifact], now: DateTime<Utc>) -> Result<(), RetentionError> {
    let mut seen = HashSet::with_capacity(sorted.len());
    for artifact in sorted {
        if artifact.timestamp > now {
            return Err(RetentionError::InvalidTimestamp {
                id: artifact.id.clone(),
                timestamp: artifact.timestamp,
                now,
            });
        }
        if !seen.insert(artifact.id.as_str()) {
            return Err(RetentionError::DuplicateId(artifact.id.clone()));
        }
    }
    Ok(())
}

/// Ids in `all` that are not in `retained`, sorted ascending.
pub fn deletion_candidates<S: AsRef<str>>(all: &[S], retained: &[String]) -> Vec<String> {
    let keep: HashSet<&str> = retained.iter().map(String::as_str).collect();
    let mut doomed: Vec<String> = all
        .iter()
        .map(|id| id.as_ref())
        .filter(|id| !keep.contains(id))
        .map(str::to_string)
        .collect();
    doomed.sort();
    doomed.dedup();
    doomed
}
