//! archivist - tiered snapshot archiving
//!
//! Keeps a permanent, thinning history of database snapshots: every run
//! copies the latest automated snapshot to a dated archive and prunes the
//! archives with an age-tiered retention policy (see
//! [`archivist_retention`]). Also carries the service upkeep jobs that run
//! on the same schedule: staleness-triggered redeploys and task health
//! aggregation.

pub mod archive;
pub mod client;
pub mod config;
pub mod health;
pub mod logging;
pub mod mock;
pub mod redeploy;

pub use archive::{ArchiveError, ArchiveNaming, ArchiveReport, Archiver, CopyOutcome, RetentionPlan};
pub use archivist_retention::{
    AgeTier, AgeTierTable, DatedArtifact, IdentifierFormat, RetentionError, RetentionSelector,
    TimestampParser,
};
pub use client::{ClientError, EcsClient, SnapshotStore};
pub use config::{ArchivistConfig, ConfigError, EffectiveConfig};
pub use health::{HealthChecker, HealthError, HealthReport, HealthSummary, MetricDatum};
pub use redeploy::{evaluate_redeploy, RedeployDecision, RedeployError, Redeployer};
