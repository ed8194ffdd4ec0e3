//! Archive run report

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Schema identifier for archive reports
pub const SCHEMA_ID: &str = "archivist/archive_report@1";

/// What happened to the latest automated snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum CopyOutcome {
    /// A new archived copy was requested
    Copied { target: String },
    /// An archived copy with the target name already existed
    AlreadyArchived { target: String },
    /// Dry run: the copy would have been requested
    WouldCopy { target: String },
}

impl CopyOutcome {
    pub fn target(&self) -> &str {
        match self {
            Self::Copied { target }
            | Self::AlreadyArchived { target }
            | Self::WouldCopy { target } => target,
        }
    }
}

/// A deletion the store refused
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedDeletion {
    pub identifier: String,
    pub error: String,
}

/// Result of one archive run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveReport {
    pub schema_id: String,
    pub run_id: String,
    pub db_identifier: String,
    /// Reference instant the run used for age checks and retention
    pub now: DateTime<Utc>,
    /// Automated snapshot the archive copy was taken from
    pub source_snapshot: String,
    pub copy: CopyOutcome,
    /// Archived copies kept, newest first
    pub retained: Vec<String>,
    /// Archived copies deleted (or, on a dry run, that would be)
    pub deleted: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_deletions: Vec<FailedDeletion>,
    pub dry_run: bool,
}

impl ArchiveReport {
    /// True when every planned deletion went through
    pub fn is_complete(&self) -> bool {
        self.failed_deletions.is_empty()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
