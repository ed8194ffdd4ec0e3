//! Typed view of the merged configuration.

use std::collections::HashSet;

use archivist_retention::AgeTierTable;
use serde::{Deserialize, Serialize};

use super::defaults::{DEFAULT_MAX_LATEST_AGE_HOURS, DEFAULT_REDEPLOY_MAX_AGE_SECONDS};
use super::ConfigError;

/// Settings shared by every job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchivistConfig {
    /// Cloud region the collaborators talk to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Tier table applied to archived snapshot copies
    #[serde(default)]
    pub retention: AgeTierTable,

    #[serde(default)]
    pub archive: ArchiveSettings,

    /// Service targeted by redeploy and health checks
    #[serde(default)]
    pub ecs: EcsSettings,

    #[serde(default)]
    pub redeploy: RedeploySettings,

    #[serde(default)]
    pub health: HealthSettings,
}

/// Snapshot archive job settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveSettings {
    /// Database instance whose automated snapshots are archived
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_identifier: Option<String>,

    /// Refuse to archive when the latest automated snapshot is older than this
    #[serde(default = "default_max_latest_age_hours")]
    pub max_latest_age_hours: u64,

    /// Log copies and deletions without performing them
    #[serde(default)]
    pub dry_run: bool,
}

impl Default for ArchiveSettings {
    fn default() -> Self {
        Self {
            db_identifier: None,
            max_latest_age_hours: DEFAULT_MAX_LATEST_AGE_HOURS,
            dry_run: false,
        }
    }
}

fn default_max_latest_age_hours() -> u64 {
    DEFAULT_MAX_LATEST_AGE_HOURS
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EcsSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

/// Staleness redeploy settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedeploySettings {
    /// Force a new deployment once the primary deployment is older than this
    #[serde(default = "default_redeploy_max_age_seconds")]
    pub max_age_seconds: u64,
}

impl Default for RedeploySettings {
    fn default() -> Self {
        Self {
            max_age_seconds: DEFAULT_REDEPLOY_MAX_AGE_SECONDS,
        }
    }
}

fn default_redeploy_max_age_seconds() -> u64 {
    DEFAULT_REDEPLOY_MAX_AGE_SECONDS
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthSettings {
    /// Namespace metrics are published under
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_namespace: Option<String>,
}

impl ArchivistConfig {
    /// Validate cross-field rules that serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for tier in self.retention.tiers() {
            if !seen.insert(tier.max_age_days) {
                return Err(ConfigError::ValidationError(format!(
                    "retention.tiers: duplicate max_age_days {}",
                    tier.max_age_days
                )));
            }
        }

        if self.archive.max_latest_age_hours == 0 {
            return Err(ConfigError::ValidationError(
                "archive.max_latest_age_hours must be greater than 0".to_string(),
            ));
        }

        if self.redeploy.max_age_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "redeploy.max_age_seconds must be greater than 0".to_string(),
            ));
        }

        if let Some(db) = &self.archive.db_identifier {
            if db.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "archive.db_identifier must not be empty".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Database identifier, or an error naming the missing setting
    pub fn require_db_identifier(&self) -> Result<&str, ConfigError> {
        self.archive.db_identifier.as_deref().ok_or_else(|| {
            ConfigError::ValidationError(
                "archive.db_identifier is not set (use --db or ARCHIVIST_DB)".to_string(),
            )
        })
    }
}
