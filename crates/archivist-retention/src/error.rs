//! Retention errors.

use chrono::{DateTime, Utc};

/// Reasons a retention decision could not be made.
///
/// Every variant aborts the whole selection; no partial result is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetentionError {
    #[error("invalid timestamp for '{id}': {timestamp} is after {now}")]
    InvalidTimestamp {
        id: String,
        timestamp: DateTime<Utc>,
        now: DateTime<Utc>,
    },

    #[error("identifier '{id}' does not match format '{format}'")]
    UnparsableIdentifier { id: String, format: String },

    #[error("duplicate identifier: '{0}'")]
    DuplicateId(String),

    #[error("invalid identifier format '{0}'")]
    InvalidFormat(String),
}

impl RetentionError {
    /// Identifier the error is about, if any.
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::InvalidTimestamp { id, .. } | Self::UnparsableIdentifier { id, .. } => Some(id),
            Self::DuplicateId(id) => Some(id),
            Self::InvalidFormat(_) => None,
        }
    }
}
