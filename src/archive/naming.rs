//! Archive copy naming
//!
//! Archived copies are named `<db>-archived-YYYY-MM-DD` after the creation
//! day of the automated snapshot they were copied from. The name is the only
//! place the archive date is stored.

use archivist_retention::{IdentifierFormat, RetentionError};
use chrono::{DateTime, Utc};
use regex_lite::Regex;

/// Names and recognises the archived copies of one database instance.
#[derive(Debug, Clone)]
pub struct ArchiveNaming {
    db_identifier: String,
    format: IdentifierFormat,
    pattern: Regex,
}

#[derive(Debug, thiserror::Error)]
pub enum NamingError {
    #[error("invalid archive name format: {0}")]
    Format(#[from] RetentionError),

    #[error("invalid archive name pattern: {0}")]
    Pattern(#[from] regex_lite::Error),
}

impl ArchiveNaming {
    pub fn new(db_identifier: &str) -> Result<Self, NamingError> {
        let format =
            IdentifierFormat::new(format!("{}-archived-%Y-%m-%d", db_identifier.replace('%', "%%")))?;
        let pattern = Regex::new(&format!(
            r"^{}-archived-\d{{4}}-\d{{2}}-\d{{2}}$",
            regex_lite::escape(db_identifier)
        ))?;
        Ok(Self {
            db_identifier: db_identifier.to_string(),
            format,
            pattern,
        })
    }

    pub fn db_identifier(&self) -> &str {
        &self.db_identifier
    }

    /// Parse rule for archived identifiers
    pub fn format(&self) -> &IdentifierFormat {
        &self.format
    }

    /// Archive name for a snapshot created at `created_at`
    pub fn identifier_for(&self, created_at: &DateTime<Utc>) -> String {
        self.format.format(created_at)
    }

    /// Whether `identifier` names an archived copy of this database
    pub fn matches(&self, identifier: &str) -> bool {
        self.pattern.is_match(identifier)
    }
}
