//! Dated artifacts and the identifier formats that carry their dates.

use chrono::format::{self, Item, ParseResult, Parsed, StrftimeItems};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RetentionError;

/// A retention candidate: an identifier and the instant it represents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatedArtifact {
    pub id: String,
    pub timestamp: DateTime<Utc>,
}

impl DatedArtifact {
    pub fn new(id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            timestamp,
        }
    }
}

/// Turns an identifier into the timestamp embedded in it.
pub trait TimestampParser {
    fn parse_timestamp(&self, id: &str) -> Result<DateTime<Utc>, RetentionError>;
}

impl<F> TimestampParser for F
where
    F: Fn(&str) -> Result<DateTime<Utc>, RetentionError>,
{
    fn parse_timestamp(&self, id: &str) -> Result<DateTime<Utc>, RetentionError> {
        self(id)
    }
}

/// A strftime-style identifier pattern such as `db-archived-%Y-%m-%d`.
///
/// Identifiers are interpreted as UTC unless the pattern carries an offset.
/// Fields the pattern leaves out take strptime's defaults: midnight for the
/// time, the first for the day, January for the month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifierFormat {
    pattern: String,
}

impl IdentifierFormat {
    /// Validate and wrap a strftime pattern.
    pub fn new(pattern: impl Into<String>) -> Result<Self, RetentionError> {
        let pattern = pattern.into();
        if StrftimeItems::new(&pattern).any(|item| matches!(item, Item::Error)) {
            return Err(RetentionError::InvalidFormat(pattern));
        }
        Ok(Self { pattern })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Render the identifier for a timestamp.
    pub fn format(&self, timestamp: &DateTime<Utc>) -> String {
        timestamp.format(&self.pattern).to_string()
    }

    /// Parse an identifier back into its timestamp.
    pub fn parse(&self, id: &str) -> Result<DateTime<Utc>, RetentionError> {
        parse_with_defaults(id, &self.pattern).map_err(|_| RetentionError::UnparsableIdentifier {
            id: id.to_string(),
            format: self.pattern.clone(),
        })
    }
}

fn parse_with_defaults(id: &str, pattern: &str) -> ParseResult<DateTime<Utc>> {
    let mut parsed = Parsed::new();
    format::parse(&mut parsed, id, StrftimeItems::new(pattern))?;
    fill_missing_fields(&mut parsed)?;

    match parsed.offset {
        Some(_) => parsed.to_datetime().map(|t| t.with_timezone(&Utc)),
        None => parsed.to_naive_datetime_with_offset(0).map(|n| n.and_utc()),
    }
}

/// Default the fields an identifier pattern did not set, as strptime does.
fn fill_missing_fields(parsed: &mut Parsed) -> ParseResult<()> {
    if parsed.timestamp.is_some() {
        return Ok(());
    }

    let has_year = parsed.year.is_some()
        || parsed.year_div_100.is_some()
        || parsed.year_mod_100.is_some()
        || parsed.isoyear.is_some()
        || parsed.isoyear_mod_100.is_some();
    if !has_year {
        parsed.set_year(1900)?;
    }

    let week_or_ordinal = parsed.ordinal.is_some()
        || parsed.week_from_sun.is_some()
        || parsed.week_from_mon.is_some()
        || parsed.isoweek.is_some();
    if !week_or_ordinal {
        if parsed.month.is_none() {
            parsed.set_month(1)?;
        }
        if parsed.day.is_none() {
            parsed.set_day(1)?;
        }
    }

    match (parsed.hour_div_12, parsed.hour_mod_12) {
        (None, None) => parsed.set_hour(0)?,
        // %I without %p reads as AM
        (None, Some(_)) => parsed.set_ampm(false)?,
        _ => {}
    }
    if parsed.minute.is_none() {
        parsed.set_minute(0)?;
    }
    if parsed.second.is_none() {
        parsed.set_second(0)?;
    }
    Ok(())
}

impl TimestampParser for IdentifierFormat {
    fn parse_timestamp(&self, id: &str) -> Result<DateTime<Utc>, RetentionError> {
        self.parse(id)
    }
}
