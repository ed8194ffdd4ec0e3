//! Age tiers: how far apart kept artifacts may be, by artifact age.

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// One rule of the tier table.
///
/// Artifacts at most `max_age_days` old must not be more than
/// `required_gap_days` away from their nearest older kept neighbour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeTier {
    /// Upper bound (inclusive) on artifact age for this tier.
    pub max_age_days: u32,
    /// Largest gap allowed for artifacts in this tier.
    pub required_gap_days: u32,
}

impl AgeTier {
    pub const fn new(max_age_days: u32, required_gap_days: u32) -> Self {
        Self {
            max_age_days,
            required_gap_days,
        }
    }
}

/// Ordered age tier table plus the gap used past the last tier.
///
/// Tiers are held sorted by ascending `max_age_days` so lookups can stop at
/// the first match, whatever order the caller supplied them in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "AgeTierTableRepr")]
pub struct AgeTierTable {
    tiers: Vec<AgeTier>,
    default_gap_days: u32,
}

#[derive(Deserialize)]
struct AgeTierTableRepr {
    #[serde(default)]
    tiers: Vec<AgeTier>,
    default_gap_days: u32,
}

impl From<AgeTierTableRepr> for AgeTierTable {
    fn from(repr: AgeTierTableRepr) -> Self {
        Self::new(repr.tiers, repr.default_gap_days)
    }
}

/// Tiers used by the snapshot archiver: daily for a week, weekly for a
/// month, monthly for a year.
pub const DEFAULT_TIERS: [AgeTier; 3] = [
    AgeTier::new(7, 1),
    AgeTier::new(30, 7),
    AgeTier::new(365, 30),
];

/// Gap applied to artifacts older than every tier.
pub const DEFAULT_GAP_DAYS: u32 = 90;

impl Default for AgeTierTable {
    fn default() -> Self {
        Self::new(DEFAULT_TIERS.to_vec(), DEFAULT_GAP_DAYS)
    }
}

impl AgeTierTable {
    /// Build a table. Tiers are sorted by `max_age_days`; the sort is stable,
    /// so among tiers sharing a bound the first one supplied wins.
    pub fn new(mut tiers: Vec<AgeTier>, default_gap_days: u32) -> Self {
        tiers.sort_by_key(|t| t.max_age_days);
        Self {
            tiers,
            default_gap_days,
        }
    }

    /// Tiers in lookup order.
    pub fn tiers(&self) -> &[AgeTier] {
        &self.tiers
    }

    pub fn default_gap_days(&self) -> u32 {
        self.default_gap_days
    }

    /// Largest gap allowed for an artifact of the given age.
    ///
    /// `age` is expected to be non-negative; callers reject future
    /// timestamps before looking anything up. A negative age falls into the
    /// first tier.
    pub fn required_gap(&self, age: Duration) -> Duration {
        let gap_days = self
            .tiers
            .iter()
            .find(|tier| age <= Duration::days(i64::from(tier.max_age_days)))
            .map(|tier| tier.required_gap_days)
            .unwrap_or(self.default_gap_days);
        Duration::days(i64::from(gap_days))
    }
}
