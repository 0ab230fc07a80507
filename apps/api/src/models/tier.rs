use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Registration tier. Closed set: no dynamic tier creation exists, so an
/// unknown tier is a caller error caught at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    #[serde(rename = "EARLY_BIRD")]
    EarlyBird,
    #[serde(rename = "REGULAR")]
    Regular,
}

impl Tier {
    pub const ALL: [Tier; 2] = [Tier::EarlyBird, Tier::Regular];

    /// Storage form, matching the TEXT values in `tier_capacities` / `users`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::EarlyBird => "EARLY_BIRD",
            Tier::Regular => "REGULAR",
        }
    }

    /// Human-facing label used in registration error messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            Tier::EarlyBird => "Early Bird",
            Tier::Regular => "Regular",
        }
    }
}

impl FromStr for Tier {
    type Err = ();

    // Case-insensitive: the admin route receives the tier as a path segment.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "EARLY_BIRD" => Ok(Tier::EarlyBird),
            "REGULAR" => Ok(Tier::Regular),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw `tier_capacities` row.
#[derive(Debug, Clone, FromRow)]
pub struct TierCapacityRow {
    pub tier: String,
    pub capacity: i32,
    pub current_count: i32,
}

/// Capacity view with derived fields, as served to the landing page and the
/// admin console. Derived fields are computed here and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierCapacitySnapshot {
    pub tier: Tier,
    pub capacity: i32,
    pub current_count: i32,
    pub remaining: i32,
    pub progress_percent: i32,
}

impl TierCapacitySnapshot {
    pub fn new(tier: Tier, capacity: i32, current_count: i32) -> Self {
        let capacity = capacity.max(0);
        let current_count = current_count.max(0);
        let remaining = (capacity - current_count).max(0);
        // Guard the degenerate capacity = 0 row: percent is 0, never NaN.
        let progress_percent = if capacity == 0 {
            0
        } else {
            (((current_count as f64 / capacity as f64) * 100.0).round() as i32).clamp(0, 100)
        };
        TierCapacitySnapshot {
            tier,
            capacity,
            current_count,
            remaining,
            progress_percent,
        }
    }
}

/// Documented defaults served while the store is unseeded, so public capacity
/// displays are never empty.
pub fn fallback_snapshots() -> Vec<TierCapacitySnapshot> {
    vec![
        TierCapacitySnapshot::new(Tier::EarlyBird, 1000, 0),
        TierCapacitySnapshot::new(Tier::Regular, 10000, 0),
    ]
}
