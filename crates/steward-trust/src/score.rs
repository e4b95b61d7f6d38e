use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Score assigned to an agent on first registration.
pub const INITIAL_TRUST: f64 = 0.4;
/// Scores at or above this value are graduated.
pub const GRADUATION_THRESHOLD: f64 = 0.6;

/// Scores are held as integer millionths so that repeated deltas sum exactly.
pub(crate) const SCALE: i64 = 1_000_000;

pub(crate) fn to_units(value: f64) -> i64 {
    (value * SCALE as f64).round() as i64
}

pub(crate) fn from_units(units: i64) -> f64 {
    units as f64 / SCALE as f64
}

/// Snapshot of one agent's trust score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustScore {
    /// Agent the score belongs to.
    pub agent_id: String,
    /// Current score, always within `[0, 1]`.
    pub value: f64,
    /// Whether `value` is at or above [`GRADUATION_THRESHOLD`].
    pub graduated: bool,
    /// Time of the last update.
    pub updated_at: DateTime<Utc>,
}

impl TrustScore {
    pub(crate) fn from_units(agent_id: &str, units: i64, updated_at: DateTime<Utc>) -> Self {
        let units = units.clamp(0, SCALE);
        Self {
            agent_id: agent_id.to_string(),
            value: from_units(units),
            graduated: units >= to_units(GRADUATION_THRESHOLD),
            updated_at,
        }
    }

    /// A fresh score at [`INITIAL_TRUST`].
    pub fn initial(agent_id: &str) -> Self {
        Self::from_units(agent_id, to_units(INITIAL_TRUST), Utc::now())
    }

    pub(crate) fn units(&self) -> i64 {
        to_units(self.value).clamp(0, SCALE)
    }
}
