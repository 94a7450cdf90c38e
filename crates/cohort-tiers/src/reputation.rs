//! Reputation levels and their counting weights.
//!
//! Levels are computed elsewhere; this crate only maps them to multipliers.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Externally assigned participant standing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ReputationLevel {
    Newbie,
    Explorer,
    Contributor,
    Expert,
    Legend,
}

impl ReputationLevel {
    pub const ALL: [ReputationLevel; 5] = [
        Self::Newbie,
        Self::Explorer,
        Self::Contributor,
        Self::Expert,
        Self::Legend,
    ];

    /// Multiplier applied to this member under `by_count`.
    pub const fn weight(self) -> f64 {
        match self {
            Self::Newbie => 1.00,
            Self::Explorer => 1.02,
            Self::Contributor => 1.05,
            Self::Expert => 1.10,
            Self::Legend => 1.20,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Newbie => "Newbie",
            Self::Explorer => "Explorer",
            Self::Contributor => "Contributor",
            Self::Expert => "Expert",
            Self::Legend => "Legend",
        }
    }
}

/// Weight for a possibly unknown level. Unknown counts as a newbie.
pub fn reputation_weight(level: Option<ReputationLevel>) -> f64 {
    level.map_or(1.0, ReputationLevel::weight)
}

impl fmt::Display for ReputationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown reputation level: {0}")]
pub struct UnknownLevel(pub String);

impl FromStr for ReputationLevel {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownLevel(s.to_string()))
    }
}
