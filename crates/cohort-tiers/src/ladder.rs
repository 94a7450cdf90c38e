//! Tier ladders and counting policies.

use crate::THRESHOLD_EPSILON;
use std::collections::HashSet;
use thiserror::Error;

/// What a deal counts toward its thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CountingPolicy {
    /// Reputation-weighted member count.
    #[default]
    ByCount,
    /// Total pledged units.
    ByVolume,
}

/// One rung of a ladder: reaching `threshold` unlocks `discount_percent`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tier {
    pub rank: u32,
    pub threshold: f64,
    pub discount_percent: f64,
}

impl Tier {
    pub const fn new(rank: u32, threshold: f64, discount_percent: f64) -> Self {
        Self {
            rank,
            threshold,
            discount_percent,
        }
    }

    /// Whether `measure` reaches this tier's threshold.
    pub fn is_satisfied_by(&self, measure: f64) -> bool {
        measure + THRESHOLD_EPSILON >= self.threshold
    }
}

/// Ladder rejected at deal creation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LadderError {
    #[error("tier ladder is empty")]
    Empty,

    #[error("tier rank must be positive")]
    ZeroRank,

    #[error("duplicate tier rank {0}")]
    DuplicateRank(u32),

    #[error("tier {rank}: threshold must be a positive number, got {threshold}")]
    InvalidThreshold { rank: u32, threshold: f64 },

    #[error("tier {rank}: discount must be within 0..=100, got {discount}")]
    InvalidDiscount { rank: u32, discount: f64 },
}

/// Tiers of a deal, kept sorted by rank.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TierLadder {
    tiers: Vec<Tier>,
}

impl TierLadder {
    pub fn new(mut tiers: Vec<Tier>) -> Self {
        tiers.sort_by_key(|t| t.rank);
        Self { tiers }
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// Check the structural rules every ladder must satisfy.
    ///
    /// Monotonicity is deliberately not part of this; see [`Self::is_monotonic`].
    pub fn validate(&self) -> Result<(), LadderError> {
        if self.tiers.is_empty() {
            return Err(LadderError::Empty);
        }

        let mut seen = HashSet::new();
        for tier in &self.tiers {
            if tier.rank == 0 {
                return Err(LadderError::ZeroRank);
            }
            if !seen.insert(tier.rank) {
                return Err(LadderError::DuplicateRank(tier.rank));
            }
            if !tier.threshold.is_finite() || tier.threshold <= 0.0 {
                return Err(LadderError::InvalidThreshold {
                    rank: tier.rank,
                    threshold: tier.threshold,
                });
            }
            if !(0.0..=100.0).contains(&tier.discount_percent) {
                return Err(LadderError::InvalidDiscount {
                    rank: tier.rank,
                    discount: tier.discount_percent,
                });
            }
        }
        Ok(())
    }

    /// True when thresholds and discounts never decrease as rank grows.
    pub fn is_monotonic(&self) -> bool {
        self.tiers.windows(2).all(|w| {
            w[1].threshold >= w[0].threshold && w[1].discount_percent >= w[0].discount_percent
        })
    }

    /// The satisfied tier with the highest rank.
    pub fn highest_satisfied(&self, measure: f64) -> Option<&Tier> {
        self.tiers
            .iter()
            .rev()
            .find(|t| t.is_satisfied_by(measure))
    }

    /// Lowest-ranked tier above `current_rank` that `measure` has not reached.
    pub fn next_unmet(&self, measure: f64, current_rank: u32) -> Option<&Tier> {
        self.tiers
            .iter()
            .find(|t| t.rank > current_rank && !t.is_satisfied_by(measure))
    }
}

impl FromIterator<Tier> for TierLadder {
    fn from_iter<I: IntoIterator<Item = Tier>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
