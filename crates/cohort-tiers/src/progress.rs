//! Progress evaluation over a group's active pledges.

use crate::ladder::{CountingPolicy, TierLadder};
use crate::reputation::{reputation_weight, ReputationLevel};

/// One active member's contribution to a group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pledge {
    pub units: u32,
    pub level: Option<ReputationLevel>,
}

impl Pledge {
    pub const fn new(units: u32, level: Option<ReputationLevel>) -> Self {
        Self { units, level }
    }
}

/// Derived state of a group at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Progress {
    pub participants_count: u32,
    pub total_pledged: u64,
    pub weighted_count: f64,
    /// 0 when no tier is satisfied.
    pub current_tier_rank: u32,
    pub current_discount_percent: f64,
}

impl Progress {
    /// The quantity compared against thresholds under `policy`.
    pub fn measure(&self, policy: CountingPolicy) -> f64 {
        match policy {
            CountingPolicy::ByCount => self.weighted_count,
            CountingPolicy::ByVolume => self.total_pledged as f64,
        }
    }

    pub fn has_tier(&self) -> bool {
        self.current_tier_rank > 0
    }
}

/// Recompute progress from scratch.
///
/// `pledges` must contain only active (pledged or confirmed) members. Nothing
/// is carried over between calls, so evaluating the same input twice always
/// gives the same answer.
pub fn evaluate(policy: CountingPolicy, ladder: &TierLadder, pledges: &[Pledge]) -> Progress {
    let mut progress = Progress {
        participants_count: pledges.len() as u32,
        total_pledged: pledges.iter().map(|p| u64::from(p.units)).sum(),
        weighted_count: pledges.iter().map(|p| reputation_weight(p.level)).sum(),
        ..Progress::default()
    };

    if let Some(tier) = ladder.highest_satisfied(progress.measure(policy)) {
        progress.current_tier_rank = tier.rank;
        progress.current_discount_percent = tier.discount_percent;
    }
    progress
}
