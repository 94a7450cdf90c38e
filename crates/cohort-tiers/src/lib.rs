//! Cohort Tier Evaluation
//!
//! Pure computation behind group deals: given the pledges in a group and the
//! deal's tier ladder, derive which discount tier the group has unlocked.
//!
//! # Counting Policies
//!
//! A deal counts progress one of two ways:
//! - `by_count` → Σ reputation weight of active members
//! - `by_volume` → Σ pledged units (reputation is ignored)
//!
//! # Tier Selection
//!
//! Every rule whose threshold is met is *satisfied*. The satisfied rule with
//! the highest rank wins, whether or not the ladder is monotonic. Nothing
//! satisfied means rank 0 and no discount.
//!
//! # Settlement
//!
//! Locking early relative to the deal's promotional window earns a flat
//! bonus on top of the unlocked discount (see [`final_discount`]).
//!
//! This crate does no I/O. Storage, locking and clocks live in `cohort-node`.

mod ladder;
mod progress;
mod reputation;
mod settlement;

pub use ladder::{CountingPolicy, LadderError, Tier, TierLadder};
pub use progress::{evaluate, Pledge, Progress};
pub use reputation::{reputation_weight, ReputationLevel, UnknownLevel};
pub use settlement::{
    early_lock_applies, final_discount, Settled, EARLY_LOCK_BONUS_POINTS,
    EARLY_LOCK_MAX_ELAPSED_FRACTION, MAX_DISCOUNT_PERCENT,
};

/// Tolerance applied when comparing a measure against a threshold.
///
/// Weighted counts are float sums, so `3 × 1.02` may land a hair under a
/// `3.06` threshold.
pub const THRESHOLD_EPSILON: f64 = 1e-9;
