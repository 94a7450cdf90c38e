//! Final discount computation at lock time.
//!
//! The early-lock bonus measures how fast a group formed against the *deal's*
//! promotional window, not against the group's own expiry:
//!
//! ```text
//! elapsed  = now - group_created_at
//! window   = deal_end - deal_start
//! bonus    = +2 points  iff  discount > 0  and  elapsed / window <= 0.25
//! ```

/// Points added when the early-lock condition holds.
pub const EARLY_LOCK_BONUS_POINTS: f64 = 2.0;

/// Largest fraction of the deal window that still counts as early.
pub const EARLY_LOCK_MAX_ELAPSED_FRACTION: f64 = 0.25;

/// Settled discounts never exceed this.
pub const MAX_DISCOUNT_PERCENT: f64 = 100.0;

/// Outcome of settling a group's discount.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settled {
    pub discount_percent: f64,
    pub early_lock_bonus: bool,
}

/// Whether a group created at `group_created_at` and locked at `now` earns the bonus.
///
/// All times are unix seconds. A degenerate window (end ≤ start) never earns it.
pub fn early_lock_applies(
    current_discount_percent: f64,
    deal_start: u64,
    deal_end: u64,
    group_created_at: u64,
    now: u64,
) -> bool {
    if current_discount_percent <= 0.0 || deal_end <= deal_start {
        return false;
    }
    let window = (deal_end - deal_start) as f64;
    let elapsed = now.saturating_sub(group_created_at) as f64;
    elapsed / window <= EARLY_LOCK_MAX_ELAPSED_FRACTION
}

/// Apply the early-lock bonus to the currently unlocked discount.
pub fn final_discount(
    current_discount_percent: f64,
    deal_start: u64,
    deal_end: u64,
    group_created_at: u64,
    now: u64,
) -> Settled {
    let early = early_lock_applies(
        current_discount_percent,
        deal_start,
        deal_end,
        group_created_at,
        now,
    );
    let discount_percent = if early {
        (current_discount_percent + EARLY_LOCK_BONUS_POINTS).min(MAX_DISCOUNT_PERCENT)
    } else {
        current_discount_percent
    };
    Settled {
        discount_percent,
        early_lock_bonus: early,
    }
}
