//! Deal model - the offer template groups are formed around.

use cohort_tiers::{CountingPolicy, Tier, TierLadder};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Deal availability. Only the status changes after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DealStatus {
    Active,
    Closed,
}

impl fmt::Display for DealStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DealStatus::Active => "active",
            DealStatus::Closed => "closed",
        })
    }
}

/// A merchant offer whose discount grows with group participation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Deal {
    pub id: u64,

    pub title: String,

    /// Free-form offer type ("dining", "travel", ...)
    pub category: String,

    pub merchant_id: String,

    pub base_price: f64,

    pub counting_policy: CountingPolicy,

    /// Members required before a group may lock
    pub min_participants: u32,

    /// Window start (unix seconds, inclusive)
    pub start_at: u64,

    /// Window end (unix seconds, exclusive)
    pub end_at: u64,

    pub status: DealStatus,

    pub created_at: u64,
}

impl Deal {
    /// Whether the deal accepts new groups at `now`.
    pub fn is_live(&self, now: u64) -> bool {
        self.status == DealStatus::Active && self.start_at <= now && now < self.end_at
    }

    pub fn window_secs(&self) -> u64 {
        self.end_at.saturating_sub(self.start_at)
    }
}

/// A tier row owned by one deal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TierRule {
    pub deal_id: u64,
    #[serde(flatten)]
    pub tier: Tier,
}

/// Input for creating a deal.
#[derive(Debug, Clone, Deserialize)]
pub struct NewDeal {
    pub title: String,
    #[serde(alias = "type")]
    pub category: String,
    pub merchant_id: String,
    pub base_price: f64,
    #[serde(default)]
    pub counting_policy: CountingPolicy,
    #[serde(default = "default_min_participants")]
    pub min_participants: u32,
    pub start_at: u64,
    pub end_at: u64,
    pub tiers: Vec<Tier>,
}

fn default_min_participants() -> u32 {
    2
}

impl NewDeal {
    /// Rejects anything that would break deal invariants.
    ///
    /// A non-monotonic ladder is accepted; the caller only gets a warning.
    pub fn validate(&self) -> crate::Result<TierLadder> {
        use crate::Error::InvalidInput;

        if self.title.trim().is_empty() {
            return Err(InvalidInput("deal title is empty".into()));
        }
        if self.merchant_id.trim().is_empty() {
            return Err(InvalidInput("merchant id is empty".into()));
        }
        if !self.base_price.is_finite() || self.base_price < 0.0 {
            return Err(InvalidInput(format!("invalid base price {}", self.base_price)));
        }
        if self.min_participants == 0 {
            return Err(InvalidInput("min_participants must be at least 1".into()));
        }
        if self.end_at <= self.start_at {
            return Err(InvalidInput(format!(
                "deal window ends ({}) before it starts ({})",
                self.end_at, self.start_at
            )));
        }

        let ladder = TierLadder::new(self.tiers.clone());
        ladder.validate()?;
        if !ladder.is_monotonic() {
            tracing::warn!(
                title = %self.title,
                "tier ladder is not monotonic; highest satisfied rank will still win"
            );
        }
        Ok(ladder)
    }
}
