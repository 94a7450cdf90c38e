//! Group model - one time-boxed gathering around a deal.

use cohort_tiers::Progress;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state. Everything except `Open` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    Open,
    Locked,
    Cancelled,
    Expired,
}

impl GroupStatus {
    pub fn is_terminal(self) -> bool {
        self != GroupStatus::Open
    }
}

impl fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GroupStatus::Open => "open",
            GroupStatus::Locked => "locked",
            GroupStatus::Cancelled => "cancelled",
            GroupStatus::Expired => "expired",
        })
    }
}

/// A group instance of a deal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Group {
    pub id: u64,

    pub deal_id: u64,

    /// Participant who opened the group
    pub host_id: String,

    /// Opaque token shared to invite others
    pub invite_token: String,

    pub status: GroupStatus,

    /// Unix seconds after which the sweeper settles the group
    pub expires_at: u64,

    pub created_at: u64,

    /// Last evaluated progress. Written only by the evaluator refresh and
    /// the lock transition; readers that need truth recompute.
    #[serde(default)]
    pub progress: Progress,
}

impl Group {
    pub fn new(id: u64, deal_id: u64, host_id: String, invite_token: String, expires_at: u64, now: u64) -> Self {
        Self {
            id,
            deal_id,
            host_id,
            invite_token,
            status: GroupStatus::Open,
            expires_at,
            created_at: now,
            progress: Progress::default(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == GroupStatus::Open
    }

    /// Seconds until expiry, never negative.
    pub fn time_left(&self, now: u64) -> u64 {
        self.expires_at.saturating_sub(now)
    }

    pub fn is_past_expiry(&self, now: u64) -> bool {
        now > self.expires_at
    }

    /// Random invite token (128 bits, hex).
    pub fn generate_invite_token() -> String {
        let bytes: [u8; 16] = rand::random();
        hex::encode(bytes)
    }
}
