//! Member model - a participant's pledge into a group.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    Pledged,
    Confirmed,
    Refunded,
}

/// One row per (group, participant).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Member {
    pub group_id: u64,
    pub participant_id: String,
    pub pledge_units: u32,
    pub status: MemberStatus,
    pub joined_at: u64,
}

impl Member {
    pub fn new(group_id: u64, participant_id: String, pledge_units: u32, now: u64) -> Self {
        Self {
            group_id,
            participant_id,
            pledge_units,
            status: MemberStatus::Pledged,
            joined_at: now,
        }
    }

    /// Pledged and confirmed members count toward progress.
    pub fn is_active(&self) -> bool {
        matches!(self.status, MemberStatus::Pledged | MemberStatus::Confirmed)
    }

    /// Re-pledge: take the new amount and go back to pledged.
    pub fn repledge(&mut self, pledge_units: u32) {
        self.pledge_units = pledge_units;
        self.status = MemberStatus::Pledged;
    }
}
