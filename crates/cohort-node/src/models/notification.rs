//! Notification and activity-feed records.
//!
//! Delivery is someone else's job; these are the rows handed to the sinks.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    GroupLocked,
    GroupCancelled,
    GroupExpired,
}

impl NotificationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GroupLocked => "group_locked",
            Self::GroupCancelled => "group_cancelled",
            Self::GroupExpired => "group_expired",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub participant_id: String,
    pub group_id: u64,
    pub kind: NotificationKind,
    pub message: String,
    pub created_at: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    RedemptionIssued,
    PledgeRefunded,
}

impl ActivityAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RedemptionIssued => "redemption_issued",
            Self::PledgeRefunded => "pledge_refunded",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityRecord {
    pub participant_id: String,
    pub group_id: u64,
    pub deal_id: u64,
    pub action: ActivityAction,
    pub detail: String,
    pub created_at: u64,
}
