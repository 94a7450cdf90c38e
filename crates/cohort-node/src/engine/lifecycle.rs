//! Lifecycle controller: the only writer of terminal group state.
//!
//! ```text
//!   [open] --join-->   [open]
//!   [open] --lock-->   [locked]     (+settlement, +redemption/notification/activity per member)
//!   [open] --cancel--> [cancelled]  (now <= expires_at)
//!   [open] --cancel--> [expired]    (now >  expires_at)
//! ```
//!
//! Each transition is one transaction under the group's row lock. Any error
//! drops the transaction, so no partial settlement is ever visible.

use super::Engine;
use crate::error::{Error, Result};
use crate::models::{
    ActivityAction, ActivityRecord, GroupStatus, MemberStatus, Notification, NotificationKind,
    Redemption, RedemptionClaim, RedemptionStatus, Settlement,
};
use cohort_tiers::final_discount;
use serde::Serialize;
use tracing::info;

/// A code handed to one participant at lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssuedCode {
    pub participant_id: String,
    pub redemption_code: String,
}

/// Result of locking a group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LockOutcome {
    pub group_id: u64,
    pub final_discount_percent: f64,
    pub final_tier_rank: u32,
    pub early_lock_bonus: bool,
    pub redemptions: Vec<IssuedCode>,
}

impl Engine {
    /// Lock an open group and issue its settlement artifacts exactly once.
    pub fn lock(&self, group_id: u64) -> Result<LockOutcome> {
        let txn = self.storage.transaction();
        let mut group = txn.lock_group(group_id)?;
        if !group.is_open() {
            return Err(Error::GroupNotOpen {
                group_id,
                status: group.status,
            });
        }

        let (deal, ladder) = self.load_deal(group.deal_id)?;
        let (progress, members) = self.evaluate_members(&txn, &group, &deal, &ladder)?;
        if progress.participants_count < deal.min_participants {
            return Err(Error::MinimumParticipantsNotMet {
                required: deal.min_participants,
                actual: progress.participants_count,
            });
        }

        let now = self.now();
        let settled = final_discount(
            progress.current_discount_percent,
            deal.start_at,
            deal.end_at,
            group.created_at,
            now,
        );

        group.status = GroupStatus::Locked;
        group.progress = progress;
        txn.put_group(&group)?;
        txn.put_settlement(&Settlement {
            group_id,
            final_tier_rank: progress.current_tier_rank,
            final_discount_percent: settled.discount_percent,
            early_lock_bonus: settled.early_lock_bonus,
            participants_count: progress.participants_count,
            total_pledged: progress.total_pledged,
            locked_at: now,
        })?;

        let mut issued = Vec::new();
        for member in members.iter().filter(|m| m.is_active()) {
            let participant_id = member.participant_id.clone();
            let redemption_code = self.issuer.code(group_id, &participant_id);
            let payload = self.issuer.sign(RedemptionClaim {
                redemption_code: redemption_code.clone(),
                group_id,
                participant_id: participant_id.clone(),
                merchant_id: deal.merchant_id.clone(),
                discount_percent: settled.discount_percent,
                issued_at: now,
            })?;

            txn.insert_redemption(&Redemption {
                group_id,
                participant_id: participant_id.clone(),
                redemption_code: redemption_code.clone(),
                payload: serde_json::to_string(&payload)?,
                status: RedemptionStatus::Issued,
                issued_at: now,
                redeemed_at: None,
            })?;
            txn.put_notification(&Notification {
                participant_id: participant_id.clone(),
                group_id,
                kind: NotificationKind::GroupLocked,
                message: format!(
                    "Your group for \"{}\" locked at {}% off. Code: {}",
                    deal.title, settled.discount_percent, redemption_code
                ),
                created_at: now,
            })?;
            txn.put_activity(&ActivityRecord {
                participant_id: participant_id.clone(),
                group_id,
                deal_id: deal.id,
                action: ActivityAction::RedemptionIssued,
                detail: redemption_code.clone(),
                created_at: now,
            })?;

            issued.push(IssuedCode {
                participant_id,
                redemption_code,
            });
        }

        txn.commit()?;

        info!(
            group_id,
            rank = progress.current_tier_rank,
            discount = settled.discount_percent,
            early_bonus = settled.early_lock_bonus,
            codes = issued.len(),
            "group locked"
        );
        Ok(LockOutcome {
            group_id,
            final_discount_percent: settled.discount_percent,
            final_tier_rank: progress.current_tier_rank,
            early_lock_bonus: settled.early_lock_bonus,
            redemptions: issued,
        })
    }

    /// Close an open group without settlement and refund its pledges.
    ///
    /// Past `expires_at` the group becomes `expired`, otherwise `cancelled`.
    pub fn cancel_or_expire(&self, group_id: u64) -> Result<GroupStatus> {
        let txn = self.storage.transaction();
        let mut group = txn.lock_group(group_id)?;
        if !group.is_open() {
            return Err(Error::GroupNotOpen {
                group_id,
                status: group.status,
            });
        }

        let now = self.now();
        let (status, kind) = if group.is_past_expiry(now) {
            (GroupStatus::Expired, NotificationKind::GroupExpired)
        } else {
            (GroupStatus::Cancelled, NotificationKind::GroupCancelled)
        };

        let mut refunded = 0usize;
        for mut member in txn.members(group_id)? {
            if !member.is_active() {
                continue;
            }
            member.status = MemberStatus::Refunded;
            txn.put_member(&member)?;
            txn.put_notification(&Notification {
                participant_id: member.participant_id.clone(),
                group_id,
                kind,
                message: format!("Group {} was {}; your pledge has been refunded", group_id, status),
                created_at: now,
            })?;
            txn.put_activity(&ActivityRecord {
                participant_id: member.participant_id,
                group_id,
                deal_id: group.deal_id,
                action: ActivityAction::PledgeRefunded,
                detail: format!("{} units", member.pledge_units),
                created_at: now,
            })?;
            refunded += 1;
        }

        group.status = status;
        txn.put_group(&group)?;
        txn.commit()?;

        info!(group_id, %status, refunded, "group closed without settlement");
        Ok(status)
    }
}
