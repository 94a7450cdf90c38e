//! Progress evaluation against stored membership.

use super::Engine;
use crate::error::Result;
use crate::models::{Deal, Group, Member};
use crate::storage::StoreTxn;
use cohort_tiers::{evaluate, Pledge, Progress, TierLadder};
use tracing::debug;

impl Engine {
    /// Recompute a group's progress from its member rows inside `txn`.
    ///
    /// The caller must hold the group's row lock. Returns all members
    /// (including refunded ones) alongside the progress. A failed reputation
    /// lookup fails the evaluation, so the caller's transaction is dropped.
    pub(crate) fn evaluate_members(
        &self,
        txn: &StoreTxn<'_>,
        group: &Group,
        deal: &Deal,
        ladder: &TierLadder,
    ) -> Result<(Progress, Vec<Member>)> {
        let members = txn.members(group.id)?;
        let progress = self.evaluate_pledges(deal, ladder, &members)?;
        Ok((progress, members))
    }

    /// Evaluate the active members of a group.
    pub(crate) fn evaluate_pledges(
        &self,
        deal: &Deal,
        ladder: &TierLadder,
        members: &[Member],
    ) -> Result<Progress> {
        let pledges = members
            .iter()
            .filter(|m| m.is_active())
            .map(|m| {
                let level = self.reputation.level(&m.participant_id)?;
                Ok(Pledge::new(m.pledge_units, level))
            })
            .collect::<Result<Vec<Pledge>>>()?;
        Ok(evaluate(deal.counting_policy, ladder, &pledges))
    }

    /// Re-run the evaluator and refresh the cached progress of an open group.
    ///
    /// Terminal groups keep the snapshot taken at their transition; their
    /// recomputed progress is returned but not written.
    pub fn refresh_progress(&self, group_id: u64) -> Result<Progress> {
        let txn = self.storage.transaction();
        let mut group = txn.lock_group(group_id)?;
        let (deal, ladder) = self.load_deal(group.deal_id)?;
        let (progress, _) = self.evaluate_members(&txn, &group, &deal, &ladder)?;

        if group.is_open() && group.progress != progress {
            group.progress = progress;
            txn.put_group(&group)?;
            txn.commit()?;
            debug!(
                group_id,
                rank = progress.current_tier_rank,
                participants = progress.participants_count,
                "progress refreshed"
            );
        }
        Ok(progress)
    }
}
