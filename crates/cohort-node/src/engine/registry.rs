//! Read-side assembly of group state.

use super::Engine;
use crate::error::{Error, Result};
use crate::models::{Group, Member, Settlement};
use cohort_tiers::{Progress, Tier};
use serde::Serialize;

/// Everything a client needs to render one group.
#[derive(Debug, Clone, Serialize)]
pub struct GroupStatusView {
    pub group: Group,
    pub tiers: Vec<Tier>,
    pub members: Vec<Member>,
    /// Recomputed for this read; `group.progress` is the cached value
    pub progress: Progress,
    /// Lowest-ranked tier above the current one that is not yet reached
    pub next_tier: Option<Tier>,
    pub time_left_seconds: u64,
    pub settlement: Option<Settlement>,
}

impl Engine {
    /// Group status with freshly evaluated progress.
    ///
    /// A plain read: no row lock is taken and the cached progress is left
    /// alone, so status polling never queues behind joins. Only writers
    /// refresh the cache.
    pub fn group_status(&self, group_id: u64) -> Result<GroupStatusView> {
        let group = self
            .storage
            .get_group(group_id)?
            .ok_or_else(|| Error::group_not_found(group_id))?;
        let (deal, ladder) = self.load_deal(group.deal_id)?;
        let members = self.storage.members(group_id)?;
        let progress = self.evaluate_pledges(&deal, &ladder, &members)?;

        let next_tier = ladder
            .next_unmet(progress.measure(deal.counting_policy), progress.current_tier_rank)
            .copied();
        let settlement = self.storage.get_settlement(group_id)?;

        Ok(GroupStatusView {
            time_left_seconds: group.time_left(self.now()),
            group,
            tiers: ladder.tiers().to_vec(),
            members,
            progress,
            next_tier,
            settlement,
        })
    }

    /// Resolve an invite token to its group's status.
    pub fn group_by_invite(&self, token: &str) -> Result<GroupStatusView> {
        let group_id = self
            .storage
            .group_id_by_invite(token)?
            .ok_or_else(|| Error::GroupNotFound(format!("with invite {}", token)))?;
        self.group_status(group_id)
    }
}
