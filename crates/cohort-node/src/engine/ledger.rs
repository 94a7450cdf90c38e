//! Membership ledger.

use super::Engine;
use crate::error::{Error, Result};
use crate::models::{validate_participant_id, Member};
use cohort_tiers::Progress;
use tracing::info;

impl Engine {
    /// Pledge into an open group, or change an existing pledge.
    ///
    /// Re-joining overwrites the pledge and resets the member to pledged;
    /// there is never more than one row per participant. Progress is
    /// recomputed before the transaction commits and returned.
    pub fn join(
        &self,
        group_id: u64,
        participant_id: &str,
        pledge_units: Option<u32>,
    ) -> Result<Progress> {
        validate_participant_id(participant_id)?;
        let units = pledge_units.unwrap_or(1);
        if units == 0 {
            return Err(Error::InvalidInput("pledge units must be at least 1".into()));
        }

        let txn = self.storage.transaction();
        let mut group = txn.lock_group(group_id)?;
        if !group.is_open() {
            return Err(Error::GroupNotOpen {
                group_id,
                status: group.status,
            });
        }

        let member = match txn.get_member(group_id, participant_id)? {
            Some(mut existing) => {
                existing.repledge(units);
                existing
            }
            None => Member::new(group_id, participant_id.to_string(), units, self.now()),
        };
        txn.put_member(&member)?;

        let (deal, ladder) = self.load_deal(group.deal_id)?;
        let (progress, _) = self.evaluate_members(&txn, &group, &deal, &ladder)?;
        group.progress = progress;
        txn.put_group(&group)?;
        txn.commit()?;

        info!(
            group_id,
            participant_id,
            units,
            rank = progress.current_tier_rank,
            "pledge recorded"
        );
        Ok(progress)
    }
}
