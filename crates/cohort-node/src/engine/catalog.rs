//! Deal catalog and group creation.

use super::Engine;
use crate::error::{Error, Result};
use crate::models::{validate_participant_id, Deal, DealStatus, Group, NewDeal, TierRule};
use cohort_tiers::Tier;
use serde::Serialize;
use tracing::info;

/// A deal with its ladder in rank order.
#[derive(Debug, Clone, Serialize)]
pub struct DealView {
    pub deal: Deal,
    pub tiers: Vec<Tier>,
}

/// A deal, its ladder and its most recently created groups.
#[derive(Debug, Clone, Serialize)]
pub struct DealDetail {
    pub deal: Deal,
    pub tiers: Vec<Tier>,
    /// Newest first
    pub recent_groups: Vec<Group>,
}

impl Engine {
    /// Create a deal and its tier rows in one transaction.
    pub fn create_deal(&self, new: NewDeal) -> Result<Deal> {
        let ladder = new.validate()?;
        let now = self.now();

        let txn = self.storage.transaction();
        let deal = Deal {
            id: txn.next_id("deal")?,
            title: new.title,
            category: new.category,
            merchant_id: new.merchant_id,
            base_price: new.base_price,
            counting_policy: new.counting_policy,
            min_participants: new.min_participants,
            start_at: new.start_at,
            end_at: new.end_at,
            status: DealStatus::Active,
            created_at: now,
        };
        txn.put_deal(&deal)?;
        for tier in ladder.tiers() {
            txn.put_tier(&TierRule {
                deal_id: deal.id,
                tier: *tier,
            })?;
        }
        txn.commit()?;

        info!(
            deal_id = deal.id,
            tiers = ladder.tiers().len(),
            policy = ?deal.counting_policy,
            "deal created"
        );
        Ok(deal)
    }

    /// Stop a deal from accepting new groups. Existing groups are unaffected.
    pub fn close_deal(&self, deal_id: u64) -> Result<Deal> {
        let txn = self.storage.transaction();
        let mut deal = txn.lock_deal(deal_id)?;
        if deal.status != DealStatus::Closed {
            deal.status = DealStatus::Closed;
            txn.put_deal(&deal)?;
            txn.commit()?;
            info!(deal_id, "deal closed");
        }
        Ok(deal)
    }

    /// Deals that are active and inside their window right now.
    pub fn list_active_deals(&self) -> Result<Vec<DealView>> {
        let now = self.now();
        self.storage
            .list_deals()?
            .into_iter()
            .filter(|deal| deal.is_live(now))
            .map(|deal| {
                let tiers = self.storage.ladder(deal.id)?.tiers().to_vec();
                Ok(DealView { deal, tiers })
            })
            .collect()
    }

    pub fn deal_detail(&self, deal_id: u64) -> Result<DealDetail> {
        let (deal, ladder) = self.load_deal(deal_id)?;

        let mut recent_groups = Vec::new();
        let ids = self.storage.group_ids_for_deal(deal_id)?;
        for group_id in ids.iter().rev().take(self.recent_groups_limit) {
            if let Some(group) = self.storage.get_group(*group_id)? {
                recent_groups.push(group);
            }
        }

        Ok(DealDetail {
            deal,
            tiers: ladder.tiers().to_vec(),
            recent_groups,
        })
    }

    /// Open a new group on a live deal.
    pub fn create_group(&self, deal_id: u64, host_id: &str, expires_at: u64) -> Result<Group> {
        validate_participant_id(host_id)?;
        let now = self.now();

        let (deal, _) = self.load_deal(deal_id)?;
        if !deal.is_live(now) {
            return Err(Error::DealNotActive(deal_id));
        }
        if expires_at <= now {
            return Err(Error::InvalidInput(format!(
                "group expiry {} is not in the future",
                expires_at
            )));
        }

        let txn = self.storage.transaction();
        let group = Group::new(
            txn.next_id("group")?,
            deal_id,
            host_id.to_string(),
            Group::generate_invite_token(),
            expires_at,
            now,
        );
        txn.put_group(&group)?;
        txn.index_group(&group)?;
        txn.commit()?;

        info!(group_id = group.id, deal_id, host_id, expires_at, "group created");
        Ok(group)
    }
}
