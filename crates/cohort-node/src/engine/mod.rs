//! Group lifecycle and tiered-settlement engine.
//!
//! Every operation is synchronous and runs in its own storage transaction.
//! Operations that touch a group take that group's row lock first, so
//! `join`, `lock`, `cancel_or_expire` and progress refreshes on one group are
//! linearized. Call from async code through `spawn_blocking`.
//!
//! | Module | Role |
//! |---|---|
//! | `catalog` | deals, tiers, group creation |
//! | `ledger` | pledges (join / re-pledge) |
//! | `progress` | evaluator refresh of the cached progress |
//! | `lifecycle` | lock, cancel / expire |
//! | `registry` | read-side status assembly |
//! | `redemption` | code issuance, payload signing, redeem |

mod catalog;
mod ledger;
mod lifecycle;
mod progress;
mod redemption;
mod registry;

#[cfg(test)]
mod tests;

pub use catalog::{DealDetail, DealView};
pub use lifecycle::{IssuedCode, LockOutcome};
pub use redemption::{RedemptionIssuer, RedemptionView};
pub use registry::GroupStatusView;

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::models::Deal;
use crate::reputation::ReputationLookup;
use crate::storage::Storage;
use cohort_tiers::TierLadder;
use std::sync::Arc;

/// Groups returned with a deal detail unless configured otherwise.
pub const DEFAULT_RECENT_GROUPS: usize = 10;

/// The lifecycle engine. Cheap to share behind an `Arc`.
pub struct Engine {
    storage: Arc<Storage>,
    reputation: Arc<dyn ReputationLookup>,
    clock: Arc<dyn Clock>,
    issuer: RedemptionIssuer,
    recent_groups_limit: usize,
}

impl Engine {
    /// Build an engine; the node's signing key becomes the redemption secret.
    pub fn new(
        storage: Arc<Storage>,
        reputation: Arc<dyn ReputationLookup>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let issuer = RedemptionIssuer::new(storage.get_or_create_node_key()?);
        Ok(Self {
            storage,
            reputation,
            clock,
            issuer,
            recent_groups_limit: DEFAULT_RECENT_GROUPS,
        })
    }

    pub fn with_recent_groups_limit(mut self, limit: usize) -> Self {
        self.recent_groups_limit = limit;
        self
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    pub fn issuer(&self) -> &RedemptionIssuer {
        &self.issuer
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// A deal and its ladder. Both are immutable apart from deal status.
    fn load_deal(&self, deal_id: u64) -> Result<(Deal, TierLadder)> {
        let deal = self
            .storage
            .get_deal(deal_id)?
            .ok_or(Error::DealNotFound(deal_id))?;
        let ladder = self.storage.ladder(deal_id)?;
        Ok((deal, ladder))
    }
}
