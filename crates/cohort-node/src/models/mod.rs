//! Records persisted by a Cohort node.
//!
//! # Catalog
//!
//! - [`Deal`] - offer template with a counting policy and active window
//! - [`TierRule`] - one rung of a deal's ladder
//!
//! # Groups
//!
//! - [`Group`] - time-boxed instance of a deal, with cached progress
//! - [`Member`] - one participant's pledge into a group
//!
//! # Settlement artifacts
//!
//! - [`Settlement`] - final discount, written once when a group locks
//! - [`Redemption`] - per-member code issued at lock
//! - [`Notification`], [`ActivityRecord`] - records for downstream sinks

mod deal;
mod group;
mod member;
mod notification;
mod settlement;

pub use deal::{Deal, DealStatus, NewDeal, TierRule};
pub use group::{Group, GroupStatus};
pub use member::{Member, MemberStatus};
pub use notification::{ActivityAction, ActivityRecord, Notification, NotificationKind};
pub use settlement::{Redemption, RedemptionClaim, RedemptionStatus, Settlement, SignedPayload};

/// Participant and host ids become part of storage keys.
pub fn validate_participant_id(id: &str) -> crate::Result<()> {
    if id.trim().is_empty() {
        return Err(crate::Error::InvalidInput("participant id is empty".into()));
    }
    if id.contains(':') {
        return Err(crate::Error::InvalidInput(format!(
            "participant id {:?} must not contain ':'",
            id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn participant_ids() {
        assert!(validate_participant_id("alice").is_ok());
        assert!(validate_participant_id("  ").is_err());
        assert!(validate_participant_id("a:b").is_err());
    }
}
