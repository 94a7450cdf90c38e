//! Reputation lookup capability.
//!
//! Scores are computed by another system; the engine only needs a level per
//! participant, or nothing when the participant is unknown. A failed lookup
//! is an error, never an unknown participant.

use crate::error::Result;
use crate::storage::Storage;
use cohort_tiers::ReputationLevel;
use std::collections::HashMap;
use std::sync::Arc;

pub trait ReputationLookup: Send + Sync {
    /// `Ok(None)` means unknown, which weighs the same as a newbie.
    fn level(&self, participant_id: &str) -> Result<Option<ReputationLevel>>;
}

/// Levels recorded in node storage (set through the admin socket).
pub struct StoredReputation {
    storage: Arc<Storage>,
}

impl StoredReputation {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }
}

impl ReputationLookup for StoredReputation {
    fn level(&self, participant_id: &str) -> Result<Option<ReputationLevel>> {
        self.storage.get_reputation(participant_id)
    }
}

impl ReputationLookup for HashMap<String, ReputationLevel> {
    fn level(&self, participant_id: &str) -> Result<Option<ReputationLevel>> {
        Ok(self.get(participant_id).copied())
    }
}
