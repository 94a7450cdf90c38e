//! Redemption codes and signed payloads.
//!
//! Codes are `GRP-<group_id>-<8 hex>`, where the hex is a BLAKE3 keyed hash
//! of (group id, participant id). The key is derived from the node's signing
//! key, so codes are stable per node but not guessable from outside.

use super::Engine;
use crate::error::{Error, Result};
use crate::models::{
    ActivityRecord, Notification, Redemption, RedemptionClaim, RedemptionStatus, SignedPayload,
};
use ed25519_dalek::{SigningKey, VerifyingKey};
use serde::Serialize;
use tracing::info;

const CODE_KEY_CONTEXT: &str = "cohort-node redemption codes v1";

/// Hex characters kept from the code hash.
pub const CODE_HASH_HEX_LEN: usize = 8;

/// Issues codes and signs redemption payloads.
pub struct RedemptionIssuer {
    signing_key: SigningKey,
    code_key: [u8; 32],
}

impl RedemptionIssuer {
    pub fn new(signing_key: SigningKey) -> Self {
        let code_key = blake3::derive_key(CODE_KEY_CONTEXT, signing_key.as_bytes());
        Self {
            signing_key,
            code_key,
        }
    }

    /// Deterministic code for a participant in a group.
    pub fn code(&self, group_id: u64, participant_id: &str) -> String {
        let mut hasher = blake3::Hasher::new_keyed(&self.code_key);
        hasher.update(&group_id.to_be_bytes());
        hasher.update(participant_id.as_bytes());
        let digest = hex::encode(hasher.finalize().as_bytes());
        format!("GRP-{}-{}", group_id, &digest[..CODE_HASH_HEX_LEN])
    }

    pub fn sign(&self, claim: RedemptionClaim) -> Result<SignedPayload> {
        SignedPayload::sign(claim, &self.signing_key)
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }
}

/// A redemption plus whether its payload verifies against this node's key.
#[derive(Debug, Clone, Serialize)]
pub struct RedemptionView {
    pub redemption: Redemption,
    pub signature_valid: bool,
}

impl Engine {
    pub fn redemption(&self, code: &str) -> Result<RedemptionView> {
        let redemption = self
            .storage
            .get_redemption(code)?
            .ok_or_else(|| Error::RedemptionNotFound(code.to_string()))?;
        let signature_valid = serde_json::from_str::<SignedPayload>(&redemption.payload)
            .map(|payload| payload.verify(&self.issuer.verifying_key()))
            .unwrap_or(false);
        Ok(RedemptionView {
            redemption,
            signature_valid,
        })
    }

    /// Claim a redemption. A code can be redeemed once.
    pub fn redeem(&self, code: &str) -> Result<Redemption> {
        let txn = self.storage.transaction();
        let mut redemption = txn.lock_redemption(code)?;
        if redemption.status == RedemptionStatus::Redeemed {
            return Err(Error::AlreadyRedeemed(code.to_string()));
        }
        redemption.status = RedemptionStatus::Redeemed;
        redemption.redeemed_at = Some(self.now());
        txn.put_redemption(&redemption)?;
        txn.commit()?;

        info!(code, participant_id = %redemption.participant_id, "redemption claimed");
        Ok(redemption)
    }

    pub fn redemptions(&self, group_id: u64) -> Result<Vec<Redemption>> {
        self.storage.redemptions(group_id)
    }

    pub fn notifications(&self, participant_id: &str) -> Result<Vec<Notification>> {
        self.storage.notifications(participant_id)
    }

    pub fn activity(&self, participant_id: &str) -> Result<Vec<ActivityRecord>> {
        self.storage.activity(participant_id)
    }
}
