//! Settlement artifacts - written only by the lock transition.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

/// Final outcome of a locked group. Exactly one per locked group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settlement {
    pub group_id: u64,
    pub final_tier_rank: u32,
    pub final_discount_percent: f64,
    /// Whether the early-lock bonus was applied
    pub early_lock_bonus: bool,
    pub participants_count: u32,
    pub total_pledged: u64,
    pub locked_at: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedemptionStatus {
    Issued,
    Redeemed,
}

/// Per-member token issued when a group locks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Redemption {
    pub group_id: u64,
    pub participant_id: String,
    /// `GRP-<group_id>-<8 hex>`
    pub redemption_code: String,
    /// JSON-encoded [`SignedPayload`]
    pub payload: String,
    pub status: RedemptionStatus,
    pub issued_at: u64,
    pub redeemed_at: Option<u64>,
}

/// What a redemption entitles its holder to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RedemptionClaim {
    pub redemption_code: String,
    pub group_id: u64,
    pub participant_id: String,
    pub merchant_id: String,
    pub discount_percent: f64,
    pub issued_at: u64,
}

/// A claim plus the issuing node's ed25519 signature over its JSON encoding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignedPayload {
    pub claim: RedemptionClaim,
    /// Hex-encoded signature
    pub signature: String,
}

impl SignedPayload {
    pub fn sign(claim: RedemptionClaim, key: &SigningKey) -> crate::Result<Self> {
        let message = serde_json::to_vec(&claim)?;
        let signature = key.sign(&message);
        Ok(Self {
            claim,
            signature: hex::encode(signature.to_bytes()),
        })
    }

    /// Check the signature against `key`. Malformed signatures fail.
    pub fn verify(&self, key: &VerifyingKey) -> bool {
        let Ok(message) = serde_json::to_vec(&self.claim) else {
            return false;
        };
        let Ok(bytes) = hex::decode(&self.signature) else {
            return false;
        };
        let Ok(bytes) = <[u8; 64]>::try_from(bytes.as_slice()) else {
            return false;
        };
        key.verify(&message, &Signature::from_bytes(&bytes)).is_ok()
    }
}
