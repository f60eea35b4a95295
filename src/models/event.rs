//! The reward event relayed from the issuer to the commerce platform, and
//! the signed envelope that carries it over the wire.

use paperclip::actix::Apiv2Schema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Action type attached to rewards minted from a verified journal proof
pub const WELLNESS_JOURNAL_ENTRY: &str = "wellness_journal_entry";

/// One reward-earning event.
///
/// `transaction_id` is the idempotency key. It is generated once per sync
/// attempt and carries no business meaning; retries of the same attempt must
/// reuse it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Apiv2Schema)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RewardEvent {
    /// Idempotency key, opaque to both sides
    pub transaction_id: String,
    /// Actor identifier (e.g. a wallet address), never parsed by the signer
    pub subject_id: String,
    /// Reward units earned
    pub quantity: u64,
    /// Why the reward was earned (e.g. "wellness_journal_entry")
    pub action_type: String,
}

impl RewardEvent {
    /// Create an event with a freshly generated transaction id
    pub fn new(
        subject_id: impl Into<String>,
        quantity: u64,
        action_type: impl Into<String>,
    ) -> Self {
        Self::with_transaction_id(Uuid::new_v4().to_string(), subject_id, quantity, action_type)
    }

    /// Create an event with a caller-supplied transaction id
    pub fn with_transaction_id(
        transaction_id: impl Into<String>,
        subject_id: impl Into<String>,
        quantity: u64,
        action_type: impl Into<String>,
    ) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            subject_id: subject_id.into(),
            quantity,
            action_type: action_type.into(),
        }
    }
}

/// An event bound to a point in time by an HMAC signature.
///
/// Only `timestamp` and `signature` change when an envelope is re-signed for
/// a retry; the payload, and with it the transaction id, stays fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedEnvelope {
    pub payload: RewardEvent,
    /// Seconds since the Unix epoch at signing time
    pub timestamp: u64,
    /// Lowercase hex HMAC-SHA256 over `"{timestamp}.{canonical payload}"`
    pub signature: String,
}
