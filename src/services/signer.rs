//! Outbound half of the protocol: canonicalize, timestamp and sign an event.

use crate::{
    config::{SharedSecret, SigningConfig},
    models::{RewardEvent, SignedEnvelope},
    utils::{
        canonical::{EncodingError, canonicalize},
        hmac::{InvalidSecretKey, current_timestamp, generate_signature},
    },
};

#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Key(#[from] InvalidSecretKey),

    #[error("system clock is before the Unix epoch")]
    Clock,
}

/// Signs reward events with the issuer's copy of the shared secret
#[derive(Debug, Clone)]
pub struct Signer {
    secret: SharedSecret,
}

impl Signer {
    pub fn new(secret: SharedSecret) -> Self {
        Self { secret }
    }

    pub fn from_config(config: &SigningConfig) -> Self {
        Self::new(config.secret.clone())
    }

    /// Sign `event` with the current time
    pub fn sign(&self, event: RewardEvent) -> Result<SignedEnvelope, SigningError> {
        let timestamp = current_timestamp().map_err(|_| SigningError::Clock)?;
        self.sign_at(event, timestamp)
    }

    /// Sign `event` as of `timestamp` (seconds since the Unix epoch)
    pub fn sign_at(&self, event: RewardEvent, timestamp: u64) -> Result<SignedEnvelope, SigningError> {
        let canonical = canonicalize(&event)?;
        let signature = generate_signature(self.secret.as_bytes(), &canonical, timestamp)?;

        Ok(SignedEnvelope {
            payload: event,
            timestamp,
            signature,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::canonical::MAX_CANONICAL_QUANTITY;

    fn signer() -> Signer {
        Signer::new(SharedSecret::new("k").unwrap())
    }

    #[test]
    fn test_sign_at_is_deterministic() {
        let event = RewardEvent::with_transaction_id("t-1", "0xabc", 10, "wellness_journal_entry");
        let first = signer().sign_at(event.clone(), 1_700_000_000).unwrap();
        let second = signer().sign_at(event.clone(), 1_700_000_000).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.payload, event);
        assert_eq!(first.timestamp, 1_700_000_000);
        assert_eq!(first.signature.len(), 64);
    }

    #[test]
    fn test_signature_depends_on_timestamp_and_secret() {
        let event = RewardEvent::with_transaction_id("t-1", "0xabc", 10, "wellness_journal_entry");
        let base = signer().sign_at(event.clone(), 1_700_000_000).unwrap();
        let later = signer().sign_at(event.clone(), 1_700_000_001).unwrap();
        let other_key = Signer::new(SharedSecret::new("K").unwrap())
            .sign_at(event, 1_700_000_000)
            .unwrap();

        assert_ne!(base.signature, later.signature);
        assert_ne!(base.signature, other_key.signature);
    }

    #[test]
    fn test_sign_uses_current_time() {
        let before = current_timestamp().unwrap();
        let envelope = signer().sign(RewardEvent::new("0xabc", 1, "test")).unwrap();
        let after = current_timestamp().unwrap();
        assert!(envelope.timestamp >= before && envelope.timestamp <= after);
    }

    #[test]
    fn test_unrepresentable_quantity_is_an_encoding_error() {
        let event = RewardEvent::new("0xabc", MAX_CANONICAL_QUANTITY + 1, "test");
        let err = signer().sign_at(event, 1_700_000_000).unwrap_err();
        assert!(matches!(err, SigningError::Encoding(EncodingError::QuantityOutOfRange(_))));
    }
}
