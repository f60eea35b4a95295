//! Inbound half of the protocol.
//!
//! Verification runs in a fixed order: replay window, signature over the
//! verifier's own canonicalization of the payload, then exactly-once
//! application keyed by transaction id.

use crate::{
    config::{SharedSecret, SigningConfig},
    models::{ErrorCode, RewardEvent},
    services::{
        idempotency::{IdempotencyStore, Reservation, StoreError, SyncRecord, TransactionLocks},
        ledger::{LedgerError, RewardLedger},
    },
    utils::{
        canonical::{EncodingError, canonicalize},
        hmac::{InvalidSecretKey, current_timestamp, is_within_replay_window, verify_signature},
    },
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Successful verification result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// First delivery: the event was credited and recorded
    Applied(SyncRecord),
    /// The transaction id had already been applied; nothing was credited
    Duplicate(SyncRecord),
}

impl VerificationOutcome {
    pub fn record(&self) -> &SyncRecord {
        match self {
            VerificationOutcome::Applied(record) | VerificationOutcome::Duplicate(record) => record,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("request timestamp is {skew_seconds}s away from server time (max {max_skew_seconds}s)")]
    ReplayWindowExceeded {
        skew_seconds: u64,
        max_skew_seconds: u64,
    },

    #[error("signature does not match payload")]
    SignatureMismatch,

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Rejected(#[from] LedgerError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("transaction {0} is pending and cannot be applied now")]
    Pending(String),

    #[error(transparent)]
    Key(#[from] InvalidSecretKey),

    #[error("system clock is before the Unix epoch")]
    Clock,
}

impl VerificationError {
    /// Wire error code, or `None` for failures of the verifier itself
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            VerificationError::ReplayWindowExceeded { .. } => Some(ErrorCode::ReplayWindowExceeded),
            VerificationError::SignatureMismatch => Some(ErrorCode::SignatureMismatch),
            VerificationError::Encoding(_) => Some(ErrorCode::EncodingError),
            VerificationError::Rejected(err) if err.is_business_rejection() => {
                Some(ErrorCode::BusinessRejection)
            }
            _ => None,
        }
    }
}

/// Authenticates inbound sync requests and applies them at most once
pub struct Verifier {
    secret: SharedSecret,
    max_skew_seconds: u64,
    store: Arc<dyn IdempotencyStore>,
    ledger: Arc<dyn RewardLedger>,
    locks: TransactionLocks,
}

impl Verifier {
    pub fn new(
        config: &SigningConfig,
        store: Arc<dyn IdempotencyStore>,
        ledger: Arc<dyn RewardLedger>,
    ) -> Self {
        Self {
            secret: config.secret.clone(),
            max_skew_seconds: config.max_skew_seconds,
            store,
            ledger,
            locks: TransactionLocks::new(),
        }
    }

    /// Check freshness and signature without touching any state
    pub fn authenticate(
        &self,
        event: &RewardEvent,
        timestamp: u64,
        signature: &str,
        now: u64,
    ) -> Result<(), VerificationError> {
        if !is_within_replay_window(now, timestamp, self.max_skew_seconds) {
            return Err(VerificationError::ReplayWindowExceeded {
                skew_seconds: now.abs_diff(timestamp),
                max_skew_seconds: self.max_skew_seconds,
            });
        }

        let canonical = canonicalize(event)?;
        if !verify_signature(self.secret.as_bytes(), &canonical, timestamp, signature)? {
            return Err(VerificationError::SignatureMismatch);
        }

        Ok(())
    }

    /// Authenticate against the current clock, then apply
    pub async fn verify_and_apply(
        &self,
        event: &RewardEvent,
        timestamp: u64,
        signature: &str,
    ) -> Result<VerificationOutcome, VerificationError> {
        let now = current_timestamp().map_err(|_| VerificationError::Clock)?;
        self.verify_and_apply_at(event, timestamp, signature, now).await
    }

    /// Authenticate as of `now`, then apply
    pub async fn verify_and_apply_at(
        &self,
        event: &RewardEvent,
        timestamp: u64,
        signature: &str,
        now: u64,
    ) -> Result<VerificationOutcome, VerificationError> {
        self.authenticate(event, timestamp, signature, now)?;
        self.apply_once(event).await
    }

    /// Reserve the id, credit, then record. A failure after crediting leaves
    /// the id pending so it can never be credited a second time.
    async fn apply_once(&self, event: &RewardEvent) -> Result<VerificationOutcome, VerificationError> {
        let transaction_id = event.transaction_id.as_str();
        let _guard = self.locks.acquire(transaction_id).await;

        match self.store.reserve(transaction_id).await? {
            Reservation::Reserved => {}
            Reservation::Applied(existing) => {
                debug!(
                    transaction_id = %transaction_id,
                    "Transaction already applied, returning recorded result"
                );
                return Ok(VerificationOutcome::Duplicate(existing));
            }
            Reservation::Pending => {
                warn!(
                    transaction_id = %transaction_id,
                    "Transaction is pending in the idempotency store, refusing to credit"
                );
                return Err(VerificationError::Pending(transaction_id.to_string()));
            }
        }

        let new_balance = match self.ledger.credit(event).await {
            Ok(balance) => balance,
            Err(err) => {
                if let Err(release_err) = self.store.release(transaction_id).await {
                    error!(
                        transaction_id = %transaction_id,
                        error = %release_err,
                        "Could not release reservation of uncredited transaction"
                    );
                }
                return Err(err.into());
            }
        };

        let record = SyncRecord::new(event, new_balance, Utc::now());
        if let Err(err) = self.store.complete(record.clone()).await {
            error!(
                transaction_id = %transaction_id,
                subject_id = %event.subject_id,
                new_balance,
                error = %err,
                "Transaction credited but not recorded; it stays pending"
            );
            return Err(err.into());
        }

        Ok(VerificationOutcome::Applied(record))
    }
}
