//! Reward crediting on the commerce side.
//!
//! The real crediting logic belongs to the commerce platform; the
//! [`RewardLedger`] trait is the seam the verifier applies events through.
//! [`InMemoryRewardLedger`] is a reference implementation keeping balances
//! per linked wallet.

use crate::models::RewardEvent;
use async_trait::async_trait;
use regex::Regex;
use std::{collections::HashMap, sync::RwLock};

/// Reasons the commerce side refuses an authenticated event
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Wallet not found. Has the user linked their identity?")]
    UnknownSubject(String),

    #[error("malformed subjectId")]
    InvalidSubject,

    #[error("malformed actionType")]
    InvalidActionType,

    #[error("balance overflow for {0}")]
    BalanceOverflow(String),

    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

impl LedgerError {
    /// Whether the error is a business decision about the event, as opposed
    /// to an infrastructure failure of the ledger itself
    pub fn is_business_rejection(&self) -> bool {
        !matches!(self, LedgerError::Unavailable(_))
    }
}

/// Side-effecting half of the verifier: credit an already authenticated event
#[async_trait]
pub trait RewardLedger: Send + Sync {
    /// Credit `event` and return the subject's new balance
    async fn credit(&self, event: &RewardEvent) -> Result<u64, LedgerError>;
}

/// Registration of subjects that may receive rewards
#[async_trait]
pub trait WalletRegistry: Send + Sync {
    /// Link `subject_id`, keeping any existing balance, and return that balance
    async fn link(&self, subject_id: &str) -> Result<u64, LedgerError>;
}

/// Balances keyed by wallet address, held in memory
pub struct InMemoryRewardLedger {
    balances: RwLock<HashMap<String, u64>>,
    subject_pattern: Regex,
    action_pattern: Regex,
}

impl InMemoryRewardLedger {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            balances: RwLock::new(HashMap::new()),
            subject_pattern: Regex::new(r"^[A-Za-z0-9_:.\-]{1,128}$")?,
            action_pattern: Regex::new(r"^[a-z][a-z0-9_]{0,63}$")?,
        })
    }

    /// Register a wallet so it can receive rewards; existing balances are kept
    pub fn link_wallet(&self, subject_id: &str) -> Result<u64, LedgerError> {
        if !self.subject_pattern.is_match(subject_id) {
            return Err(LedgerError::InvalidSubject);
        }

        let mut balances = self
            .balances
            .write()
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?;
        Ok(*balances.entry(subject_id.to_string()).or_insert(0))
    }

    pub fn balance(&self, subject_id: &str) -> Option<u64> {
        self.balances
            .read()
            .ok()
            .and_then(|balances| balances.get(subject_id).copied())
    }
}

#[async_trait]
impl RewardLedger for InMemoryRewardLedger {
    async fn credit(&self, event: &RewardEvent) -> Result<u64, LedgerError> {
        if !self.subject_pattern.is_match(&event.subject_id) {
            return Err(LedgerError::InvalidSubject);
        }
        if !self.action_pattern.is_match(&event.action_type) {
            return Err(LedgerError::InvalidActionType);
        }

        let mut balances = self
            .balances
            .write()
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?;

        let balance = balances
            .get_mut(&event.subject_id)
            .ok_or_else(|| LedgerError::UnknownSubject(event.subject_id.clone()))?;

        *balance = balance
            .checked_add(event.quantity)
            .ok_or_else(|| LedgerError::BalanceOverflow(event.subject_id.clone()))?;
        Ok(*balance)
    }
}

#[async_trait]
impl WalletRegistry for InMemoryRewardLedger {
    async fn link(&self, subject_id: &str) -> Result<u64, LedgerError> {
        self.link_wallet(subject_id)
    }
}
