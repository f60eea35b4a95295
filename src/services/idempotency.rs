//! Exactly-once bookkeeping for applied sync events.
//!
//! The verifier records the result of every applied event under its
//! transaction id. A replay of the same id returns that record instead of
//! crediting the subject again.

use crate::models::RewardEvent;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError, RwLock},
};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Result of applying one event, as first observed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub transaction_id: String,
    pub subject_id: String,
    pub quantity: u64,
    pub action_type: String,
    /// Subject balance right after this event was credited
    pub new_balance: u64,
    pub applied_at: DateTime<Utc>,
}

impl SyncRecord {
    pub fn new(event: &RewardEvent, new_balance: u64, applied_at: DateTime<Utc>) -> Self {
        Self {
            transaction_id: event.transaction_id.clone(),
            subject_id: event.subject_id.clone(),
            quantity: event.quantity,
            action_type: event.action_type.clone(),
            new_balance,
            applied_at,
        }
    }
}

/// Outcome of [`IdempotencyStore::reserve`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reservation {
    /// The id was unknown and is now held as pending by the caller
    Reserved,
    /// Another attempt holds the id and has not completed, or crashed
    /// between crediting and recording
    Pending,
    /// The id was already applied; its record is returned unchanged
    Applied(SyncRecord),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("idempotency store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone)]
enum Entry {
    Pending,
    Applied(SyncRecord),
}

/// Storage for applied-event records keyed by transaction id.
///
/// An id moves from absent to pending through `reserve`, then to applied
/// through `complete`, or back to absent through `release`. `reserve` must
/// be atomic: of several concurrent reservations for one id, exactly one
/// observes `Reserved`. Backends shared by several verifier processes must
/// provide this themselves (e.g. a unique index).
///
/// A pending id is never credited again, so a crash or store failure after
/// crediting leaves the id blocked rather than credited twice.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Applied record for `transaction_id`; pending ids read as `None`
    async fn get(&self, transaction_id: &str) -> Result<Option<SyncRecord>, StoreError>;

    async fn reserve(&self, transaction_id: &str) -> Result<Reservation, StoreError>;

    /// Turn a pending reservation into an applied record
    async fn complete(&self, record: SyncRecord) -> Result<(), StoreError>;

    /// Drop a pending reservation whose event was not credited
    async fn release(&self, transaction_id: &str) -> Result<(), StoreError>;
}

/// Process-local store backed by a `HashMap`, for tests and single-instance deployments
#[derive(Default)]
pub struct InMemoryIdempotencyStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryIdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of applied records
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .map(|entries| {
                entries
                    .values()
                    .filter(|entry| matches!(entry, Entry::Applied(_)))
                    .count()
            })
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of reservations not yet completed or released
    pub fn pending(&self) -> usize {
        self.entries
            .read()
            .map(|entries| {
                entries
                    .values()
                    .filter(|entry| matches!(entry, Entry::Pending))
                    .count()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn get(&self, transaction_id: &str) -> Result<Option<SyncRecord>, StoreError> {
        let entries = self
            .entries
            .read()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(match entries.get(transaction_id) {
            Some(Entry::Applied(record)) => Some(record.clone()),
            _ => None,
        })
    }

    async fn reserve(&self, transaction_id: &str) -> Result<Reservation, StoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        match entries.get(transaction_id) {
            Some(Entry::Applied(record)) => Ok(Reservation::Applied(record.clone())),
            Some(Entry::Pending) => Ok(Reservation::Pending),
            None => {
                entries.insert(transaction_id.to_string(), Entry::Pending);
                Ok(Reservation::Reserved)
            }
        }
    }

    async fn complete(&self, record: SyncRecord) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        // An applied record is never overwritten
        if !matches!(entries.get(&record.transaction_id), Some(Entry::Applied(_))) {
            entries.insert(record.transaction_id.clone(), Entry::Applied(record));
        }
        Ok(())
    }

    async fn release(&self, transaction_id: &str) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        if matches!(entries.get(transaction_id), Some(Entry::Pending)) {
            entries.remove(transaction_id);
        }
        Ok(())
    }
}

/// Per-transaction-id async locks.
///
/// Serialises the check / apply / record sequence for one id while letting
/// different ids proceed in parallel. Entries are dropped once no task holds
/// or waits on them, including waiters cancelled before they got the lock.
#[derive(Default)]
pub struct TransactionLocks {
    slots: Mutex<HashMap<String, LockSlot>>,
}

struct LockSlot {
    lock: Arc<AsyncMutex<()>>,
    /// Tasks holding or waiting on `lock`
    users: usize,
}

/// Held while a transaction id is being processed
pub struct TransactionGuard<'a> {
    owner: &'a TransactionLocks,
    transaction_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl TransactionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, transaction_id: &str) -> TransactionGuard<'_> {
        let lock = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            let slot = slots
                .entry(transaction_id.to_string())
                .or_insert_with(|| LockSlot {
                    lock: Arc::default(),
                    users: 0,
                });
            slot.users += 1;
            slot.lock.clone()
        };

        // Registered before waiting so a cancelled wait still releases the slot
        let mut ticket = TransactionGuard {
            owner: self,
            transaction_id: transaction_id.to_string(),
            guard: None,
        };
        ticket.guard = Some(lock.lock_owned().await);
        ticket
    }

    /// Number of ids currently locked or awaited
    pub fn active(&self) -> usize {
        self.slots
            .lock()
            .map(|slots| slots.len())
            .unwrap_or_default()
    }
}

impl Drop for TransactionGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut slots = self.owner.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = slots.get_mut(&self.transaction_id) {
            slot.users = slot.users.saturating_sub(1);
            if slot.users == 0 {
                slots.remove(&self.transaction_id);
            }
        }
    }
}
