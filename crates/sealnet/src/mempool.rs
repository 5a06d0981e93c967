//! Pending transaction pool.
//!
//! Holds transactions that passed validation and await confirmation. Entries
//! are keyed by transaction id and ordered by payload timestamp, with
//! admission order breaking ties so the pending listing is deterministic.
//!
//! All operations on one instance are serialized by a single mutex. There is
//! no global pool: callers construct one and share it.

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use sealnet_core::{Transaction, TransactionId};

/// Tunable parameters for the mempool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MempoolConfig {
    /// Maximum number of pending transactions; `None` is unbounded.
    pub max_size: Option<usize>,
}

/// Why a transaction was not admitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MempoolError {
    #[error("transaction {0} is already pending")]
    Duplicate(TransactionId),

    #[error("mempool is full (capacity {capacity})")]
    Full { capacity: usize },
}

/// Ordering key: payload timestamp, then admission sequence.
type OrderKey = (i64, u64);

#[derive(Default)]
struct MempoolInner {
    by_id: HashMap<TransactionId, (OrderKey, Transaction)>,
    by_time: BTreeMap<OrderKey, TransactionId>,
    next_seq: u64,
}

/// Thread-safe pool of pending transactions.
pub struct Mempool {
    config: MempoolConfig,
    inner: Mutex<MempoolInner>,
}

impl Mempool {
    /// Create an empty, unbounded mempool.
    pub fn new() -> Self {
        Self::with_config(MempoolConfig::default())
    }

    pub fn with_config(config: MempoolConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(MempoolInner::default()),
        }
    }

    pub fn config(&self) -> &MempoolConfig {
        &self.config
    }

    /// Admit a transaction, reporting why it was refused.
    pub fn try_add(&self, tx: Transaction) -> Result<(), MempoolError> {
        let id = tx.id();
        let mut inner = self.inner.lock();
        if inner.by_id.contains_key(&id) {
            return Err(MempoolError::Duplicate(id));
        }
        if let Some(capacity) = self.config.max_size {
            if inner.by_id.len() >= capacity {
                return Err(MempoolError::Full { capacity });
            }
        }
        inner.insert(id, tx);
        Ok(())
    }

    /// Admit a transaction. Returns `false`, changing nothing, if it is
    /// already present or the pool is full.
    pub fn add(&self, tx: Transaction) -> bool {
        self.try_add(tx).is_ok()
    }

    /// Admit a transaction that has already been committed, ignoring the
    /// capacity limit. Returns `false` if it is already present.
    pub(crate) fn admit_committed(&self, tx: Transaction) -> bool {
        let id = tx.id();
        let mut inner = self.inner.lock();
        if inner.by_id.contains_key(&id) {
            return false;
        }
        inner.insert(id, tx);
        true
    }

    /// Whether another transaction fits under the capacity limit right now.
    pub fn has_capacity(&self) -> bool {
        match self.config.max_size {
            Some(capacity) => self.inner.lock().by_id.len() < capacity,
            None => true,
        }
    }

    pub fn get(&self, id: &TransactionId) -> Option<Transaction> {
        self.inner.lock().by_id.get(id).map(|(_, tx)| tx.clone())
    }

    pub fn contains(&self, id: &TransactionId) -> bool {
        self.inner.lock().by_id.contains_key(id)
    }

    /// Up to `limit` transactions, oldest payload timestamp first.
    pub fn get_pending(&self, limit: usize) -> Vec<Transaction> {
        let inner = self.inner.lock();
        inner
            .by_time
            .values()
            .take(limit)
            .filter_map(|id| inner.by_id.get(id).map(|(_, tx)| tx.clone()))
            .collect()
    }

    /// Remove a transaction; a no-op if it is absent.
    pub fn remove(&self, id: &TransactionId) -> Option<Transaction> {
        let mut inner = self.inner.lock();
        let (key, tx) = inner.by_id.remove(id)?;
        inner.by_time.remove(&key);
        Some(tx)
    }

    pub fn size(&self) -> usize {
        self.inner.lock().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Drop every pending transaction.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.by_id.clear();
        inner.by_time.clear();
    }
}

impl MempoolInner {
    fn insert(&mut self, id: TransactionId, tx: Transaction) {
        let key = (tx.timestamp(), self.next_seq);
        self.next_seq += 1;
        self.by_time.insert(key, id);
        self.by_id.insert(id, (key, tx));
    }
}

impl Default for Mempool {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Mempool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mempool")
            .field("size", &self.size())
            .field("max_size", &self.config.max_size)
            .finish()
    }
}
