//! Thread-safe batch storage for concurrent settlement
//!
//! This module provides the `AsyncBatchStore` struct, which keeps each stock
//! key's batches behind its own async mutex so that settlements on different
//! products proceed in parallel while settlements sharing a product queue up.
//!
//! # Design
//!
//! ```text
//! AsyncBatchStore
//!     ├── DashMap<StockKey, Arc<Mutex<Vec<InventoryBatch>>>>  (per-key rows)
//!     ├── DashMap<BatchId, StockKey>                          (batch index)
//!     └── AtomicU64                                           (batch ids)
//! ```
//!
//! The DashMap only hands out `Arc` clones of a key's mutex; no DashMap guard
//! is ever held across an `.await`.
//!
//! # Lock Order
//!
//! `lock` acquires the mutexes of a key set in ascending `StockKey` order.
//! Every multi-key acquisition in the crate goes through it, so two
//! settlements can never wait on each other in a cycle.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::core::allocator;
use crate::core::settlement::{check_staged, StagedBatches};
use crate::types::{BatchId, InventoryBatch, Quantity, SettlementError, StockIn, StockKey};

type Rows = Arc<Mutex<Vec<InventoryBatch>>>;

/// Thread-safe batch store
#[derive(Debug, Default)]
pub struct AsyncBatchStore {
    rows: DashMap<StockKey, Rows>,
    index: DashMap<BatchId, StockKey>,
    next_id: AtomicU64,
}

impl AsyncBatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The mutex guarding `key`, created on first use
    fn slot(&self, key: StockKey) -> Rows {
        let entry = self.rows.entry(key).or_default();
        Arc::clone(entry.value())
    }

    /// The mutex guarding `key`, if the key has ever held stock
    fn existing_slot(&self, key: &StockKey) -> Option<Rows> {
        self.rows.get(key).map(|slot| Arc::clone(slot.value()))
    }

    /// Acquire the locks of `keys` in ascending key order
    ///
    /// Waits without bound; callers apply their own timeout. Dropping the
    /// returned future releases any locks acquired so far.
    pub async fn lock(&self, keys: &BTreeSet<StockKey>) -> StockLocks {
        let mut guards = BTreeMap::new();
        for key in keys {
            let slot = self.slot(*key);
            guards.insert(*key, slot.lock_owned().await);
        }
        StockLocks { guards }
    }

    /// Create a batch from a validated stock-in
    pub async fn receive(&self, stock_in: StockIn, now: DateTime<Utc>) -> InventoryBatch {
        let key = stock_in.key();
        let slot = self.slot(key);
        let mut rows = slot.lock().await;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let created_at = stock_in.created_at.unwrap_or(now);
        let batch = InventoryBatch::new(id, stock_in, created_at);

        rows.push(batch.clone());
        self.index.insert(id, key);
        batch
    }

    /// Σ remaining quantity for a stock key
    ///
    /// Takes the key's lock, so the result never reflects half of a commit.
    pub async fn current_stock(&self, key: &StockKey) -> u64 {
        match self.existing_slot(key) {
            Some(slot) => allocator::available(&slot.lock().await),
            None => 0,
        }
    }

    /// Batches of a stock key in FIFO allocation order
    pub async fn batches(&self, key: &StockKey) -> Vec<InventoryBatch> {
        let Some(slot) = self.existing_slot(key) else {
            return Vec::new();
        };
        let mut batches = slot.lock().await.clone();
        batches.sort_by_key(|batch| (batch.created_at, batch.id));
        batches
    }

    /// Administrative edit of one batch's remaining quantity
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The batch does not exist (`BatchNotFound`)
    /// - `remaining` exceeds the batch's original quantity (`InvalidAdjustment`)
    pub async fn adjust_remaining(
        &self,
        id: BatchId,
        remaining: Quantity,
    ) -> Result<InventoryBatch, SettlementError> {
        let key = self
            .index
            .get(&id)
            .map(|key| *key.value())
            .ok_or_else(|| SettlementError::batch_not_found(id))?;
        let slot = self.slot(key);
        let mut rows = slot.lock().await;

        let batch = rows
            .iter_mut()
            .find(|batch| batch.id == id)
            .ok_or_else(|| SettlementError::batch_not_found(id))?;
        batch.set_remaining(remaining)?;
        Ok(batch.clone())
    }

    pub fn total_batches(&self) -> usize {
        self.index.len()
    }
}

/// Exclusive hold on the rows of a set of stock keys
///
/// Released when dropped.
#[derive(Debug)]
pub struct StockLocks {
    guards: BTreeMap<StockKey, OwnedMutexGuard<Vec<InventoryBatch>>>,
}

impl StockLocks {
    /// Copy the held rows into a fresh working set
    pub fn stage(&self) -> StagedBatches {
        let mut staged = StagedBatches::new();
        for (key, rows) in &self.guards {
            staged.insert(*key, rows.to_vec());
        }
        staged
    }

    /// Replace the held rows with a settlement's staged rows
    ///
    /// Every key is checked before any is written.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceFailure` if a staged key is not held by these
    /// locks or no longer matches the rows it was copied from.
    pub fn apply(&mut self, staged: StagedBatches) -> Result<(), SettlementError> {
        for (key, batches) in staged.rows() {
            let live = self.guards.get(key).ok_or_else(|| {
                SettlementError::persistence_failure(format!("{key} is not locked"))
            })?;
            check_staged(key, batches, live)?;
        }

        for (key, batches) in staged.into_rows() {
            if let Some(rows) = self.guards.get_mut(&key) {
                **rows = batches;
            }
        }
        Ok(())
    }

    /// Σ remaining quantity of a held key, 0 if the key is not held
    pub fn current_stock(&self, key: &StockKey) -> u64 {
        self.guards
            .get(key)
            .map(|rows| allocator::available(rows))
            .unwrap_or(0)
    }
}
