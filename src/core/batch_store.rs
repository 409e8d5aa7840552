//! Inventory batch storage
//!
//! This module provides the `BatchStore` component that holds every inventory
//! batch, grouped by stock key. Batch rows are only mutated in two ways:
//! applying a settlement's staged rows, or an administrative edit of one
//! batch's remaining quantity.
//!
//! # Staging
//!
//! A settlement never mutates the store directly. It takes a `StagedBatches`
//! copy of the keys it touches, allocates against the copy, and hands the
//! copy back through `apply`, which checks every key before writing any.

use crate::core::allocator;
use crate::core::settlement::{check_staged, StagedBatches};
use crate::types::{BatchId, InventoryBatch, Quantity, SettlementError, StockIn, StockKey};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};

/// Batch store for the synchronous engine
#[derive(Debug, Default)]
pub struct BatchStore {
    /// Map of stock key to its batches, in stock-in order
    rows: HashMap<StockKey, Vec<InventoryBatch>>,

    /// Map of batch id to the key that owns it
    index: HashMap<BatchId, StockKey>,

    next_id: BatchId,
}

impl BatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a batch from a validated stock-in
    ///
    /// The batch is stamped with `stock_in.created_at`, or `now` if unset.
    pub fn receive(&mut self, stock_in: StockIn, now: DateTime<Utc>) -> InventoryBatch {
        self.next_id += 1;
        let id = self.next_id;
        let key = stock_in.key();
        let created_at = stock_in.created_at.unwrap_or(now);
        let batch = InventoryBatch::new(id, stock_in, created_at);

        self.rows.entry(key).or_default().push(batch.clone());
        self.index.insert(id, key);
        batch
    }

    /// Σ remaining quantity for a stock key
    pub fn current_stock(&self, key: &StockKey) -> u64 {
        self.rows
            .get(key)
            .map(|batches| allocator::available(batches))
            .unwrap_or(0)
    }

    /// Batches of a stock key in FIFO allocation order
    pub fn batches(&self, key: &StockKey) -> Vec<InventoryBatch> {
        let mut batches = self.rows.get(key).cloned().unwrap_or_default();
        batches.sort_by_key(|batch| (batch.created_at, batch.id));
        batches
    }

    pub fn get(&self, id: BatchId) -> Option<&InventoryBatch> {
        let key = self.index.get(&id)?;
        self.rows.get(key)?.iter().find(|batch| batch.id == id)
    }

    /// Administrative edit of one batch's remaining quantity
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The batch does not exist (`BatchNotFound`)
    /// - `remaining` exceeds the batch's original quantity (`InvalidAdjustment`)
    pub fn adjust_remaining(
        &mut self,
        id: BatchId,
        remaining: Quantity,
    ) -> Result<InventoryBatch, SettlementError> {
        let batch = self
            .index
            .get(&id)
            .and_then(|key| self.rows.get_mut(key))
            .and_then(|batches| batches.iter_mut().find(|batch| batch.id == id))
            .ok_or_else(|| SettlementError::batch_not_found(id))?;

        batch.set_remaining(remaining)?;
        Ok(batch.clone())
    }

    /// Copy the rows of `keys` into a fresh working set
    pub fn stage(&self, keys: &BTreeSet<StockKey>) -> StagedBatches {
        let mut staged = StagedBatches::new();
        for key in keys {
            staged.insert(*key, self.rows.get(key).cloned().unwrap_or_default());
        }
        staged
    }

    /// Replace live rows with a settlement's staged rows
    ///
    /// Every key is checked before any is written, so either all staged
    /// rows land or none do.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceFailure` if any staged key no longer matches the
    /// live rows it was copied from.
    pub fn apply(&mut self, staged: StagedBatches) -> Result<(), SettlementError> {
        for (key, batches) in staged.rows() {
            let live = self.rows.get(key).map(Vec::as_slice).unwrap_or(&[]);
            check_staged(key, batches, live)?;
        }

        for (key, batches) in staged.into_rows() {
            if !batches.is_empty() {
                self.rows.insert(key, batches);
            }
        }
        Ok(())
    }

    pub fn total_batches(&self) -> usize {
        self.index.len()
    }
}
