//! Batch allocation
//!
//! This module decides which batches a sale line consumes and how much of
//! each. Allocation runs against an in-memory copy of a stock key's batches;
//! writing the result back to a store is the orchestrator's job.
//!
//! # Ordering
//!
//! Eligible batches (remaining > 0) are ordered by `(created_at, id)`:
//! ascending for FIFO, and the exact reverse for LIFO. Because the batch id
//! breaks creation-time ties, the order is a total order and repeated
//! allocations over the same rows always pick the same batches.
//!
//! # Failure
//!
//! Availability is checked before anything is consumed, and consumption is
//! planned before it is applied, so a failed allocation leaves the batches
//! exactly as it found them.

use crate::types::{
    BatchId, CostingPolicy, InventoryBatch, Quantity, SettlementError, StockKey,
};
use rust_decimal::Decimal;

/// A single batch's contribution to an allocation
#[derive(Debug, Clone, PartialEq)]
pub struct AllocatedLine {
    pub batch: BatchId,
    pub quantity: Quantity,
    pub unit_cost: Decimal,
    pub unit_price: Decimal,
}

/// The outcome of allocating one sale line
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Allocation {
    /// Consumed batches, in consumption order
    pub lines: Vec<AllocatedLine>,

    /// Σ unit_cost × quantity
    pub total_cogs: Decimal,

    /// Σ unit_price × quantity
    pub gross_revenue: Decimal,
}

impl Allocation {
    /// Total units allocated
    pub fn quantity(&self) -> u64 {
        self.lines.iter().map(|line| u64::from(line.quantity)).sum()
    }
}

/// Parameters of one allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationRequest {
    /// Sale line index, for error context
    pub item: usize,
    pub key: StockKey,
    pub quantity: Quantity,
    pub policy: CostingPolicy,
}

/// Sum of remaining quantity across batches
pub fn available(batches: &[InventoryBatch]) -> u64 {
    batches
        .iter()
        .map(|batch| u64::from(batch.remaining_quantity))
        .sum()
}

/// Indices of eligible batches in consumption order for `policy`
pub fn allocation_order(batches: &[InventoryBatch], policy: CostingPolicy) -> Vec<usize> {
    let mut indices: Vec<usize> = batches
        .iter()
        .enumerate()
        .filter(|(_, batch)| !batch.is_depleted())
        .map(|(i, _)| i)
        .collect();

    // Oldest first, id as tie-break
    indices.sort_by_key(|&i| (batches[i].created_at, batches[i].id));

    if policy == CostingPolicy::Lifo {
        indices.reverse();
    }

    indices
}

/// Consume `request.quantity` units from `batches`
///
/// # Errors
///
/// Returns an error if:
/// - The batches hold fewer units than requested (`InsufficientStock`)
/// - COGS or revenue arithmetic overflows
///
/// In both cases no batch is modified.
pub fn allocate(
    batches: &mut [InventoryBatch],
    request: AllocationRequest,
) -> Result<Allocation, SettlementError> {
    let stock = available(batches);
    if stock < u64::from(request.quantity) {
        return Err(SettlementError::insufficient_stock(
            request.item,
            request.key.product,
            request.key.variant,
            stock,
            request.quantity,
        ));
    }

    let mut still_needed = request.quantity;
    let mut plan: Vec<(usize, Quantity)> = Vec::new();
    let mut allocation = Allocation::default();

    for idx in allocation_order(batches, request.policy) {
        if still_needed == 0 {
            break;
        }

        let batch = &batches[idx];
        let take = still_needed.min(batch.remaining_quantity);
        let units = Decimal::from(take);

        let cost = batch
            .cost_price
            .checked_mul(units)
            .ok_or_else(|| SettlementError::arithmetic_overflow("cogs"))?;
        let revenue = batch
            .selling_price
            .checked_mul(units)
            .ok_or_else(|| SettlementError::arithmetic_overflow("gross revenue"))?;

        allocation.total_cogs = allocation
            .total_cogs
            .checked_add(cost)
            .ok_or_else(|| SettlementError::arithmetic_overflow("cogs"))?;
        allocation.gross_revenue = allocation
            .gross_revenue
            .checked_add(revenue)
            .ok_or_else(|| SettlementError::arithmetic_overflow("gross revenue"))?;

        allocation.lines.push(AllocatedLine {
            batch: batch.id,
            quantity: take,
            unit_cost: batch.cost_price,
            unit_price: batch.selling_price,
        });
        plan.push((idx, take));
        still_needed -= take;
    }

    // Apply only once the whole line is covered
    for (idx, take) in plan {
        batches[idx].remaining_quantity -= take;
    }

    Ok(allocation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StockIn;
    use chrono::{Duration, TimeZone, Utc};

    fn batch(id: BatchId, quantity: Quantity, cost: i64, price: i64, minute: i64) -> InventoryBatch {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        InventoryBatch::new(
            id,
            StockIn::new(1, None, quantity, Decimal::new(cost, 0), Decimal::new(price, 0)),
            t0 + Duration::minutes(minute),
        )
    }

    fn request(quantity: Quantity, policy: CostingPolicy) -> AllocationRequest {
        AllocationRequest {
            item: 0,
            key: StockKey::new(1, None),
            quantity,
            policy,
        }
    }

    #[test]
    fn test_fifo_consumes_oldest_first() {
        let mut batches = vec![batch(1, 5, 10, 15, 0), batch(2, 5, 12, 15, 1)];

        let allocation = allocate(&mut batches, request(7, CostingPolicy::Fifo)).unwrap();

        assert_eq!(allocation.total_cogs, Decimal::new(74, 0));
        assert_eq!(allocation.lines.len(), 2);
        assert_eq!((allocation.lines[0].batch, allocation.lines[0].quantity), (1, 5));
        assert_eq!((allocation.lines[1].batch, allocation.lines[1].quantity), (2, 2));
        assert_eq!(batches[0].remaining_quantity, 0);
        assert_eq!(batches[1].remaining_quantity, 3);
    }

    #[test]
    fn test_lifo_consumes_newest_first() {
        let mut batches = vec![batch(1, 5, 10, 15, 0), batch(2, 5, 12, 15, 1)];

        let allocation = allocate(&mut batches, request(7, CostingPolicy::Lifo)).unwrap();

        assert_eq!(allocation.total_cogs, Decimal::new(80, 0));
        assert_eq!((allocation.lines[0].batch, allocation.lines[0].quantity), (2, 5));
        assert_eq!((allocation.lines[1].batch, allocation.lines[1].quantity), (1, 2));
        assert_eq!(batches[0].remaining_quantity, 3);
        assert_eq!(batches[1].remaining_quantity, 0);
    }

    #[test]
    fn test_order_uses_created_at_not_insertion_order() {
        // Batch 1 was inserted first but created later
        let mut batches = vec![batch(1, 5, 10, 15, 10), batch(2, 5, 12, 15, 0)];

        let allocation = allocate(&mut batches, request(1, CostingPolicy::Fifo)).unwrap();
        assert_eq!(allocation.lines[0].batch, 2);
    }

    #[test]
    fn test_equal_timestamps_break_ties_by_id() {
        let mut batches = vec![batch(3, 1, 10, 15, 0), batch(1, 1, 11, 15, 0), batch(2, 1, 12, 15, 0)];

        assert_eq!(allocation_order(&batches, CostingPolicy::Fifo), vec![1, 2, 0]);
        assert_eq!(allocation_order(&batches, CostingPolicy::Lifo), vec![0, 2, 1]);

        let allocation = allocate(&mut batches, request(2, CostingPolicy::Fifo)).unwrap();
        let ids: Vec<BatchId> = allocation.lines.iter().map(|l| l.batch).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_depleted_batches_are_skipped() {
        let mut batches = vec![batch(1, 5, 10, 15, 0), batch(2, 5, 12, 15, 1)];
        batches[0].remaining_quantity = 0;

        let allocation = allocate(&mut batches, request(2, CostingPolicy::Fifo)).unwrap();
        assert_eq!(allocation.lines.len(), 1);
        assert_eq!(allocation.lines[0].batch, 2);
    }

    #[test]
    fn test_gross_revenue_uses_batch_selling_price() {
        let mut batches = vec![batch(1, 2, 10, 15, 0), batch(2, 2, 10, 20, 1)];

        let allocation = allocate(&mut batches, request(3, CostingPolicy::Fifo)).unwrap();
        assert_eq!(allocation.gross_revenue, Decimal::new(50, 0));
        assert_eq!(allocation.quantity(), 3);
    }

    #[test]
    fn test_insufficient_stock_leaves_batches_untouched() {
        let mut batches = vec![batch(1, 5, 10, 15, 0), batch(2, 5, 12, 15, 1)];
        let before = batches.clone();

        let result = allocate(&mut batches, request(11, CostingPolicy::Fifo));

        assert_eq!(
            result.unwrap_err(),
            SettlementError::insufficient_stock(0, 1, None, 10, 11)
        );
        assert_eq!(batches, before);
    }

    #[test]
    fn test_exact_depletion() {
        let mut batches = vec![batch(1, 5, 10, 15, 0), batch(2, 5, 12, 15, 1)];

        allocate(&mut batches, request(10, CostingPolicy::Lifo)).unwrap();
        assert_eq!(available(&batches), 0);
        assert!(batches.iter().all(InventoryBatch::is_depleted));
    }
}
