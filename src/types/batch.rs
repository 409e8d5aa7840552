//! Inventory batch types
//!
//! A batch is a discrete lot of units sharing one cost price, one selling
//! price and one creation time. Sales consume batches; nothing in the engine
//! ever returns units to a batch.

use super::error::SettlementError;
use super::product::{ProductId, Quantity, StockKey, VariantId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Batch identifier, assigned in stock-in order
pub type BatchId = u64;

/// A lot of stocked units
#[derive(Debug, Clone, PartialEq)]
pub struct InventoryBatch {
    pub id: BatchId,
    pub product: ProductId,
    pub variant: Option<VariantId>,

    /// Units received; immutable after creation
    pub original_quantity: Quantity,

    /// Units still available, always within `0..=original_quantity`
    pub remaining_quantity: Quantity,

    /// Unit cost price, the basis for COGS
    pub cost_price: Decimal,

    /// Unit selling price, the basis for gross revenue
    pub selling_price: Decimal,

    /// Defines allocation order; ties are broken by `id`
    pub created_at: DateTime<Utc>,
}

impl InventoryBatch {
    /// Create a fresh batch from a validated stock-in
    pub fn new(id: BatchId, stock_in: StockIn, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            product: stock_in.product,
            variant: stock_in.variant,
            original_quantity: stock_in.quantity,
            remaining_quantity: stock_in.quantity,
            cost_price: stock_in.cost_price,
            selling_price: stock_in.selling_price,
            created_at,
        }
    }

    pub fn key(&self) -> StockKey {
        StockKey::new(self.product, self.variant)
    }

    pub fn is_depleted(&self) -> bool {
        self.remaining_quantity == 0
    }

    /// Units consumed from this batch so far
    pub fn consumed(&self) -> Quantity {
        self.original_quantity - self.remaining_quantity
    }

    /// Administrative edit of the remaining quantity
    ///
    /// # Errors
    ///
    /// Returns `InvalidAdjustment` if `remaining` exceeds the original quantity.
    pub fn set_remaining(&mut self, remaining: Quantity) -> Result<(), SettlementError> {
        if remaining > self.original_quantity {
            return Err(SettlementError::invalid_adjustment(
                self.id,
                remaining,
                self.original_quantity,
            ));
        }
        self.remaining_quantity = remaining;
        Ok(())
    }
}

/// Request to receive new stock
#[derive(Debug, Clone, PartialEq)]
pub struct StockIn {
    pub product: ProductId,
    pub variant: Option<VariantId>,
    pub quantity: Quantity,
    pub cost_price: Decimal,
    pub selling_price: Decimal,

    /// Explicit creation time; `None` stamps the batch with the current time
    pub created_at: Option<DateTime<Utc>>,
}

impl StockIn {
    pub fn new(
        product: ProductId,
        variant: Option<VariantId>,
        quantity: Quantity,
        cost_price: Decimal,
        selling_price: Decimal,
    ) -> Self {
        Self {
            product,
            variant,
            quantity,
            cost_price,
            selling_price,
            created_at: None,
        }
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn key(&self) -> StockKey {
        StockKey::new(self.product, self.variant)
    }
}
