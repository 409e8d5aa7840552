//! Sale request and sale record types
//!
//! A `SaleRequest` is what callers submit; a `Sale` is what the engine
//! persists once the request has been settled.

use super::product::{ProductId, Quantity, StockKey, VariantId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::BTreeSet;

/// Sale identifier, assigned at commit
pub type SaleId = u64;

/// Caller-side order reference used by the CSV driver
pub type OrderId = u32;

/// One requested line of a sale
///
/// The quantity is signed so that non-positive input reaches validation
/// and is reported as a bad request instead of being lost at parse time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleLineRequest {
    pub product: ProductId,
    pub variant: Option<VariantId>,
    pub quantity: i64,
}

impl SaleLineRequest {
    pub fn new(product: ProductId, variant: Option<VariantId>, quantity: i64) -> Self {
        Self {
            product,
            variant,
            quantity,
        }
    }

    pub fn key(&self) -> StockKey {
        StockKey::new(self.product, self.variant)
    }
}

/// A multi-item sale request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SaleRequest {
    /// Marketplace whose fees apply; `None` uses the engine default
    pub marketplace: Option<String>,
    pub items: Vec<SaleLineRequest>,
}

impl SaleRequest {
    pub fn new(items: Vec<SaleLineRequest>) -> Self {
        Self {
            marketplace: None,
            items,
        }
    }

    pub fn on_marketplace(mut self, marketplace: impl Into<String>) -> Self {
        self.marketplace = Some(marketplace.into());
        self
    }

    /// Distinct stock keys referenced by the request, in lock order
    pub fn stock_keys(&self) -> BTreeSet<StockKey> {
        self.items.iter().map(SaleLineRequest::key).collect()
    }
}

/// A settled line of a sale
#[derive(Debug, Clone, PartialEq)]
pub struct SaleItem {
    pub product: ProductId,
    pub variant: Option<VariantId>,
    pub quantity: Quantity,

    /// Realized unit price after marketplace fees on this line
    pub net_unit_price: Decimal,

    /// Net revenue of the line; `net_unit_price` is derived from it
    pub net_revenue: Decimal,

    /// Cost of goods sold for this line
    pub cogs: Decimal,

    /// Marketplace fees deducted from this line (percentage plus any flat fee)
    pub fee: Decimal,
}

impl SaleItem {
    /// Line profit, derived for display only
    pub fn profit(&self) -> Decimal {
        self.net_revenue - self.cogs
    }
}

/// A committed sale
#[derive(Debug, Clone, PartialEq)]
pub struct Sale {
    pub id: SaleId,
    pub date: DateTime<Utc>,
    pub marketplace: String,

    /// Net revenue after marketplace fees
    pub total_amount: Decimal,
    pub total_cogs: Decimal,

    /// Always `total_amount - total_cogs`
    pub profit: Decimal,
    pub items: Vec<SaleItem>,
}

/// A sale request tagged with the caller's order reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaleOrder {
    pub order: OrderId,
    pub request: SaleRequest,
}

impl SaleOrder {
    pub fn new(order: OrderId, request: SaleRequest) -> Self {
        Self { order, request }
    }
}
