//! Catalog-facing types for the Sale Settlement Engine
//!
//! This module defines products, variants, marketplace fees and the
//! costing policy that decides the order in which batches are consumed.

use rust_decimal::Decimal;
use std::fmt;
use std::str::FromStr;

/// Product identifier
pub type ProductId = u32;

/// Variant-combination identifier
pub type VariantId = u32;

/// Unit count for stock and sale lines
pub type Quantity = u32;

/// Batch consumption order for a product
///
/// The policy is read from the product at settlement time, so changing it
/// affects every subsequent sale but never a committed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CostingPolicy {
    /// First In, First Out. Oldest batches are consumed first.
    Fifo,
    /// Last In, First Out. Newest batches are consumed first.
    Lifo,
}

impl FromStr for CostingPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "FIFO" => Ok(Self::Fifo),
            "LIFO" => Ok(Self::Lifo),
            _ => Err(format!("unknown costing policy: {s}")),
        }
    }
}

impl fmt::Display for CostingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fifo => write!(f, "FIFO"),
            Self::Lifo => write!(f, "LIFO"),
        }
    }
}

/// Identifies one stock pool: a product, optionally narrowed to a variant
///
/// Batches, stock counts and concurrency locks are all keyed by this value.
/// The derived ordering is what concurrent settlements use to acquire locks,
/// so every settlement locks keys in the same sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StockKey {
    pub product: ProductId,
    pub variant: Option<VariantId>,
}

impl StockKey {
    pub fn new(product: ProductId, variant: Option<VariantId>) -> Self {
        Self { product, variant }
    }
}

impl fmt::Display for StockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.variant {
            Some(variant) => write!(f, "product {} variant {}", self.product, variant),
            None => write!(f, "product {}", self.product),
        }
    }
}

/// A sellable product as seen by the engine
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: ProductId,
    pub name: String,

    /// Costing policy; `None` is a catalog configuration error that
    /// settlement reports instead of silently defaulting
    pub costing_policy: Option<CostingPolicy>,

    /// Catalog selling price (informational; batches carry their own price)
    pub price: Decimal,
}

impl Product {
    pub fn new(
        id: ProductId,
        name: impl Into<String>,
        costing_policy: Option<CostingPolicy>,
        price: Decimal,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            costing_policy,
            price,
        }
    }
}

/// A variant combination and the product it belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Variant {
    pub id: VariantId,
    pub product: ProductId,
}

/// Marketplace fee configured for one product on one marketplace
#[derive(Debug, Clone, PartialEq)]
pub struct MarketplaceFee {
    pub product: ProductId,
    pub marketplace: String,

    /// Percentage of gross revenue (0-100) deducted from every qualifying line
    pub percentage: Decimal,

    /// Flat transaction cost deducted at most once per sale per marketplace
    pub process_fee: Decimal,
}

impl MarketplaceFee {
    pub fn new(
        product: ProductId,
        marketplace: impl Into<String>,
        percentage: Decimal,
        process_fee: Decimal,
    ) -> Self {
        Self {
            product,
            marketplace: marketplace.into(),
            percentage,
            process_fee,
        }
    }

    /// Proportional fee on `gross`, or `None` on arithmetic overflow
    pub fn percentage_fee(&self, gross: Decimal) -> Option<Decimal> {
        gross
            .checked_mul(self.percentage)?
            .checked_div(Decimal::ONE_HUNDRED)
    }
}
