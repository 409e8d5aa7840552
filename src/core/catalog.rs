//! In-memory catalog
//!
//! This module provides `InMemoryCatalog`, the `Catalog` implementation used by
//! the CLI driver and the tests, plus the product/variant resolution shared by
//! settlement and stock-in.
//!
//! The catalog enforces the few rules the engine depends on:
//! - A variant always belongs to an existing product
//! - At most one fee row exists per (product, marketplace); setting it again replaces it
//! - Fee percentages stay within 0-100 and flat fees are non-negative

use crate::core::traits::Catalog;
use crate::types::{
    MarketplaceFee, Product, ProductId, SettlementError, StockIn, StockKey, Variant, VariantId,
};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// HashMap-backed catalog
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    products: HashMap<ProductId, Product>,
    variants: HashMap<VariantId, Variant>,
    fees: HashMap<(ProductId, String), MarketplaceFee>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a product
    pub fn add_product(&mut self, product: Product) {
        self.products.insert(product.id, product);
    }

    /// Insert or replace a variant
    ///
    /// # Errors
    ///
    /// Returns `ProductNotFound` if the owning product is unknown.
    pub fn add_variant(&mut self, variant: Variant) -> Result<(), SettlementError> {
        if !self.products.contains_key(&variant.product) {
            return Err(SettlementError::product_not_found(None, variant.product));
        }
        self.variants.insert(variant.id, variant);
        Ok(())
    }

    /// Configure the fee a marketplace charges for a product
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The product is unknown
    /// - The percentage is outside 0-100
    /// - The flat process fee is negative
    pub fn set_fee(&mut self, fee: MarketplaceFee) -> Result<(), SettlementError> {
        if !self.products.contains_key(&fee.product) {
            return Err(SettlementError::product_not_found(None, fee.product));
        }
        if fee.percentage < Decimal::ZERO || fee.percentage > Decimal::ONE_HUNDRED {
            return Err(SettlementError::invalid_amount("percentage", fee.percentage));
        }
        if fee.process_fee < Decimal::ZERO {
            return Err(SettlementError::invalid_amount("process fee", fee.process_fee));
        }

        self.fees.insert((fee.product, fee.marketplace.clone()), fee);
        Ok(())
    }

    pub fn product_count(&self) -> usize {
        self.products.len()
    }
}

impl Catalog for InMemoryCatalog {
    fn product(&self, id: ProductId) -> Option<Product> {
        self.products.get(&id).cloned()
    }

    fn variant(&self, id: VariantId) -> Option<Variant> {
        self.variants.get(&id).copied()
    }

    fn marketplace_fee(&self, product: ProductId, marketplace: &str) -> Option<MarketplaceFee> {
        self.fees.get(&(product, marketplace.to_string())).cloned()
    }
}

/// Resolve a (product, variant?) reference against the catalog
///
/// Returns the product and its stock key. `item` is the sale line index used
/// for error context, or `None` outside a settlement.
///
/// # Errors
///
/// Returns an error if:
/// - The product does not exist
/// - The variant does not exist
/// - The variant belongs to a different product
pub fn resolve_stock_key<C: Catalog + ?Sized>(
    catalog: &C,
    item: Option<usize>,
    product: ProductId,
    variant: Option<VariantId>,
) -> Result<(Product, StockKey), SettlementError> {
    let found = catalog
        .product(product)
        .ok_or_else(|| SettlementError::product_not_found(item, product))?;

    if let Some(variant_id) = variant {
        let variant = catalog
            .variant(variant_id)
            .ok_or_else(|| SettlementError::variant_not_found(item, variant_id))?;
        if variant.product != product {
            return Err(SettlementError::variant_mismatch(
                item,
                variant_id,
                product,
                variant.product,
            ));
        }
    }

    Ok((found, StockKey::new(product, variant)))
}

/// Validate a stock-in against the catalog and return its stock key
///
/// # Errors
///
/// Returns an error if the product or variant cannot be resolved, the
/// quantity is zero, or either price is negative.
pub fn validate_stock_in<C: Catalog + ?Sized>(
    catalog: &C,
    stock_in: &StockIn,
) -> Result<StockKey, SettlementError> {
    let (_, key) = resolve_stock_key(catalog, None, stock_in.product, stock_in.variant)?;

    if stock_in.quantity == 0 {
        return Err(SettlementError::invalid_quantity(None, 0));
    }
    if stock_in.cost_price < Decimal::ZERO {
        return Err(SettlementError::invalid_amount("cost price", stock_in.cost_price));
    }
    if stock_in.selling_price < Decimal::ZERO {
        return Err(SettlementError::invalid_amount(
            "selling price",
            stock_in.selling_price,
        ));
    }

    Ok(key)
}
