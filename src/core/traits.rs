//! Core traits for the settlement engine's external collaborators
//!
//! Product, variant and fee records are owned by the catalog, which lives
//! outside the engine. The engine only reads them, through this trait, so the
//! synchronous and concurrent engines can share one catalog implementation.

use crate::types::{MarketplaceFee, Product, ProductId, Variant, VariantId};

/// Read-only access to catalog records
///
/// Implementations must be safe to share across tasks; the concurrent engine
/// holds its catalog behind an `Arc`.
pub trait Catalog: Send + Sync {
    /// Look up a product by id
    fn product(&self, id: ProductId) -> Option<Product>;

    /// Look up a variant combination by id
    fn variant(&self, id: VariantId) -> Option<Variant>;

    /// Look up the fee a marketplace charges for a product
    fn marketplace_fee(&self, product: ProductId, marketplace: &str) -> Option<MarketplaceFee>;
}
