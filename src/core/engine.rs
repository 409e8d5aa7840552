//! Sale settlement engine
//!
//! This module provides the `SettlementEngine` that settles sales by
//! coordinating between the catalog, the `BatchStore` and the `SalesLedger`.
//!
//! The engine enforces business rules such as:
//! - Every line is validated before any batch is looked at
//! - Allocation follows the product's costing policy, never a default
//! - The flat marketplace fee is charged once per sale per marketplace
//! - Batch writes, the sale record and its equity entry commit together or not at all

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::core::batch_store::BatchStore;
use crate::core::catalog::{validate_stock_in, InMemoryCatalog};
use crate::core::config::EngineConfig;
use crate::core::sales_ledger::SalesLedger;
use crate::core::settlement::{self, SettlementStage};
use crate::core::traits::Catalog;
use crate::types::{
    BatchId, EquityEntry, InventoryBatch, ProductId, Quantity, Sale, SaleRequest,
    SettlementError, StockIn, StockKey, VariantId,
};

/// Single-threaded settlement engine
///
/// Owns its batch store and ledgers outright; every mutating operation takes
/// `&mut self`, which is what makes each settlement atomic.
pub struct SettlementEngine<C: Catalog = InMemoryCatalog> {
    catalog: C,
    config: EngineConfig,
    store: BatchStore,
    ledger: SalesLedger,
}

impl<C: Catalog> SettlementEngine<C> {
    /// Create a new SettlementEngine with an empty batch store
    ///
    /// # Arguments
    ///
    /// * `catalog` - Source of products, variants and marketplace fees
    /// * `config` - Default marketplace and lock settings
    pub fn new(catalog: C, config: EngineConfig) -> Self {
        Self {
            catalog,
            config,
            store: BatchStore::new(),
            ledger: SalesLedger::new(),
        }
    }

    /// Settle one sale
    ///
    /// Validates every line, allocates each against a staged copy of the
    /// batches, applies marketplace fees, then commits the batch writes, the
    /// sale and its equity entry.
    ///
    /// # Arguments
    ///
    /// * `request` - Items to sell and, optionally, the marketplace
    ///
    /// # Returns
    ///
    /// * `Ok(Sale)` - The committed sale
    /// * `Err(SettlementError)` - Nothing was written
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The request is empty or a line is invalid (`BadRequest`, `NotFound`)
    /// - A product has no costing policy
    /// - Any line cannot be covered by its batches (`InsufficientStock`)
    /// - The commit cannot be applied (`PersistenceFailure`)
    pub fn settle_sale(&mut self, request: SaleRequest) -> Result<Sale, SettlementError> {
        let marketplace = self
            .config
            .marketplace_for(request.marketplace.as_deref())
            .to_string();

        debug!(stage = %SettlementStage::Validating, items = request.items.len());
        let lines = settlement::validate_request(&self.catalog, &request)?;

        let mut staged = self.store.stage(&settlement::stock_keys(&lines));
        let draft = settlement::settle_lines(&self.catalog, &marketplace, &lines, &mut staged)?;

        debug!(stage = %SettlementStage::Committing);
        self.store.apply(staged)?;
        let sale = self.ledger.record(draft, Utc::now());

        info!(
            sale = sale.id,
            marketplace = %sale.marketplace,
            total_amount = %sale.total_amount,
            total_cogs = %sale.total_cogs,
            profit = %sale.profit,
            "sale settled"
        );
        debug!(stage = %SettlementStage::Done, sale = sale.id);
        Ok(sale)
    }

    /// Receive new stock as a fresh batch
    ///
    /// # Errors
    ///
    /// Returns an error if the product or variant is unknown, the quantity is
    /// zero, or a price is negative.
    pub fn stock_in(&mut self, stock_in: StockIn) -> Result<InventoryBatch, SettlementError> {
        validate_stock_in(&self.catalog, &stock_in)?;
        let batch = self.store.receive(stock_in, Utc::now());
        debug!(batch = batch.id, key = %batch.key(), quantity = batch.original_quantity, "stock received");
        Ok(batch)
    }

    /// Administrative edit of a batch's remaining quantity
    pub fn adjust_remaining(
        &mut self,
        batch: BatchId,
        remaining: Quantity,
    ) -> Result<InventoryBatch, SettlementError> {
        self.store.adjust_remaining(batch, remaining)
    }

    /// Σ remaining quantity for a product (and variant)
    pub fn current_stock(&self, product: ProductId, variant: Option<VariantId>) -> u64 {
        self.store.current_stock(&StockKey::new(product, variant))
    }

    /// Batches of a product (and variant) in FIFO order
    pub fn batches(&self, product: ProductId, variant: Option<VariantId>) -> Vec<InventoryBatch> {
        self.store.batches(&StockKey::new(product, variant))
    }

    pub fn sales(&self) -> &[Sale] {
        self.ledger.sales()
    }

    pub fn equity_entries(&self) -> &[EquityEntry] {
        self.ledger.equity_entries()
    }

    pub fn equity_total(&self) -> Result<Decimal, SettlementError> {
        self.ledger.equity_total()
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }
}
