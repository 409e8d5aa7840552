//! Concurrent sale settlement
//!
//! This module provides the `AsyncSettlementEngine` struct, which settles
//! sales from many tasks at once against one shared batch store.
//!
//! # Architecture
//!
//! ```text
//! AsyncSettlementEngine
//!     ├── Arc<C: Catalog>        (read-only catalog)
//!     ├── Arc<AsyncBatchStore>   (per-stock-key locked rows)
//!     └── Arc<AsyncLedger>       (sales + equity, one mutex)
//! ```
//!
//! # Locking
//!
//! A settlement validates without any lock, then acquires the locks of every
//! stock key it touches, in key order, bounded by the configured timeout. It
//! holds them through allocation, fee settlement and commit. The ledger lock
//! is taken last, right before the writes; from there to the end of the
//! commit there is no `.await`, so a commit either runs whole or not at all.
//!
//! Dropping a `settle_sale` future at any await point releases its locks and
//! discards its staged rows without touching the store.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::{AsyncBatchStore, AsyncLedger};
use crate::core::catalog::{validate_stock_in, InMemoryCatalog};
use crate::core::config::EngineConfig;
use crate::core::settlement::{self, SettlementStage};
use crate::core::traits::Catalog;
use crate::types::{
    BatchId, EquityEntry, InventoryBatch, ProductId, Quantity, Sale, SaleRequest,
    SettlementError, StockIn, StockKey, VariantId,
};

/// Settlement engine safe to clone and share across tasks
#[derive(Debug)]
pub struct AsyncSettlementEngine<C: Catalog = InMemoryCatalog> {
    catalog: Arc<C>,
    config: EngineConfig,
    store: Arc<AsyncBatchStore>,
    ledger: Arc<AsyncLedger>,
}

impl<C: Catalog> Clone for AsyncSettlementEngine<C> {
    fn clone(&self) -> Self {
        Self {
            catalog: Arc::clone(&self.catalog),
            config: self.config.clone(),
            store: Arc::clone(&self.store),
            ledger: Arc::clone(&self.ledger),
        }
    }
}

/// Label of the ledger lock in `ConcurrencyConflict` errors
const LEDGER_RESOURCE: &str = "sales ledger";

fn describe_keys(keys: &BTreeSet<StockKey>) -> String {
    let keys = keys
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    format!("stock keys [{keys}]")
}

impl<C: Catalog> AsyncSettlementEngine<C> {
    /// Create a new engine with an empty batch store
    pub fn new(catalog: C, config: EngineConfig) -> Self {
        Self::with_catalog(Arc::new(catalog), config)
    }

    /// Create a new engine over a catalog that is already shared
    pub fn with_catalog(catalog: Arc<C>, config: EngineConfig) -> Self {
        Self {
            catalog,
            config,
            store: Arc::new(AsyncBatchStore::new()),
            ledger: Arc::new(AsyncLedger::new()),
        }
    }

    /// Await `future`, failing with `ConcurrencyConflict` on `resource`
    /// after the lock timeout
    async fn bounded<F: Future>(
        &self,
        resource: impl FnOnce() -> String,
        future: F,
    ) -> Result<F::Output, SettlementError> {
        let started = Instant::now();
        match tokio::time::timeout(self.config.lock_timeout, future).await {
            Ok(output) => Ok(output),
            Err(_) => {
                let waited_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                let resource = resource();
                warn!(resource = %resource, waited_ms, "lock not acquired in time");
                Err(SettlementError::concurrency_conflict(resource, waited_ms))
            }
        }
    }

    /// Settle one sale
    ///
    /// Same contract as the sync engine's `settle_sale`, plus:
    ///
    /// # Errors
    ///
    /// Returns `ConcurrencyConflict` if the stock or ledger locks are not
    /// acquired within the configured timeout. Nothing was written; the
    /// request may be retried unchanged.
    pub async fn settle_sale(&self, request: SaleRequest) -> Result<Sale, SettlementError> {
        let marketplace = self
            .config
            .marketplace_for(request.marketplace.as_deref())
            .to_string();

        debug!(stage = %SettlementStage::Validating, items = request.items.len());
        let lines = settlement::validate_request(self.catalog.as_ref(), &request)?;
        let keys = settlement::stock_keys(&lines);

        let mut locks = self.bounded(|| describe_keys(&keys), self.store.lock(&keys)).await?;
        let mut staged = locks.stage();
        let draft =
            settlement::settle_lines(self.catalog.as_ref(), &marketplace, &lines, &mut staged)?;

        debug!(stage = %SettlementStage::Committing);
        let mut ledger = self.bounded(|| LEDGER_RESOURCE.to_string(), self.ledger.lock()).await?;
        locks.apply(staged)?;
        let sale = ledger.record(draft, Utc::now());
        drop(ledger);
        drop(locks);

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
    pub async fn stock_in(&self, stock_in: StockIn) -> Result<InventoryBatch, SettlementError> {
        let key = validate_stock_in(self.catalog.as_ref(), &stock_in)?;
        let batch = self
            .bounded(
                || describe_keys(&BTreeSet::from([key])),
                self.store.receive(stock_in, Utc::now()),
            )
            .await?;
        debug!(batch = batch.id, key = %key, quantity = batch.original_quantity, "stock received");
        Ok(batch)
    }

    /// Administrative edit of a batch's remaining quantity
    pub async fn adjust_remaining(
        &self,
        batch: BatchId,
        remaining: Quantity,
    ) -> Result<InventoryBatch, SettlementError> {
        self.store.adjust_remaining(batch, remaining).await
    }

    /// Σ remaining quantity for a product (and variant)
    pub async fn current_stock(&self, product: ProductId, variant: Option<VariantId>) -> u64 {
        self.store
            .current_stock(&StockKey::new(product, variant))
            .await
    }

    /// Batches of a product (and variant) in FIFO order
    pub async fn batches(
        &self,
        product: ProductId,
        variant: Option<VariantId>,
    ) -> Vec<InventoryBatch> {
        self.store.batches(&StockKey::new(product, variant)).await
    }

    pub async fn sales(&self) -> Vec<Sale> {
        self.ledger.sales().await
    }

    pub async fn equity_entries(&self) -> Vec<EquityEntry> {
        self.ledger.equity_entries().await
    }

    pub async fn equity_total(&self) -> Result<Decimal, SettlementError> {
        self.ledger.equity_total().await
    }

    pub fn store(&self) -> &Arc<AsyncBatchStore> {
        &self.store
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CostingPolicy, ErrorKind, MarketplaceFee, Product, SaleLineRequest};
    use std::time::Duration;

    fn catalog() -> InMemoryCatalog {
        let mut catalog = InMemoryCatalog::new();
        catalog.add_product(Product::new(1, "Mug", Some(CostingPolicy::Fifo), Decimal::new(15, 0)));
        catalog.add_product(Product::new(2, "Plate", Some(CostingPolicy::Lifo), Decimal::new(20, 0)));
        catalog
            .set_fee(MarketplaceFee::new(1, "SHOPEE", Decimal::new(5, 0), Decimal::new(1000, 0)))
            .unwrap();
        catalog
    }

    fn engine(lock_timeout: Duration) -> AsyncSettlementEngine {
        AsyncSettlementEngine::new(catalog(), EngineConfig::new("SHOPEE", lock_timeout))
    }

    fn one(product: ProductId) -> SaleRequest {
        SaleRequest::new(vec![SaleLineRequest::new(product, None, 1)])
    }

    #[tokio::test]
    async fn test_settle_sale_commits_everything() {
        let engine = engine(Duration::from_secs(5));
        engine
            .stock_in(StockIn::new(1, None, 3, Decimal::new(5000, 0), Decimal::new(10000, 0)))
            .await
            .unwrap();

        let request = SaleRequest::new(vec![
            SaleLineRequest::new(1, None, 1),
            SaleLineRequest::new(1, None, 1),
        ]);
        let sale = engine.settle_sale(request).await.unwrap();

        assert_eq!(sale.total_amount, Decimal::new(18000, 0));
        assert_eq!(sale.total_cogs, Decimal::new(10000, 0));
        assert_eq!(engine.current_stock(1, None).await, 1);
        assert_eq!(engine.sales().await, vec![sale.clone()]);
        assert_eq!(engine.equity_total().await.unwrap(), sale.total_amount);
    }

    #[tokio::test]
    async fn test_lock_timeout_is_concurrency_conflict() {
        let engine = engine(Duration::from_millis(20));
        engine
            .stock_in(StockIn::new(1, None, 3, Decimal::ONE, Decimal::ONE))
            .await
            .unwrap();

        let held = engine
            .store()
            .lock(&BTreeSet::from([StockKey::new(1, None)]))
            .await;
        let error = engine.settle_sale(one(1)).await.unwrap_err();
        drop(held);

        assert_eq!(error.kind(), ErrorKind::ConcurrencyConflict);
        assert!(error.is_retryable());
        assert_eq!(engine.current_stock(1, None).await, 3);
        assert!(engine.sales().await.is_empty());

        // Retrying once the lock is free succeeds
        engine.settle_sale(one(1)).await.unwrap();
        assert_eq!(engine.current_stock(1, None).await, 2);
    }

    #[tokio::test]
    async fn test_ledger_timeout_names_the_ledger() {
        let engine = engine(Duration::from_millis(20));
        engine
            .stock_in(StockIn::new(1, None, 3, Decimal::ONE, Decimal::ONE))
            .await
            .unwrap();

        let held = engine.ledger.lock().await;
        let error = engine.settle_sale(one(1)).await.unwrap_err();
        drop(held);

        assert!(matches!(
            &error,
            SettlementError::ConcurrencyConflict { resource, .. } if resource == "sales ledger"
        ));
        assert!(error.is_retryable());
        assert_eq!(engine.current_stock(1, None).await, 3);
        assert!(engine.sales().await.is_empty());
    }

    #[tokio::test]
    async fn test_stock_timeout_names_the_keys() {
        let engine = engine(Duration::from_millis(20));
        let key = StockKey::new(2, None);
        let _held = engine.store().lock(&BTreeSet::from([key])).await;

        let error = engine.settle_sale(one(2)).await.unwrap_err();

        assert!(matches!(
            &error,
            SettlementError::ConcurrencyConflict { resource, .. }
                if resource == &format!("stock keys [{key}]")
        ));
    }

    #[tokio::test]
    async fn test_other_keys_are_not_blocked() {
        let engine = engine(Duration::from_millis(200));
        engine
            .stock_in(StockIn::new(2, None, 1, Decimal::ONE, Decimal::ONE))
            .await
            .unwrap();

        let _held = engine
            .store()
            .lock(&BTreeSet::from([StockKey::new(1, None)]))
            .await;

        assert!(engine.settle_sale(one(2)).await.is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_settlement_changes_nothing() {
        let engine = engine(Duration::from_secs(5));
        engine
            .stock_in(StockIn::new(1, None, 3, Decimal::ONE, Decimal::ONE))
            .await
            .unwrap();

        let held = engine
            .store()
            .lock(&BTreeSet::from([StockKey::new(1, None)]))
            .await;
        let cancelled =
            tokio::time::timeout(Duration::from_millis(20), engine.settle_sale(one(1))).await;
        drop(held);

        assert!(cancelled.is_err());
        assert_eq!(engine.current_stock(1, None).await, 3);
        assert!(engine.equity_entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_validation_errors_need_no_locks() {
        let engine = engine(Duration::from_millis(20));
        let error = engine.settle_sale(one(9)).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_clones_share_state() {
        let engine = engine(Duration::from_secs(5));
        engine
            .stock_in(StockIn::new(2, None, 4, Decimal::ONE, Decimal::new(2, 0)))
            .await
            .unwrap();

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let engine = engine.clone();
                tokio::spawn(async move { engine.settle_sale(one(2)).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(engine.current_stock(2, None).await, 0);
        assert_eq!(engine.sales().await.len(), 4);
        assert_eq!(engine.equity_total().await.unwrap(), Decimal::new(8, 0));
    }
}
