//! Batch processing with stock-key partitioning for concurrent settlement
//!
//! This module provides the `BatchProcessor` struct, which settles a batch of
//! orders concurrently while keeping results identical to settling them one
//! by one in file order.
//!
//! # Design
//!
//! Two orders can only affect each other if they share a stock key. The
//! processor partitions a batch into groups whose key sets are disjoint:
//! orders sharing any key (directly or through a chain of other orders) land
//! in the same group, in their original order. Groups run as separate tokio
//! tasks; orders inside a group run sequentially.
//!
//! # Architecture
//!
//! ```text
//! BatchProcessor
//!     └── AsyncSettlementEngine  (cloneable, shared store and ledger)
//! ```

use std::collections::HashMap;

use tracing::{error, warn};

use super::AsyncSettlementEngine;
use crate::core::traits::Catalog;
use crate::types::{OrderId, Sale, SaleOrder, SettlementError, StockKey};

/// Result of settling a single order
#[derive(Debug, Clone)]
pub struct SettlementOutcome {
    /// The order reference the result belongs to
    pub order: OrderId,

    /// The committed sale, or why nothing was committed
    pub result: Result<Sale, SettlementError>,
}

/// Batch processor with stock-key partitioning
#[derive(Debug)]
pub struct BatchProcessor<C: Catalog> {
    engine: AsyncSettlementEngine<C>,
}

impl<C: Catalog> Clone for BatchProcessor<C> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
        }
    }
}

impl<C: Catalog + 'static> BatchProcessor<C> {
    /// Create a new BatchProcessor
    ///
    /// # Arguments
    ///
    /// * `engine` - Engine whose store and ledger all groups share
    pub fn new(engine: AsyncSettlementEngine<C>) -> Self {
        Self { engine }
    }

    /// Partition a batch of orders into groups with disjoint stock keys
    ///
    /// # Guarantees
    ///
    /// - Each order appears in exactly one group
    /// - Orders sharing a stock key are in the same group
    /// - Orders keep their original relative order inside a group
    /// - Groups are returned in order of their first order
    pub fn partition_by_stock_keys(&self, batch: Vec<SaleOrder>) -> Vec<Vec<SaleOrder>> {
        let mut groups: Vec<Vec<(usize, SaleOrder)>> = Vec::new();
        let mut owner: HashMap<StockKey, usize> = HashMap::new();

        for (seq, order) in batch.into_iter().enumerate() {
            let keys = order.request.stock_keys();

            let mut touched: Vec<usize> = keys.iter().filter_map(|key| owner.get(key).copied()).collect();
            touched.sort_unstable();
            touched.dedup();

            let target = match touched.split_first() {
                Some((&first, rest)) => {
                    for &other in rest {
                        let moved = std::mem::take(&mut groups[other]);
                        groups[first].extend(moved);
                        for group in owner.values_mut() {
                            if *group == other {
                                *group = first;
                            }
                        }
                    }
                    first
                }
                None => {
                    groups.push(Vec::new());
                    groups.len() - 1
                }
            };

            groups[target].push((seq, order));
            for key in keys {
                owner.insert(key, target);
            }
        }

        groups
            .into_iter()
            .filter(|group| !group.is_empty())
            .map(|mut group| {
                group.sort_by_key(|(seq, _)| *seq);
                group.into_iter().map(|(_, order)| order).collect()
            })
            .collect()
    }

    /// Settle the orders of one group sequentially
    ///
    /// Every order is attempted; a failed order is reported in its outcome
    /// and does not stop the group.
    pub async fn process_group(&self, orders: Vec<SaleOrder>) -> Vec<SettlementOutcome> {
        let mut outcomes = Vec::with_capacity(orders.len());

        for SaleOrder { order, request } in orders {
            let result = self.engine.settle_sale(request).await;
            if let Err(e) = &result {
                warn!(order, kind = %e.kind(), error = %e, "order rejected");
            }
            outcomes.push(SettlementOutcome { order, result });
        }

        outcomes
    }

    /// Settle a batch of orders with stock-key partitioning
    ///
    /// # Returns
    ///
    /// One outcome per order. Outcomes are grouped by partition, so callers
    /// that need file order must sort them. If a group's task panics, each of
    /// its orders is reported as a `PersistenceFailure`.
    pub async fn process_batch(&self, batch: Vec<SaleOrder>) -> Vec<SettlementOutcome> {
        let groups = self.partition_by_stock_keys(batch);

        let mut tasks = Vec::with_capacity(groups.len());
        for orders in groups {
            let ids: Vec<OrderId> = orders.iter().map(|o| o.order).collect();
            let processor = self.clone();
            let handle = tokio::spawn(async move { processor.process_group(orders).await });
            tasks.push((ids, handle));
        }

        let mut outcomes = Vec::new();
        for (ids, task) in tasks {
            match task.await {
                Ok(group_outcomes) => outcomes.extend(group_outcomes),
                Err(e) => {
                    error!(error = %e, orders = ids.len(), "settlement task failed");
                    let reason = format!("settlement task failed: {e}");
                    outcomes.extend(ids.into_iter().map(|order| SettlementOutcome {
                        order,
                        result: Err(SettlementError::persistence_failure(reason.clone())),
                    }));
                }
            }
        }

        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::InMemoryCatalog;
    use crate::core::config::EngineConfig;
    use crate::types::{
        CostingPolicy, ErrorKind, MarketplaceFee, Product, ProductId, SaleLineRequest,
        SaleRequest, StockIn, Variant, VariantId,
    };
    use rust_decimal::Decimal;

    /// Catalog whose lookup of one product panics
    #[derive(Debug)]
    struct PanickingCatalog {
        inner: InMemoryCatalog,
        broken: ProductId,
    }

    impl Catalog for PanickingCatalog {
        fn product(&self, id: ProductId) -> Option<Product> {
            assert_ne!(id, self.broken, "catalog lookup failed");
            self.inner.product(id)
        }

        fn variant(&self, id: VariantId) -> Option<Variant> {
            self.inner.variant(id)
        }

        fn marketplace_fee(&self, product: ProductId, marketplace: &str) -> Option<MarketplaceFee> {
            self.inner.marketplace_fee(product, marketplace)
        }
    }

    fn processor() -> BatchProcessor<InMemoryCatalog> {
        let mut catalog = InMemoryCatalog::new();
        for id in 1..=4 {
            catalog.add_product(Product::new(
                id,
                format!("Product {id}"),
                Some(CostingPolicy::Fifo),
                Decimal::new(10, 0),
            ));
        }
        BatchProcessor::new(AsyncSettlementEngine::new(catalog, EngineConfig::default()))
    }

    fn order(order: OrderId, products: &[u32]) -> SaleOrder {
        let items = products
            .iter()
            .map(|&product| SaleLineRequest::new(product, None, 1))
            .collect();
        SaleOrder::new(order, SaleRequest::new(items).on_marketplace("OFFLINE"))
    }

    fn ids(groups: &[Vec<SaleOrder>]) -> Vec<Vec<OrderId>> {
        groups
            .iter()
            .map(|group| group.iter().map(|o| o.order).collect())
            .collect()
    }

    #[test]
    fn test_partition_separates_disjoint_orders() {
        let processor = processor();
        let groups = processor.partition_by_stock_keys(vec![
            order(1, &[1]),
            order(2, &[2]),
            order(3, &[1]),
        ]);

        assert_eq!(ids(&groups), vec![vec![1, 3], vec![2]]);
    }

    #[test]
    fn test_partition_merges_groups_bridged_by_an_order() {
        let processor = processor();
        let groups = processor.partition_by_stock_keys(vec![
            order(1, &[1]),
            order(2, &[2]),
            order(3, &[3]),
            order(4, &[2, 1]),
            order(5, &[2]),
        ]);

        assert_eq!(ids(&groups), vec![vec![1, 2, 4, 5], vec![3]]);
    }

    #[test]
    fn test_partition_keeps_every_order() {
        let processor = processor();
        let batch: Vec<SaleOrder> = (0..20).map(|i| order(i, &[i % 4 + 1])).collect();

        let groups = processor.partition_by_stock_keys(batch);

        assert_eq!(groups.len(), 4);
        assert_eq!(groups.iter().map(Vec::len).sum::<usize>(), 20);
    }

    #[test]
    fn test_partition_empty_request_gets_own_group() {
        let processor = processor();
        let empty = SaleOrder::new(9, SaleRequest::default());
        let groups = processor.partition_by_stock_keys(vec![order(1, &[1]), empty]);

        assert_eq!(ids(&groups), vec![vec![1], vec![9]]);
    }

    #[tokio::test]
    async fn test_process_group_continues_after_failure() {
        let processor = processor();
        processor
            .engine
            .stock_in(StockIn::new(1, None, 1, Decimal::ONE, Decimal::new(10, 0)))
            .await
            .unwrap();

        let outcomes = processor
            .process_group(vec![order(1, &[1]), order(2, &[1]), order(3, &[9])])
            .await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].result.is_ok());
        assert!(matches!(
            outcomes[1].result,
            Err(SettlementError::InsufficientStock { .. })
        ));
        assert!(matches!(
            outcomes[2].result,
            Err(SettlementError::ProductNotFound { .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_process_batch_matches_sequential_order() {
        let processor = processor();
        for product in 1..=2 {
            processor
                .engine
                .stock_in(StockIn::new(product, None, 2, Decimal::ONE, Decimal::new(10, 0)))
                .await
                .unwrap();
        }

        let batch = vec![
            order(1, &[1]),
            order(2, &[2]),
            order(3, &[1]),
            order(4, &[2]),
            order(5, &[1]),
        ];
        let mut outcomes = processor.process_batch(batch).await;
        outcomes.sort_by_key(|outcome| outcome.order);

        let settled: Vec<bool> = outcomes.iter().map(|o| o.result.is_ok()).collect();
        assert_eq!(settled, vec![true, true, true, true, false]);
        assert_eq!(processor.engine.current_stock(1, None).await, 0);
        assert_eq!(processor.engine.current_stock(2, None).await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_panicked_group_reports_every_order() {
        let mut inner = InMemoryCatalog::new();
        for id in 1..=2 {
            inner.add_product(Product::new(
                id,
                format!("Product {id}"),
                Some(CostingPolicy::Fifo),
                Decimal::new(10, 0),
            ));
        }
        let catalog = PanickingCatalog { inner, broken: 2 };
        let processor =
            BatchProcessor::new(AsyncSettlementEngine::new(catalog, EngineConfig::default()));
        processor
            .engine
            .stock_in(StockIn::new(1, None, 5, Decimal::ONE, Decimal::new(10, 0)))
            .await
            .unwrap();

        let batch = vec![order(1, &[1]), order(2, &[2]), order(3, &[1]), order(4, &[2])];
        let mut outcomes = processor.process_batch(batch).await;
        outcomes.sort_by_key(|outcome| outcome.order);

        let orders: Vec<OrderId> = outcomes.iter().map(|o| o.order).collect();
        assert_eq!(orders, vec![1, 2, 3, 4]);
        assert!(outcomes[0].result.is_ok());
        assert!(outcomes[2].result.is_ok());
        for lost in [&outcomes[1], &outcomes[3]] {
            let error = lost.result.as_ref().unwrap_err();
            assert_eq!(error.kind(), ErrorKind::PersistenceFailure);
            assert!(error.is_retryable());
        }
        assert_eq!(processor.engine.current_stock(1, None).await, 3);
    }
}
