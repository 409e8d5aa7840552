//! Synchronous processing strategy
//!
//! This module provides a single-threaded implementation of the
//! ProcessingStrategy trait. It delegates:
//! - Catalog loading to `catalog_reader::read_catalog`
//! - Order parsing to `SyncReader` and `OrderGrouper` (iterator interface)
//! - Settlement to `SettlementEngine`
//! - CSV output to `csv_format::write_settlements_csv`
//!
//! Orders are settled strictly in file order.

use crate::core::{EngineConfig, SettlementEngine, SettlementOutcome};
use crate::io::catalog_reader::read_catalog;
use crate::io::csv_format::write_settlements_csv;
use crate::io::sync_reader::{OrderGrouper, SyncReader};
use crate::strategy::ProcessingStrategy;
use crate::types::{SaleOrder, SettlementError};
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

/// Synchronous processing strategy
///
/// # Examples
///
/// ```no_run
/// use sale_settlement_engine::core::EngineConfig;
/// use sale_settlement_engine::strategy::{ProcessingStrategy, SyncProcessingStrategy};
/// use std::path::Path;
/// use std::io;
///
/// let strategy = SyncProcessingStrategy::new(EngineConfig::default());
/// let mut output = io::stdout();
///
/// strategy
///     .process(Path::new("catalog.csv"), Path::new("orders.csv"), &mut output)
///     .expect("Processing failed");
/// ```
#[derive(Debug, Clone, Default)]
pub struct SyncProcessingStrategy {
    engine: EngineConfig,
}

impl SyncProcessingStrategy {
    pub fn new(engine: EngineConfig) -> Self {
        Self { engine }
    }
}

impl ProcessingStrategy for SyncProcessingStrategy {
    /// Settle all orders on one `SettlementEngine`
    ///
    /// 1. Loads the catalog and receives its batches in file order
    /// 2. Streams order lines, grouping consecutive rows into sales
    /// 3. Settles each sale, recording its outcome
    /// 4. Writes the outcomes sorted by order id
    fn process(
        &self,
        catalog_path: &Path,
        orders_path: &Path,
        output: &mut dyn Write,
    ) -> Result<(), SettlementError> {
        let book = read_catalog(catalog_path)?;
        let mut engine = SettlementEngine::new(book.catalog, self.engine.clone());

        for stock_in in book.stock {
            if let Err(e) = engine.stock_in(stock_in) {
                warn!(error = %e, "stock-in rejected");
            }
        }

        let reader = SyncReader::new(orders_path)?;
        let lines = reader.filter_map(|result| match result {
            Ok(line) => Some(line),
            Err(e) => {
                warn!(error = %e, "skipping malformed order row");
                None
            }
        });

        let mut outcomes = Vec::new();
        for SaleOrder { order, request } in OrderGrouper::new(lines) {
            let result = engine.settle_sale(request);
            if let Err(e) = &result {
                warn!(order, kind = %e.kind(), error = %e, "order rejected");
            }
            outcomes.push(SettlementOutcome { order, result });
        }

        info!(
            orders = outcomes.len(),
            settled = engine.sales().len(),
            equity = ?engine.equity_total().ok(),
            "settlement run complete"
        );

        write_settlements_csv(&outcomes, output)
    }
}
