//! Asynchronous batch processing strategy
//!
//! This module provides a multi-threaded implementation of the
//! ProcessingStrategy trait. Orders are read in batches and settled with
//! stock-key partitioning.
//!
//! # Architecture
//!
//! ```text
//! AsyncProcessingStrategy
//!     ├── BatchConfig (batch_size, max_concurrent_batches)
//!     ├── AsyncReader (batch CSV reading)
//!     ├── BatchProcessor (stock-key partitioning + tasks)
//!     └── AsyncSettlementEngine (per-key locked store, shared ledger)
//! ```
//!
//! # Ordering
//!
//! Batches are processed one after another. Inside a batch, orders that
//! share a stock key run sequentially in file order and unrelated orders run
//! in parallel, so every order sees the same stock it would under the sync
//! strategy and the output is identical.

use crate::core::{AsyncSettlementEngine, BatchProcessor, EngineConfig};
use crate::io::async_reader::AsyncReader;
use crate::io::catalog_reader::read_catalog;
use crate::io::csv_format::write_settlements_csv;
use crate::io::open_error;
use crate::strategy::ProcessingStrategy;
use crate::types::SettlementError;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

/// Configuration for batch processing
///
/// Controls how many orders are read per batch and the number of worker
/// threads settling them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchConfig {
    /// Number of orders per batch
    pub batch_size: usize,
    /// Number of runtime worker threads
    pub max_concurrent_batches: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent_batches: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Create a new BatchConfig; zero values fall back to the defaults
    pub fn new(batch_size: usize, max_concurrent_batches: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(
                batch_size,
                default = default.batch_size,
                "invalid batch_size, using default"
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent_batches = if max_concurrent_batches == 0 {
            warn!(
                max_concurrent_batches,
                default = default.max_concurrent_batches,
                "invalid max_concurrent_batches, using default"
            );
            default.max_concurrent_batches
        } else {
            max_concurrent_batches
        };

        Self {
            batch_size,
            max_concurrent_batches,
        }
    }
}

/// Asynchronous batch processing strategy
#[derive(Debug, Clone)]
pub struct AsyncProcessingStrategy {
    config: BatchConfig,
    engine: EngineConfig,
}

impl AsyncProcessingStrategy {
    /// Create a new AsyncProcessingStrategy
    ///
    /// # Arguments
    ///
    /// * `config` - BatchConfig with batch_size and max_concurrent_batches
    /// * `engine` - Settings passed to the settlement engine
    pub fn new(config: BatchConfig, engine: EngineConfig) -> Self {
        Self { config, engine }
    }
}

impl ProcessingStrategy for AsyncProcessingStrategy {
    /// Settle all orders with batched, partitioned concurrency
    ///
    /// 1. Creates a tokio multi-threaded runtime
    /// 2. Loads the catalog and receives its batches in file order
    /// 3. Reads orders in batches using AsyncReader
    /// 4. Settles each batch through the BatchProcessor, waiting before the next
    /// 5. Writes the outcomes sorted by order id
    fn process(
        &self,
        catalog_path: &Path,
        orders_path: &Path,
        output: &mut dyn Write,
    ) -> Result<(), SettlementError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.max_concurrent_batches)
            .enable_time()
            .build()?;

        runtime.block_on(async {
            let book = read_catalog(catalog_path)?;
            let engine = AsyncSettlementEngine::new(book.catalog, self.engine.clone());

            for stock_in in book.stock {
                if let Err(e) = engine.stock_in(stock_in).await {
                    warn!(error = %e, "stock-in rejected");
                }
            }

            let processor = BatchProcessor::new(engine.clone());

            let file = tokio::fs::File::open(orders_path)
                .await
                .map_err(|e| open_error(orders_path, e))?;

            // Wrap tokio file in a compatibility layer for csv-async
            let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
            let mut reader = AsyncReader::new(compat_file);

            let mut outcomes = Vec::new();
            loop {
                let batch = reader.read_batch(self.config.batch_size).await;
                if batch.is_empty() {
                    break;
                }

                debug!(orders = batch.len(), "settling batch");
                outcomes.extend(processor.process_batch(batch).await);
            }

            info!(
                orders = outcomes.len(),
                settled = engine.sales().await.len(),
                equity = ?engine.equity_total().await.ok(),
                "settlement run complete"
            );

            write_settlements_csv(&outcomes, output)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::SyncProcessingStrategy;
    use rstest::rstest;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const CATALOG: &str = "type,product,variant,name,policy,quantity,cost,price,marketplace,percentage,process_fee\n\
                           product,1,,Mug,FIFO,,,15,,,\n\
                           product,2,,Plate,LIFO,,,20,,,\n\
                           product,3,,Bowl,FIFO,,,30,,,\n\
                           fee,3,,,,,,,SHOPEE,5,1000\n\
                           batch,1,,,,5,10,15,,,\n\
                           batch,1,,,,5,12,15,,,\n\
                           batch,2,,,,3,8,20,,,\n\
                           batch,3,,,,4,5000,10000,,,\n";

    const ORDERS: &str = "order,product,variant,quantity\n\
                          1,1,,3\n\
                          2,2,,2\n\
                          3,1,,3\n\
                          4,3,,1\n\
                          4,3,,1\n\
                          5,2,,2\n\
                          6,1,,3\n\
                          7,1,,1\n\
                          7,2,,1\n";

    /// Helper function to create a temporary CSV file for testing
    fn create_temp_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("Failed to write to temp file");
        file.flush().expect("Failed to flush temp file");
        file
    }

    fn run(strategy: &dyn ProcessingStrategy) -> String {
        let catalog = create_temp_csv(CATALOG);
        let orders = create_temp_csv(ORDERS);
        let mut output = Vec::new();
        strategy
            .process(catalog.path(), orders.path(), &mut output)
            .unwrap();
        String::from_utf8(output).unwrap()
    }

    #[rstest]
    #[case::single_order_batches(1)]
    #[case::small_batches(2)]
    #[case::one_batch(1000)]
    fn test_async_strategy_matches_sync(#[case] batch_size: usize) {
        let expected = run(&SyncProcessingStrategy::new(EngineConfig::default()));
        let actual = run(&AsyncProcessingStrategy::new(
            BatchConfig::new(batch_size, 4),
            EngineConfig::default(),
        ));

        assert_eq!(actual, expected);
    }

    #[test]
    fn test_async_strategy_output() {
        let output = run(&AsyncProcessingStrategy::new(
            BatchConfig::default(),
            EngineConfig::default(),
        ));
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines.len(), 8);
        assert_eq!(lines[1], "1,settled,45.0000,30.0000,15.0000");
        assert_eq!(lines[3], "3,settled,45.0000,32.0000,13.0000");
        assert_eq!(lines[4], "4,settled,18000.0000,10000.0000,8000.0000");
        assert_eq!(lines[5], "5,insufficient_stock,,,");
        assert_eq!(lines[6], "6,settled,45.0000,36.0000,9.0000");
        assert_eq!(lines[7], "7,settled,35.0000,20.0000,15.0000");
    }

    #[test]
    fn test_async_strategy_handles_missing_file() {
        let catalog = create_temp_csv(CATALOG);
        let strategy = AsyncProcessingStrategy::new(BatchConfig::default(), EngineConfig::default());
        let mut output = Vec::new();

        let result = strategy.process(catalog.path(), Path::new("nonexistent.csv"), &mut output);
        assert!(matches!(
            result.unwrap_err(),
            SettlementError::FileNotFound { .. }
        ));
    }

    #[rstest]
    #[case::zero_batch_size(0, 4, 1000, 4)]
    #[case::zero_workers(10, 0, 10, num_cpus::get())]
    fn test_batch_config_zero_values_fall_back(
        #[case] batch_size: usize,
        #[case] workers: usize,
        #[case] expected_batch_size: usize,
        #[case] expected_workers: usize,
    ) {
        let config = BatchConfig::new(batch_size, workers);
        assert_eq!(config.batch_size, expected_batch_size);
        assert_eq!(config.max_concurrent_batches, expected_workers);
    }
}
