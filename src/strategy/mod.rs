//! Processing strategy module for settlement runs
//!
//! This module defines the Strategy pattern for complete settlement pipelines,
//! covering catalog loading, order parsing, settlement and output. This allows
//! different processing implementations (synchronous, asynchronous batch) to
//! be selected at runtime.

use crate::cli::StrategyType;
use crate::core::EngineConfig;
use crate::types::SettlementError;
use std::io::Write;
use std::path::Path;

pub mod r#async;
pub mod sync;

pub use self::r#async::{AsyncProcessingStrategy, BatchConfig};
pub use sync::SyncProcessingStrategy;

/// Processing strategy trait for complete settlement pipelines
///
/// Each strategy loads the catalog and its stock, settles every order from
/// the orders file through the appropriate engine, and writes one outcome
/// row per order.
pub trait ProcessingStrategy: Send + Sync {
    /// Settle the orders in `orders_path` against the catalog in `catalog_path`
    ///
    /// # Arguments
    ///
    /// * `catalog_path` - Catalog CSV with products, variants, fees and batches
    /// * `orders_path` - Orders CSV, one row per sale line
    /// * `output` - Writer for the settlement outcome CSV
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Either input file cannot be opened
    /// - The runtime cannot be created
    /// - Output cannot be written
    ///
    /// Rejected orders and malformed rows are not errors here; they are
    /// logged and reported in the output.
    fn process(
        &self,
        catalog_path: &Path,
        orders_path: &Path,
        output: &mut dyn Write,
    ) -> Result<(), SettlementError>;
}

/// Create a processing strategy based on the specified strategy type
///
/// # Arguments
///
/// * `strategy_type` - The type of processing strategy to create (Sync or Async)
/// * `config` - Optional configuration for async batch processing (ignored for sync)
/// * `engine` - Settings passed to the settlement engine
pub fn create_strategy(
    strategy_type: StrategyType,
    config: Option<BatchConfig>,
    engine: EngineConfig,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sync => Box::new(SyncProcessingStrategy::new(engine)),
        StrategyType::Async => {
            let config = config.unwrap_or_default();
            Box::new(AsyncProcessingStrategy::new(config, engine))
        }
    }
}
