use crate::core::config::{DEFAULT_LOCK_TIMEOUT, DEFAULT_MARKETPLACE};
use crate::core::EngineConfig;
use crate::strategy::BatchConfig;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Settle marketplace sales against batch inventory
#[derive(Parser, Debug)]
#[command(name = "sale-settlement-engine")]
#[command(about = "Settle marketplace sales against FIFO/LIFO inventory batches", long_about = None)]
pub struct CliArgs {
    /// Orders CSV file path, one row per sale line
    #[arg(value_name = "ORDERS", help = "Path to the orders CSV file")]
    pub orders_file: PathBuf,

    /// Catalog CSV with products, variants, fees and opening batches
    #[arg(
        long = "catalog",
        value_name = "CATALOG",
        help = "Path to the catalog CSV file"
    )]
    pub catalog_file: PathBuf,

    /// Processing strategy to use for settling orders
    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "async",
        help = "Processing strategy: 'sync' for sequential or 'async' for concurrent settlement"
    )]
    pub strategy: StrategyType,

    /// Number of orders per batch (async mode only)
    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of orders per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    /// Number of worker threads (async mode only)
    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Number of worker threads settling orders (default: CPU cores)"
    )]
    pub max_concurrent_batches: Option<usize>,

    /// Marketplace whose fees apply to every order
    #[arg(
        long = "marketplace",
        value_name = "NAME",
        default_value = DEFAULT_MARKETPLACE,
        help = "Marketplace used for fee lookup"
    )]
    pub marketplace: String,

    /// Stock lock wait bound in milliseconds (async mode only)
    #[arg(
        long = "lock-timeout-ms",
        value_name = "MILLIS",
        default_value_t = DEFAULT_LOCK_TIMEOUT.as_millis() as u64,
        help = "How long a settlement waits for its stock locks"
    )]
    pub lock_timeout_ms: u64,
}

/// Available processing strategies
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    Sync,
    Async,
}

impl CliArgs {
    /// Create a BatchConfig from CLI arguments
    ///
    /// Missing values fall back to the defaults. Zero values are replaced by
    /// `BatchConfig::new`, which logs a warning.
    pub fn to_batch_config(&self) -> BatchConfig {
        if self.batch_size.is_some() || self.max_concurrent_batches.is_some() {
            let default = BatchConfig::default();
            BatchConfig::new(
                self.batch_size.unwrap_or(default.batch_size),
                self.max_concurrent_batches
                    .unwrap_or(default.max_concurrent_batches),
            )
        } else {
            BatchConfig::default()
        }
    }

    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig::new(
            self.marketplace.clone(),
            Duration::from_millis(self.lock_timeout_ms),
        )
    }
}
