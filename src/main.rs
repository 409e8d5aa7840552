//! Sale Settlement Engine CLI
//!
//! Settles marketplace sales from a CSV file against a catalog of products,
//! fees and inventory batches.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- --catalog catalog.csv orders.csv > settlements.csv
//! cargo run -- --strategy sync --catalog catalog.csv orders.csv > settlements.csv
//! cargo run -- --strategy async --batch-size 2000 --max-concurrent 8 --catalog catalog.csv orders.csv
//! RUST_LOG=debug cargo run -- --marketplace TOKOPEDIA --catalog catalog.csv orders.csv
//! ```
//!
//! One row per order is written to stdout. Logs go to stderr and are filtered
//! through `RUST_LOG` (default `warn`).
//!
//! # Exit Codes
//!
//! - 0: Success, including runs where individual orders were rejected
//! - 1: Error (missing arguments, file not found, file not readable, etc.)

use sale_settlement_engine::cli;
use sale_settlement_engine::strategy;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = cli::parse_args();

    let strategy = {
        let config = if matches!(args.strategy, cli::StrategyType::Async) {
            Some(args.to_batch_config())
        } else {
            None
        };
        strategy::create_strategy(args.strategy, config, args.to_engine_config())
    };

    let mut output = std::io::stdout();
    if let Err(e) = strategy.process(&args.catalog_file, &args.orders_file, &mut output) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
