//! Core settlement logic module
//!
//! This module contains the sale settlement components:
//! - `traits` - The `Catalog` abstraction over product, variant and fee records
//! - `catalog` - In-memory catalog and stock key resolution
//! - `allocator` - FIFO/LIFO batch allocation
//! - `fee_resolver` - Marketplace fee lookup and once-per-sale flat fees
//! - `settlement` - Validation, staging and aggregation shared by both engines
//! - `batch_store` - Inventory batch storage
//! - `equity_ledger` / `sales_ledger` - Committed sales and equity postings
//! - `engine` - Synchronous settlement orchestration
//! - `async` - Concurrent implementations

pub mod allocator;
pub mod r#async;
pub mod batch_store;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod equity_ledger;
pub mod fee_resolver;
pub mod sales_ledger;
pub mod settlement;
pub mod traits;

pub use batch_store::BatchStore;
pub use catalog::InMemoryCatalog;
pub use config::EngineConfig;
pub use engine::SettlementEngine;
pub use equity_ledger::EquityLedger;
pub use r#async::{AsyncBatchStore, AsyncSettlementEngine, BatchProcessor, SettlementOutcome};
pub use sales_ledger::SalesLedger;
pub use traits::Catalog;
