//! Sale Settlement Engine Library
//! # Overview
//!
//! This library settles marketplace sales against cost-tracked inventory
//! batches, with a sequential strategy and a concurrent batch strategy.
//!
//! # Architecture
//!
//! The system is organized into several key components:
//!
//! - [`types`] - Core data types (Product, InventoryBatch, Sale, etc.)
//! - [`cli`] - CLI arguments parsing
//! - [`core`] - Business logic components:
//!   - [`core::allocator`] - FIFO/LIFO batch allocation
//!   - [`core::fee_resolver`] - Marketplace fee deductions
//!   - [`core::settlement`] - The settlement pipeline shared by both engines
//!   - [`core::engine`] - Synchronous settlement orchestration
//!   - [`core::r#async`] - Per-stock-key locking and concurrent settlement
//! - [`io`] - CSV catalog and order readers, settlement output
//! - [`strategy`] - Complete sync and async processing pipelines
//!
//! # Settlement
//!
//! Settling a sale:
//!
//! - Resolves each line to a product or variant stock key
//! - Allocates the quantity across batches oldest-first (FIFO) or
//!   newest-first (LIFO), according to the product's costing policy
//! - Deducts the marketplace percentage fee from every line and the flat
//!   process fee once per sale per marketplace
//! - Commits the sale, its items, the batch decrements and one equity entry
//!   together, or nothing at all
//!
//! # Stock
//!
//! The current stock of a product or variant is the sum of the remaining
//! quantities of its batches. A batch's remaining quantity never exceeds its
//! original quantity.

// Module declarations
pub mod cli;
pub mod core;
pub mod io;
pub mod strategy;
pub mod types;

pub use core::{
    AsyncSettlementEngine, BatchStore, Catalog, EngineConfig, InMemoryCatalog, SettlementEngine,
};
pub use io::write_settlements_csv;
pub use types::{
    CostingPolicy, ErrorKind, InventoryBatch, MarketplaceFee, Product, Sale, SaleItem,
    SaleLineRequest, SaleRequest, SettlementError, StockIn, StockKey, Variant,
};
