//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `product`: Products, variants, marketplace fees and costing policies
//! - `batch`: Inventory batches and stock-in requests
//! - `sale`: Sale requests and committed sales
//! - `equity`: Equity ledger entries
//! - `error`: Error types for the settlement engine

pub mod batch;
pub mod equity;
pub mod error;
pub mod product;
pub mod sale;

pub use batch::{BatchId, InventoryBatch, StockIn};
pub use equity::{EntryId, EquityEntry};
pub use error::{ErrorKind, SettlementError};
pub use product::{
    CostingPolicy, MarketplaceFee, Product, ProductId, Quantity, StockKey, Variant, VariantId,
};
pub use sale::{OrderId, Sale, SaleId, SaleItem, SaleLineRequest, SaleOrder, SaleRequest};
