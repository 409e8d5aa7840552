//! Concurrent implementations of the core components
//!
//! This module provides thread-safe versions of the batch store and the sales
//! ledger, the engine that settles sales against them from many tasks, and
//! the batch processor the async strategy drives it with.
//!
//! # Architecture
//!
//! - **AsyncBatchStore**: Per-stock-key async mutexes held in a DashMap
//! - **AsyncLedger**: Sales and equity entries behind one async mutex
//! - **AsyncSettlementEngine**: Lock, stage, settle and commit
//! - **BatchProcessor**: Runs orders with disjoint stock keys in parallel
//!
//! # Thread Safety
//!
//! Settlements touching different stock keys never block each other. Those
//! sharing a key are serialized by that key's lock, acquired in key order.

pub mod batch_processor;
pub mod batch_store;
pub mod engine;
pub mod ledger;

pub use batch_processor::{BatchProcessor, SettlementOutcome};
pub use batch_store::{AsyncBatchStore, StockLocks};
pub use engine::AsyncSettlementEngine;
pub use ledger::AsyncLedger;
