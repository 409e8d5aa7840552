//! Error types for the Sale Settlement Engine
//!
//! This module defines every error a settlement, a stock-in or the CSV driver
//! can report. Each variant carries enough context to identify the offending
//! sale line (its 0-based item index) or record.
//!
//! # Error Categories
//!
//! - **Input Errors**: File not found, I/O failures, malformed CSV
//! - **Not Found**: Unknown product, variant or batch
//! - **Bad Request**: Variant/product mismatch, non-positive quantity, invalid amounts
//! - **Configuration**: Product without a costing policy
//! - **Insufficient Stock**: A line asks for more units than the batches hold
//! - **Concurrency Conflict**: Stock locks could not be acquired in time
//! - **Persistence Failure**: Commit could not be applied; nothing was written

use super::batch::BatchId;
use super::product::{ProductId, Quantity, VariantId};
use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;

/// Main error type for the settlement engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SettlementError {
    /// File not found at the specified path
    #[error("File not found: {path}")]
    FileNotFound {
        /// The path that was not found
        path: String,
    },

    /// I/O error occurred while reading or writing files
    #[error("I/O error: {message}")]
    IoError {
        /// Description of the I/O error
        message: String,
    },

    /// CSV parsing or record conversion error
    ///
    /// The malformed record is skipped and processing continues.
    #[error("CSV parse error{}: {message}", line.map(|l| format!(" at line {}", l)).unwrap_or_default())]
    ParseError {
        /// Line number where the error occurred (if available)
        line: Option<u64>,
        /// Description of the parsing error
        message: String,
    },

    /// A sale request without any items
    #[error("Sale request has no items")]
    EmptySale,

    /// Referenced product does not exist
    #[error("Product {product} not found{}", item_suffix(*item))]
    ProductNotFound {
        /// Item index within the sale request, if raised during settlement
        item: Option<usize>,
        product: ProductId,
    },

    /// Referenced variant does not exist
    #[error("Variant {variant} not found{}", item_suffix(*item))]
    VariantNotFound {
        item: Option<usize>,
        variant: VariantId,
    },

    /// Referenced variant belongs to a different product
    #[error("Variant {variant} belongs to product {owner}, not product {product}{}", item_suffix(*item))]
    VariantMismatch {
        item: Option<usize>,
        variant: VariantId,
        /// Product named in the request
        product: ProductId,
        /// Product the variant actually belongs to
        owner: ProductId,
    },

    /// Quantity is zero, negative or out of range
    #[error("Invalid quantity {quantity}{}", item_suffix(*item))]
    InvalidQuantity { item: Option<usize>, quantity: i64 },

    /// A price, cost or fee amount is outside its allowed range
    #[error("Invalid {field} '{value}'")]
    InvalidAmount {
        /// Name of the offending field
        field: String,
        value: Decimal,
    },

    /// Product has no costing policy configured
    #[error("Product {product} has no costing policy configured")]
    MissingCostingPolicy { product: ProductId },

    /// Batch referenced by an administrative edit does not exist
    #[error("Batch {batch} not found")]
    BatchNotFound { batch: BatchId },

    /// Administrative edit would move remaining quantity out of range
    #[error("Cannot set batch {batch} remaining quantity to {requested}: original quantity is {original}")]
    InvalidAdjustment {
        batch: BatchId,
        requested: Quantity,
        original: Quantity,
    },

    /// Requested quantity exceeds the remaining stock of the line's batches
    #[error(
        "Insufficient stock for product {product}{} at item {item}: available {available}, requested {requested}",
        variant.map(|v| format!(" variant {}", v)).unwrap_or_default()
    )]
    InsufficientStock {
        item: usize,
        product: ProductId,
        variant: Option<VariantId>,
        available: u64,
        requested: Quantity,
    },

    /// Stock locks could not be acquired within the configured timeout
    #[error("Concurrency conflict on {resource}: lock not acquired within {waited_ms}ms")]
    ConcurrencyConflict {
        /// What the settlement was waiting for (stock keys or the sales ledger)
        resource: String,
        waited_ms: u64,
    },

    /// Commit could not be applied; nothing was written
    #[error("Persistence failure: {message}")]
    PersistenceFailure { message: String },

    /// Arithmetic overflow in money or quantity computation
    #[error("Arithmetic overflow in {operation}")]
    ArithmeticOverflow { operation: String },
}

fn item_suffix(item: Option<usize>) -> String {
    item.map(|i| format!(" at item {}", i)).unwrap_or_default()
}

/// Coarse classification of a `SettlementError`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Input,
    NotFound,
    BadRequest,
    Configuration,
    InsufficientStock,
    ConcurrencyConflict,
    PersistenceFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Input => "input",
            ErrorKind::NotFound => "not_found",
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::Configuration => "configuration",
            ErrorKind::InsufficientStock => "insufficient_stock",
            ErrorKind::ConcurrencyConflict => "concurrency_conflict",
            ErrorKind::PersistenceFailure => "persistence_failure",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SettlementError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SettlementError::FileNotFound { .. }
            | SettlementError::IoError { .. }
            | SettlementError::ParseError { .. } => ErrorKind::Input,
            SettlementError::ProductNotFound { .. }
            | SettlementError::VariantNotFound { .. }
            | SettlementError::BatchNotFound { .. } => ErrorKind::NotFound,
            SettlementError::EmptySale
            | SettlementError::VariantMismatch { .. }
            | SettlementError::InvalidQuantity { .. }
            | SettlementError::InvalidAmount { .. }
            | SettlementError::InvalidAdjustment { .. } => ErrorKind::BadRequest,
            SettlementError::MissingCostingPolicy { .. } => ErrorKind::Configuration,
            SettlementError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
            SettlementError::ConcurrencyConflict { .. } => ErrorKind::ConcurrencyConflict,
            SettlementError::PersistenceFailure { .. }
            | SettlementError::ArithmeticOverflow { .. } => ErrorKind::PersistenceFailure,
        }
    }

    /// Whether re-running the whole settlement may succeed
    ///
    /// Nothing is ever partially committed, so a retryable failure can be
    /// re-submitted from the start unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ConcurrencyConflict | ErrorKind::PersistenceFailure
        )
    }
}

// Conversion from io::Error to SettlementError
impl From<std::io::Error> for SettlementError {
    fn from(error: std::io::Error) -> Self {
        SettlementError::IoError {
            message: error.to_string(),
        }
    }
}

// Conversion from csv::Error to SettlementError
impl From<csv::Error> for SettlementError {
    fn from(error: csv::Error) -> Self {
        let line = error.position().map(|pos| pos.line());

        SettlementError::ParseError {
            line,
            message: error.to_string(),
        }
    }
}

// Helper functions for creating common errors

impl SettlementError {
    pub fn product_not_found(item: Option<usize>, product: ProductId) -> Self {
        SettlementError::ProductNotFound { item, product }
    }

    pub fn variant_not_found(item: Option<usize>, variant: VariantId) -> Self {
        SettlementError::VariantNotFound { item, variant }
    }

    pub fn variant_mismatch(
        item: Option<usize>,
        variant: VariantId,
        product: ProductId,
        owner: ProductId,
    ) -> Self {
        SettlementError::VariantMismatch {
            item,
            variant,
            product,
            owner,
        }
    }

    pub fn invalid_quantity(item: Option<usize>, quantity: i64) -> Self {
        SettlementError::InvalidQuantity { item, quantity }
    }

    pub fn invalid_amount(field: &str, value: Decimal) -> Self {
        SettlementError::InvalidAmount {
            field: field.to_string(),
            value,
        }
    }

    pub fn missing_costing_policy(product: ProductId) -> Self {
        SettlementError::MissingCostingPolicy { product }
    }

    pub fn batch_not_found(batch: BatchId) -> Self {
        SettlementError::BatchNotFound { batch }
    }

    pub fn invalid_adjustment(batch: BatchId, requested: Quantity, original: Quantity) -> Self {
        SettlementError::InvalidAdjustment {
            batch,
            requested,
            original,
        }
    }

    pub fn insufficient_stock(
        item: usize,
        product: ProductId,
        variant: Option<VariantId>,
        available: u64,
        requested: Quantity,
    ) -> Self {
        SettlementError::InsufficientStock {
            item,
            product,
            variant,
            available,
            requested,
        }
    }

    pub fn concurrency_conflict(resource: impl Into<String>, waited_ms: u64) -> Self {
        SettlementError::ConcurrencyConflict {
            resource: resource.into(),
            waited_ms,
        }
    }

    pub fn persistence_failure(message: impl Into<String>) -> Self {
        SettlementError::PersistenceFailure {
            message: message.into(),
        }
    }

    pub fn arithmetic_overflow(operation: &str) -> Self {
        SettlementError::ArithmeticOverflow {
            operation: operation.to_string(),
        }
    }

    pub fn parse_error(line: Option<u64>, message: impl Into<String>) -> Self {
        SettlementError::ParseError {
            line,
            message: message.into(),
        }
    }
}
