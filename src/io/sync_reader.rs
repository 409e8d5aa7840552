//! Synchronous CSV reader with iterator interface
//!
//! Provides a streaming iterator over order lines from a CSV file, and an
//! adapter that groups consecutive lines of the same order into one sale.
//!
//! # Iterator Interface
//!
//! `SyncReader` yields `Result<OrderLine, SettlementError>` for each CSV row:
//!
//! ```no_run
//! use sale_settlement_engine::io::sync_reader::SyncReader;
//! use std::path::Path;
//!
//! let reader = SyncReader::new(Path::new("orders.csv")).unwrap();
//! for result in reader {
//!     match result {
//!         Ok(line) => println!("order {}: {:?}", line.order, line.line),
//!         Err(e) => eprintln!("Error: {}", e),
//!     }
//! }
//! ```
//!
//! # Error Handling
//!
//! - Fatal errors (file not found, I/O errors) are returned from `new()`
//! - Individual row errors are yielded as `ParseError` with the line number

use crate::io::csv_format::{OrderCsvRecord, OrderLine};
use crate::io::open_csv;
use crate::types::{SaleOrder, SaleRequest, SettlementError};
use std::fs::File;
use std::iter::Peekable;
use std::path::Path;

/// Synchronous orders CSV reader
#[derive(Debug)]
pub struct SyncReader {
    reader: csv::Reader<File>,
}

impl SyncReader {
    /// Open an orders CSV file for streaming
    ///
    /// # Errors
    ///
    /// Returns `FileNotFound` or `IoError` if the file cannot be opened.
    pub fn new(path: &Path) -> Result<Self, SettlementError> {
        Ok(Self {
            reader: open_csv(path)?,
        })
    }
}

impl Iterator for SyncReader {
    type Item = Result<OrderLine, SettlementError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut deserializer = self.reader.deserialize::<OrderCsvRecord>();
        Some(deserializer.next()?.map(OrderLine::from).map_err(SettlementError::from))
    }
}

/// Groups consecutive order lines with the same order id into sale orders
///
/// Only adjacent lines are merged; an order id that reappears later in the
/// stream starts a new sale.
#[derive(Debug)]
pub struct OrderGrouper<I: Iterator<Item = OrderLine>> {
    lines: Peekable<I>,
}

impl<I: Iterator<Item = OrderLine>> OrderGrouper<I> {
    pub fn new(lines: I) -> Self {
        Self {
            lines: lines.peekable(),
        }
    }
}

impl<I: Iterator<Item = OrderLine>> Iterator for OrderGrouper<I> {
    type Item = SaleOrder;

    fn next(&mut self) -> Option<Self::Item> {
        let first = self.lines.next()?;
        let order = first.order;
        let mut items = vec![first.line];

        while let Some(next) = self.lines.next_if(|line| line.order == order) {
            items.push(next.line);
        }

        Some(SaleOrder::new(order, SaleRequest::new(items)))
    }
}
