//! I/O module
//!
//! Handles CSV parsing and output.
//!
//! # Components
//!
//! - `csv_format` - CSV format handling (record conversion, output serialization)
//! - `catalog_reader` - Catalog file loading into an in-memory catalog
//! - `sync_reader` - Synchronous orders reader with iterator interface
//! - `async_reader` - Asynchronous orders reader with batch reading interface

pub mod async_reader;
pub mod catalog_reader;
pub mod csv_format;
pub mod sync_reader;

pub use async_reader::AsyncReader;
pub use catalog_reader::{read_catalog, CatalogBook};
pub use csv_format::{write_settlements_csv, CatalogRecord, OrderLine};
pub use sync_reader::{OrderGrouper, SyncReader};

use crate::types::SettlementError;
use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;

/// Map a failure to open `path` to a `SettlementError`
pub fn open_error(path: &Path, error: std::io::Error) -> SettlementError {
    match error.kind() {
        ErrorKind::NotFound => SettlementError::FileNotFound {
            path: path.display().to_string(),
        },
        _ => SettlementError::from(error),
    }
}

/// Open a CSV file with the reader settings every input file shares
///
/// The reader trims whitespace from all fields, allows short rows and uses
/// an 8KB buffer.
///
/// # Errors
///
/// Returns `FileNotFound` if the path does not exist, `IoError` otherwise.
pub fn open_csv(path: &Path) -> Result<csv::Reader<File>, SettlementError> {
    let file = File::open(path).map_err(|e| open_error(path, e))?;

    Ok(ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .buffer_capacity(8 * 1024)
        .from_reader(file))
}
