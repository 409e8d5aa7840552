//! Catalog file loading
//!
//! Reads a catalog CSV into an `InMemoryCatalog` plus the stock-ins it lists.
//! Rows are applied in file order, so a variant, fee or batch row must come
//! after the product it refers to. Malformed rows and rows the catalog
//! rejects are logged and skipped.

use crate::core::InMemoryCatalog;
use crate::io::csv_format::{convert_catalog_record, CatalogCsvRecord, CatalogRecord};
use crate::io::open_csv;
use crate::types::{SettlementError, StockIn};
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

/// A loaded catalog and the stock to receive into the engine
#[derive(Debug, Clone, Default)]
pub struct CatalogBook {
    pub catalog: InMemoryCatalog,

    /// Batch rows, in file order
    pub stock: Vec<StockIn>,
}

/// Load a catalog CSV file
///
/// # Errors
///
/// Returns `FileNotFound` or `IoError` if the file cannot be opened. Bad rows
/// never fail the load.
pub fn read_catalog(path: &Path) -> Result<CatalogBook, SettlementError> {
    let reader = open_csv(path)?;
    Ok(load_catalog(reader))
}

/// Build a catalog from an already opened CSV reader
pub fn load_catalog<R: Read>(mut reader: csv::Reader<R>) -> CatalogBook {
    let mut book = CatalogBook::default();

    for (index, result) in reader.deserialize::<CatalogCsvRecord>().enumerate() {
        // Header is line 1
        let line = index as u64 + 2;

        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!(line, error = %SettlementError::from(e), "skipping malformed catalog row");
                continue;
            }
        };

        let applied = convert_catalog_record(record)
            .map_err(|message| SettlementError::parse_error(Some(line), message))
            .and_then(|record| apply(&mut book, record));

        if let Err(e) = applied {
            warn!(line, error = %e, "skipping catalog row");
        }
    }

    debug!(
        products = book.catalog.product_count(),
        batches = book.stock.len(),
        "catalog loaded"
    );
    book
}

fn apply(book: &mut CatalogBook, record: CatalogRecord) -> Result<(), SettlementError> {
    match record {
        CatalogRecord::Product(product) => book.catalog.add_product(product),
        CatalogRecord::Variant(variant) => book.catalog.add_variant(variant)?,
        CatalogRecord::Fee(fee) => book.catalog.set_fee(fee)?,
        CatalogRecord::Batch(stock_in) => book.stock.push(stock_in),
    }
    Ok(())
}
