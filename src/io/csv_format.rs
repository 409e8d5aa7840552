//! CSV format handling for catalog, order and settlement files
//!
//! This module centralizes all CSV format concerns, providing:
//! - `CatalogCsvRecord` and its conversion to catalog and stock-in records
//! - `OrderCsvRecord` and its conversion to sale lines
//! - Settlement output serialization
//!
//! All functions are pure (no I/O) for easy testing.

use crate::core::SettlementOutcome;
use crate::types::{
    CostingPolicy, MarketplaceFee, OrderId, Product, ProductId, Quantity, SaleLineRequest,
    SettlementError, StockIn, Variant, VariantId,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;
use std::str::FromStr;

/// Catalog CSV row
///
/// Columns: `type,product,variant,name,policy,quantity,cost,price,marketplace,percentage,process_fee[,created_at]`.
/// Which columns matter depends on `type`; the rest are left empty.
#[derive(Debug, Deserialize, Clone, PartialEq, Default)]
pub struct CatalogCsvRecord {
    #[serde(rename = "type")]
    pub record_type: String,
    pub product: ProductId,
    pub variant: Option<VariantId>,
    pub name: Option<String>,
    pub policy: Option<String>,
    pub quantity: Option<Quantity>,
    pub cost: Option<String>,
    pub price: Option<String>,
    pub marketplace: Option<String>,
    pub percentage: Option<String>,
    pub process_fee: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// A converted catalog row
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogRecord {
    Product(Product),
    Variant(Variant),
    Batch(StockIn),
    Fee(MarketplaceFee),
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn required(value: Option<String>, field: &str, row: &str) -> Result<String, String> {
    non_empty(value).ok_or_else(|| format!("{row} row requires {field}"))
}

fn parse_decimal(value: &str, field: &str) -> Result<Decimal, String> {
    Decimal::from_str(value.trim()).map_err(|_| format!("Invalid {field} '{value}'"))
}

/// Convert a CatalogCsvRecord to a CatalogRecord
///
/// # Returns
///
/// Result containing either:
/// - Ok(CatalogRecord) - Successfully converted record
/// - Err(String) - Error message describing the conversion failure
pub fn convert_catalog_record(record: CatalogCsvRecord) -> Result<CatalogRecord, String> {
    match record.record_type.trim().to_lowercase().as_str() {
        "product" => {
            let name = required(record.name, "name", "product")?;
            let policy = non_empty(record.policy)
                .map(|p| CostingPolicy::from_str(&p))
                .transpose()?;
            let price = parse_decimal(&required(record.price, "price", "product")?, "price")?;
            Ok(CatalogRecord::Product(Product::new(
                record.product,
                name,
                policy,
                price,
            )))
        }
        "variant" => {
            let id = record
                .variant
                .ok_or_else(|| "variant row requires variant".to_string())?;
            Ok(CatalogRecord::Variant(Variant {
                id,
                product: record.product,
            }))
        }
        "batch" => {
            let quantity = record
                .quantity
                .ok_or_else(|| "batch row requires quantity".to_string())?;
            let cost = parse_decimal(&required(record.cost, "cost", "batch")?, "cost")?;
            let price = parse_decimal(&required(record.price, "price", "batch")?, "price")?;

            let mut stock_in = StockIn::new(record.product, record.variant, quantity, cost, price);
            if let Some(created_at) = non_empty(record.created_at) {
                let created_at = DateTime::parse_from_rfc3339(created_at.trim())
                    .map_err(|_| format!("Invalid created_at '{created_at}'"))?;
                stock_in = stock_in.created_at(created_at.with_timezone(&Utc));
            }
            Ok(CatalogRecord::Batch(stock_in))
        }
        "fee" => {
            let marketplace = required(record.marketplace, "marketplace", "fee")?;
            let percentage = match non_empty(record.percentage) {
                Some(p) => parse_decimal(&p, "percentage")?,
                None => Decimal::ZERO,
            };
            let process_fee = match non_empty(record.process_fee) {
                Some(f) => parse_decimal(&f, "process_fee")?,
                None => Decimal::ZERO,
            };
            Ok(CatalogRecord::Fee(MarketplaceFee::new(
                record.product,
                marketplace.trim(),
                percentage,
                process_fee,
            )))
        }
        other => Err(format!("Invalid catalog record type: '{other}'")),
    }
}

/// Orders CSV row
///
/// Columns: `order,product,variant,quantity`. The quantity is read signed so
/// that non-positive values reach settlement and are rejected there.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct OrderCsvRecord {
    pub order: OrderId,
    pub product: ProductId,
    pub variant: Option<VariantId>,
    pub quantity: i64,
}

/// One line of a caller's order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    pub order: OrderId,
    pub line: SaleLineRequest,
}

impl From<OrderCsvRecord> for OrderLine {
    fn from(record: OrderCsvRecord) -> Self {
        Self {
            order: record.order,
            line: SaleLineRequest::new(record.product, record.variant, record.quantity),
        }
    }
}

/// Write settlement outcomes to CSV format
///
/// Writes columns: order, status, total_amount, total_cogs, profit. Rows are
/// sorted by order id; a failed order has its error kind as status and empty
/// amounts.
///
/// # Errors
///
/// Returns `IoError` if writing to `output` fails.
pub fn write_settlements_csv(
    outcomes: &[SettlementOutcome],
    output: &mut dyn Write,
) -> Result<(), SettlementError> {
    use csv::Writer;

    let mut writer = Writer::from_writer(output);

    writer.write_record(["order", "status", "total_amount", "total_cogs", "profit"])?;

    let mut sorted: Vec<&SettlementOutcome> = outcomes.iter().collect();
    sorted.sort_by_key(|outcome| outcome.order);

    for outcome in sorted {
        let row = match &outcome.result {
            Ok(sale) => [
                outcome.order.to_string(),
                "settled".to_string(),
                format!("{:.4}", sale.total_amount),
                format!("{:.4}", sale.total_cogs),
                format!("{:.4}", sale.profit),
            ],
            Err(e) => [
                outcome.order.to_string(),
                e.kind().to_string(),
                String::new(),
                String::new(),
                String::new(),
            ],
        };
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}
