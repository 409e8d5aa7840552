//! Settlement stages shared by the sync and concurrent engines
//!
//! A sale moves through `Validating → Allocating → FeeSettling → Aggregating →
//! Committing → Done`. Everything up to and including aggregation is pure
//! computation over a `StagedBatches` working copy; the engines differ only
//! in how they obtain that copy and how they commit it.
//!
//! # Atomicity
//!
//! Nothing in this module touches a store. A failed stage drops the staged
//! rows, which leaves the live batches, the sales list and the equity ledger
//! exactly as they were.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::debug;

use crate::core::allocator::{self, Allocation, AllocationRequest};
use crate::core::catalog::resolve_stock_key;
use crate::core::fee_resolver::{resolve_fee, FeeSettlement};
use crate::core::traits::Catalog;
use crate::types::{
    CostingPolicy, InventoryBatch, Quantity, Sale, SaleId, SaleItem, SaleRequest,
    SettlementError, StockKey,
};

/// Settlement state machine stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementStage {
    Validating,
    Allocating,
    FeeSettling,
    Aggregating,
    Committing,
    Done,
}

impl fmt::Display for SettlementStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SettlementStage::Validating => "validating",
            SettlementStage::Allocating => "allocating",
            SettlementStage::FeeSettling => "fee_settling",
            SettlementStage::Aggregating => "aggregating",
            SettlementStage::Committing => "committing",
            SettlementStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// A sale line that passed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedLine {
    pub item: usize,
    pub key: StockKey,
    pub quantity: Quantity,
    pub policy: CostingPolicy,
}

impl ValidatedLine {
    fn allocation_request(&self) -> AllocationRequest {
        AllocationRequest {
            item: self.item,
            key: self.key,
            quantity: self.quantity,
            policy: self.policy,
        }
    }
}

/// Validate every line of `request` against the catalog
///
/// Lines are checked in order and the first violation is returned.
///
/// # Errors
///
/// Returns an error if:
/// - The request has no items (`EmptySale`)
/// - A product or variant does not exist, or a variant belongs to another product
/// - A quantity is below 1 or does not fit a `Quantity`
/// - A product has no costing policy (`MissingCostingPolicy`)
pub fn validate_request<C: Catalog + ?Sized>(
    catalog: &C,
    request: &SaleRequest,
) -> Result<Vec<ValidatedLine>, SettlementError> {
    if request.items.is_empty() {
        return Err(SettlementError::EmptySale);
    }

    request
        .items
        .iter()
        .enumerate()
        .map(|(item, line)| {
            let (product, key) =
                resolve_stock_key(catalog, Some(item), line.product, line.variant)?;

            let quantity = Quantity::try_from(line.quantity)
                .ok()
                .filter(|q| *q >= 1)
                .ok_or_else(|| SettlementError::invalid_quantity(Some(item), line.quantity))?;

            let policy = product
                .costing_policy
                .ok_or_else(|| SettlementError::missing_costing_policy(product.id))?;

            Ok(ValidatedLine {
                item,
                key,
                quantity,
                policy,
            })
        })
        .collect()
}

/// Distinct stock keys touched by `lines`, in lock order
pub fn stock_keys(lines: &[ValidatedLine]) -> BTreeSet<StockKey> {
    lines.iter().map(|line| line.key).collect()
}

/// In-memory working copy of the batches a settlement touches
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StagedBatches {
    rows: BTreeMap<StockKey, Vec<InventoryBatch>>,
}

impl StagedBatches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: StockKey, batches: Vec<InventoryBatch>) {
        self.rows.insert(key, batches);
    }

    /// Allocate one line against the staged rows
    ///
    /// Later lines on the same key see the consumption of earlier ones.
    pub fn allocate(&mut self, line: &ValidatedLine) -> Result<Allocation, SettlementError> {
        let batches = self.rows.entry(line.key).or_default();
        allocator::allocate(batches, line.allocation_request())
    }

    pub fn rows(&self) -> impl Iterator<Item = (&StockKey, &Vec<InventoryBatch>)> {
        self.rows.iter()
    }

    pub fn into_rows(self) -> BTreeMap<StockKey, Vec<InventoryBatch>> {
        self.rows
    }
}

/// Check that staged rows can replace the live rows of `key`
///
/// Staged rows must be the same batches, in the same order, and may only
/// have lost units. Anything else means the live rows moved underneath the
/// settlement and the commit must not be applied.
pub(crate) fn check_staged(
    key: &StockKey,
    staged: &[InventoryBatch],
    live: &[InventoryBatch],
) -> Result<(), SettlementError> {
    if staged.len() != live.len() {
        return Err(SettlementError::persistence_failure(format!(
            "{key}: staged {} batches but store holds {}",
            staged.len(),
            live.len()
        )));
    }

    for (staged, live) in staged.iter().zip(live) {
        if staged.id != live.id {
            return Err(SettlementError::persistence_failure(format!(
                "{key}: staged batch {} does not match stored batch {}",
                staged.id, live.id
            )));
        }
        if staged.remaining_quantity > live.remaining_quantity {
            return Err(SettlementError::persistence_failure(format!(
                "{key}: batch {} would gain units ({} > {})",
                staged.id, staged.remaining_quantity, live.remaining_quantity
            )));
        }
    }

    Ok(())
}

/// A fully computed sale awaiting commit
#[derive(Debug, Clone, PartialEq)]
pub struct SaleDraft {
    pub marketplace: String,
    pub items: Vec<SaleItem>,
    pub total_amount: Decimal,
    pub total_cogs: Decimal,
    pub profit: Decimal,
}

impl SaleDraft {
    pub fn into_sale(self, id: SaleId, date: DateTime<Utc>) -> Sale {
        Sale {
            id,
            date,
            marketplace: self.marketplace,
            total_amount: self.total_amount,
            total_cogs: self.total_cogs,
            profit: self.profit,
            items: self.items,
        }
    }
}

/// Description of the equity entry posted for a sale
pub fn equity_description(sale: SaleId) -> String {
    format!("Sale revenue #{sale}")
}

/// Run the allocating, fee-settling and aggregating stages
///
/// # Errors
///
/// Returns `InsufficientStock` for the first line that cannot be covered, or
/// `ArithmeticOverflow` if any money computation overflows. `staged` may be
/// partially consumed on error and must be discarded.
pub fn settle_lines<C: Catalog + ?Sized>(
    catalog: &C,
    marketplace: &str,
    lines: &[ValidatedLine],
    staged: &mut StagedBatches,
) -> Result<SaleDraft, SettlementError> {
    debug!(stage = %SettlementStage::Allocating, lines = lines.len());
    let allocations = lines
        .iter()
        .map(|line| staged.allocate(line))
        .collect::<Result<Vec<_>, _>>()?;

    debug!(stage = %SettlementStage::FeeSettling, marketplace);
    let mut fees = FeeSettlement::new();
    let mut items = Vec::with_capacity(lines.len());
    for (line, allocation) in lines.iter().zip(&allocations) {
        let fee = resolve_fee(catalog, line.key.product, marketplace);
        let deduction = fees.settle_line(allocation.gross_revenue, fee.as_ref())?;

        let net_revenue = allocation
            .gross_revenue
            .checked_sub(deduction.total())
            .ok_or_else(|| SettlementError::arithmetic_overflow("net revenue"))?;
        let net_unit_price = net_revenue
            .checked_div(Decimal::from(line.quantity))
            .ok_or_else(|| SettlementError::arithmetic_overflow("net unit price"))?;

        items.push(SaleItem {
            product: line.key.product,
            variant: line.key.variant,
            quantity: line.quantity,
            net_unit_price,
            net_revenue,
            cogs: allocation.total_cogs,
            fee: deduction.total(),
        });
    }

    debug!(stage = %SettlementStage::Aggregating);
    let mut total_amount = Decimal::ZERO;
    let mut total_cogs = Decimal::ZERO;
    for item in &items {
        total_amount = total_amount
            .checked_add(item.net_revenue)
            .ok_or_else(|| SettlementError::arithmetic_overflow("total amount"))?;
        total_cogs = total_cogs
            .checked_add(item.cogs)
            .ok_or_else(|| SettlementError::arithmetic_overflow("total cogs"))?;
    }
    let profit = total_amount
        .checked_sub(total_cogs)
        .ok_or_else(|| SettlementError::arithmetic_overflow("profit"))?;

    Ok(SaleDraft {
        marketplace: marketplace.to_string(),
        items,
        total_amount,
        total_cogs,
        profit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::InMemoryCatalog;
    use crate::types::{MarketplaceFee, Product, SaleLineRequest, StockIn, Variant};
    use chrono::{Duration, TimeZone};
    use rstest::rstest;

    fn catalog() -> InMemoryCatalog {
        let mut catalog = InMemoryCatalog::new();
        catalog.add_product(Product::new(1, "Mug", Some(CostingPolicy::Fifo), Decimal::new(15, 0)));
        catalog.add_product(Product::new(2, "Plate", Some(CostingPolicy::Lifo), Decimal::new(20, 0)));
        catalog.add_product(Product::new(3, "Bowl", None, Decimal::new(20, 0)));
        catalog.add_variant(Variant { id: 10, product: 1 }).unwrap();
        catalog
            .set_fee(MarketplaceFee::new(1, "SHOPEE", Decimal::new(5, 0), Decimal::new(1000, 0)))
            .unwrap();
        catalog
    }

    fn batch(id: u64, product: u32, quantity: Quantity, cost: i64, price: i64) -> InventoryBatch {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        InventoryBatch::new(
            id,
            StockIn::new(product, None, quantity, Decimal::new(cost, 0), Decimal::new(price, 0)),
            t0 + Duration::minutes(id as i64),
        )
    }

    #[test]
    fn test_validate_accepts_good_request() {
        let request = SaleRequest::new(vec![
            SaleLineRequest::new(1, Some(10), 2),
            SaleLineRequest::new(2, None, 1),
        ]);

        let lines = validate_request(&catalog(), &request).unwrap();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].key, StockKey::new(1, Some(10)));
        assert_eq!(lines[0].policy, CostingPolicy::Fifo);
        assert_eq!(lines[1].item, 1);
        assert_eq!(lines[1].policy, CostingPolicy::Lifo);
    }

    #[test]
    fn test_validate_rejects_empty_sale() {
        let result = validate_request(&catalog(), &SaleRequest::default());
        assert_eq!(result.unwrap_err(), SettlementError::EmptySale);
    }

    #[rstest]
    #[case::zero(0)]
    #[case::negative(-3)]
    #[case::too_large(i64::from(u32::MAX) + 1)]
    fn test_validate_rejects_bad_quantity(#[case] quantity: i64) {
        let request = SaleRequest::new(vec![
            SaleLineRequest::new(1, None, 1),
            SaleLineRequest::new(1, None, quantity),
        ]);

        let result = validate_request(&catalog(), &request);
        assert_eq!(
            result.unwrap_err(),
            SettlementError::invalid_quantity(Some(1), quantity)
        );
    }

    #[test]
    fn test_validate_rejects_missing_policy() {
        let request = SaleRequest::new(vec![SaleLineRequest::new(3, None, 1)]);
        let result = validate_request(&catalog(), &request);
        assert_eq!(result.unwrap_err(), SettlementError::missing_costing_policy(3));
    }

    #[test]
    fn test_settle_lines_charges_flat_fee_once() {
        let catalog = catalog();
        let mut staged = StagedBatches::new();
        staged.insert(StockKey::new(1, None), vec![batch(1, 1, 10, 5000, 10000)]);

        let lines = validate_request(
            &catalog,
            &SaleRequest::new(vec![
                SaleLineRequest::new(1, None, 1),
                SaleLineRequest::new(1, None, 1),
            ]),
        )
        .unwrap();

        let draft = settle_lines(&catalog, "SHOPEE", &lines, &mut staged).unwrap();

        assert_eq!(draft.total_amount, Decimal::new(18000, 0));
        assert_eq!(draft.total_cogs, Decimal::new(10000, 0));
        assert_eq!(draft.profit, Decimal::new(8000, 0));
        assert_eq!(draft.items[0].fee, Decimal::new(1500, 0));
        assert_eq!(draft.items[1].fee, Decimal::new(500, 0));
        assert_eq!(draft.items[0].net_unit_price, Decimal::new(8500, 0));
    }

    #[test]
    fn test_settle_lines_without_fee_row_keeps_gross() {
        let catalog = catalog();
        let mut staged = StagedBatches::new();
        staged.insert(StockKey::new(2, None), vec![batch(1, 2, 4, 10, 20)]);

        let lines = validate_request(
            &catalog,
            &SaleRequest::new(vec![SaleLineRequest::new(2, None, 3)]),
        )
        .unwrap();

        let draft = settle_lines(&catalog, "SHOPEE", &lines, &mut staged).unwrap();
        assert_eq!(draft.total_amount, Decimal::new(60, 0));
        assert_eq!(draft.items[0].fee, Decimal::ZERO);
    }

    #[test]
    fn test_later_lines_see_earlier_consumption() {
        let catalog = catalog();
        let mut staged = StagedBatches::new();
        staged.insert(StockKey::new(2, None), vec![batch(1, 2, 4, 10, 20)]);

        let lines = validate_request(
            &catalog,
            &SaleRequest::new(vec![
                SaleLineRequest::new(2, None, 3),
                SaleLineRequest::new(2, None, 2),
            ]),
        )
        .unwrap();

        let result = settle_lines(&catalog, "SHOPEE", &lines, &mut staged);
        assert_eq!(
            result.unwrap_err(),
            SettlementError::insufficient_stock(1, 2, None, 1, 2)
        );
    }

    #[test]
    fn test_check_staged_rejects_moved_rows() {
        let key = StockKey::new(1, None);
        let live = vec![batch(1, 1, 5, 10, 15)];

        let mut consumed = live.clone();
        consumed[0].remaining_quantity = 2;
        assert!(check_staged(&key, &consumed, &live).is_ok());

        let mut drained = live.clone();
        drained[0].remaining_quantity = 1;
        assert!(check_staged(&key, &live, &drained).is_err());

        let extra = vec![batch(1, 1, 5, 10, 15), batch(2, 1, 5, 10, 15)];
        assert!(check_staged(&key, &extra, &live).is_err());
    }

    #[test]
    fn test_equity_description_references_sale() {
        assert_eq!(equity_description(42), "Sale revenue #42");
    }
}
