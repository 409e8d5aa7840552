//! Committed sales and their equity postings
//!
//! `SalesLedger` owns the sales list and the equity ledger together, so that
//! recording a sale and posting its equity entry happen in one call that
//! cannot fail halfway.

use crate::core::equity_ledger::EquityLedger;
use crate::core::settlement::{equity_description, SaleDraft};
use crate::types::{EquityEntry, Sale, SaleId, SettlementError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

#[derive(Debug, Default)]
pub struct SalesLedger {
    sales: Vec<Sale>,
    equity: EquityLedger,
}

impl SalesLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Persist a draft as a sale and post its equity entry
    pub fn record(&mut self, draft: SaleDraft, date: DateTime<Utc>) -> Sale {
        let id = self.sales.len() as SaleId + 1;
        let sale = draft.into_sale(id, date);

        self.equity
            .post(sale.total_amount, equity_description(id), date);
        self.sales.push(sale.clone());
        sale
    }

    pub fn sales(&self) -> &[Sale] {
        &self.sales
    }

    pub fn equity_entries(&self) -> &[EquityEntry] {
        self.equity.entries()
    }

    pub fn equity_total(&self) -> Result<Decimal, SettlementError> {
        self.equity.total()
    }
}
