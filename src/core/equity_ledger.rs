//! Append-only equity ledger
//!
//! Settlement posts exactly one entry per committed sale. The running capital
//! balance, including store expenses, is kept elsewhere; this ledger only
//! knows its own entries and their sum.

use crate::types::{EntryId, EquityEntry, SettlementError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

#[derive(Debug, Default)]
pub struct EquityLedger {
    entries: Vec<EquityEntry>,
}

impl EquityLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and return it
    pub fn post(
        &mut self,
        amount: Decimal,
        description: impl Into<String>,
        date: DateTime<Utc>,
    ) -> EquityEntry {
        let entry = EquityEntry {
            id: self.entries.len() as EntryId + 1,
            amount,
            description: description.into(),
            date,
        };
        self.entries.push(entry.clone());
        entry
    }

    pub fn entries(&self) -> &[EquityEntry] {
        &self.entries
    }

    /// Sum of all entry amounts
    ///
    /// # Errors
    ///
    /// Returns `ArithmeticOverflow` if the sum does not fit a `Decimal`.
    pub fn total(&self) -> Result<Decimal, SettlementError> {
        self.entries.iter().try_fold(Decimal::ZERO, |total, entry| {
            total
                .checked_add(entry.amount)
                .ok_or_else(|| SettlementError::arithmetic_overflow("equity total"))
        })
    }
}
