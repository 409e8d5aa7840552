//! Equity ledger entry

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Equity entry identifier
pub type EntryId = u64;

/// An append-only capital ledger entry
///
/// Settlement posts one entry per committed sale with `amount` equal to the
/// sale's net total. Entries are never edited after they are appended.
#[derive(Debug, Clone, PartialEq)]
pub struct EquityEntry {
    pub id: EntryId,

    /// Signed amount; sale revenue is positive
    pub amount: Decimal,
    pub description: String,
    pub date: DateTime<Utc>,
}
