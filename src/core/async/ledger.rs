//! Shared sales ledger for concurrent settlement
//!
//! Sales and equity postings live behind one async mutex. A settlement takes
//! it only for its commit, after all stock locks are held, so the lock order
//! is always stock keys first and ledger last.

use rust_decimal::Decimal;
use tokio::sync::{Mutex, MutexGuard};

use crate::core::sales_ledger::SalesLedger;
use crate::types::{EquityEntry, Sale, SettlementError};

#[derive(Debug, Default)]
pub struct AsyncLedger {
    inner: Mutex<SalesLedger>,
}

impl AsyncLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self) -> MutexGuard<'_, SalesLedger> {
        self.inner.lock().await
    }

    pub async fn sales(&self) -> Vec<Sale> {
        self.inner.lock().await.sales().to_vec()
    }

    pub async fn equity_entries(&self) -> Vec<EquityEntry> {
        self.inner.lock().await.equity_entries().to_vec()
    }

    pub async fn equity_total(&self) -> Result<Decimal, SettlementError> {
        self.inner.lock().await.equity_total()
    }
}
