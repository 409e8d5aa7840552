//! Asynchronous CSV reader with batch interface
//!
//! Provides batch reading of sale orders from an orders CSV. Consecutive rows
//! with the same order id are merged into one `SaleOrder`, including when an
//! order straddles two batches.
//!
//! # Architecture
//!
//! ```text
//! CSV Reader → AsyncReader → Batches of SaleOrders
//!                  ↓
//!           csv_format module
//!           (OrderCsvRecord, OrderLine)
//! ```

use crate::io::csv_format::{OrderCsvRecord, OrderLine};
use crate::types::{SaleOrder, SaleRequest};
use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;
use tracing::warn;

/// Asynchronous orders CSV reader
pub struct AsyncReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncDeserializer<R>,

    /// Order whose rows may continue in the next batch
    pending: Option<SaleOrder>,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncReader<R> {
    /// Create a new AsyncReader from an async reader
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        Self {
            csv_reader,
            pending: None,
        }
    }

    /// Read up to `batch_size` complete orders
    ///
    /// Malformed rows are logged and skipped. Returns an empty vector once
    /// the input is exhausted.
    pub async fn read_batch(&mut self, batch_size: usize) -> Vec<SaleOrder> {
        let mut batch = Vec::with_capacity(batch_size);
        let mut records = self.csv_reader.deserialize::<OrderCsvRecord>();

        loop {
            match records.next().await {
                Some(Ok(record)) => {
                    let OrderLine { order, line } = OrderLine::from(record);
                    if let Some(current) = self.pending.as_mut().filter(|p| p.order == order) {
                        current.request.items.push(line);
                        continue;
                    }

                    let started = SaleOrder::new(order, SaleRequest::new(vec![line]));
                    if let Some(done) = self.pending.replace(started) {
                        batch.push(done);
                        if batch.len() >= batch_size {
                            break;
                        }
                    }
                }
                Some(Err(e)) => warn!(error = %e, "skipping malformed order row"),
                None => {
                    batch.extend(self.pending.take());
                    break;
                }
            }
        }

        batch
    }
}
