//! Bulk product import.
//!
//! Rows are processed in fixed-size batches, strictly one after another. Inside a batch,
//! bad rows are rejected individually and the remaining rows are inserted atomically. A
//! failed batch insert stops the run: earlier batches stay committed, later ones are
//! never attempted.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use scaleflow_products::{ImportRowError, NewProduct, extract_row};

use crate::store::ProductStore;

pub const DEFAULT_BATCH_SIZE: usize = 500;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub total: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub errors: Vec<ImportRowError>,
    pub batches_committed: usize,
    /// Valid rows of the batch whose insert failed.
    pub rows_failed: usize,
    /// Rows in batches never attempted after a failure.
    pub rows_skipped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_error: Option<String>,
}

impl ImportReport {
    pub fn is_complete(&self) -> bool {
        self.batch_error.is_none()
    }
}

#[derive(Debug)]
pub struct ImportPipeline<S> {
    store: Arc<S>,
    batch_size: usize,
}

impl<S> Clone for ImportPipeline<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            batch_size: self.batch_size,
        }
    }
}

impl<S: ProductStore> ImportPipeline<S> {
    pub fn new(store: Arc<S>, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub async fn run(&self, rows: &[Value]) -> ImportReport {
        let mut report = ImportReport {
            total: rows.len(),
            ..Default::default()
        };

        for (batch_no, chunk) in rows.chunks(self.batch_size).enumerate() {
            let offset = batch_no * self.batch_size;
            if report.batch_error.is_some() {
                report.rows_skipped += chunk.len();
                continue;
            }

            let mut valid: Vec<NewProduct> = Vec::with_capacity(chunk.len());
            for (i, raw) in chunk.iter().enumerate() {
                let row = offset + i;
                let extracted = match raw {
                    Value::Object(map) => extract_row(row, map),
                    _ => Err(ImportRowError {
                        row,
                        reason: "row is not a JSON object".to_string(),
                    }),
                };
                match extracted {
                    Ok(product) => valid.push(product),
                    Err(err) => {
                        report.rejected += 1;
                        report.errors.push(err);
                    }
                }
            }

            if valid.is_empty() {
                continue;
            }

            let size = valid.len();
            match self.store.insert_products(valid).await {
                Ok(inserted) => {
                    report.accepted += inserted.len();
                    report.batches_committed += 1;
                    tracing::info!(batch = batch_no, rows = inserted.len(), "import batch committed");
                }
                Err(e) => {
                    tracing::error!(batch = batch_no, rows = size, error = %e, "import batch failed; aborting remaining batches");
                    report.rows_failed += size;
                    report.batch_error = Some(e.to_string());
                }
            }
        }

        tracing::info!(
            total = report.total,
            accepted = report.accepted,
            rejected = report.rejected,
            skipped = report.rows_skipped,
            "import finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryStore, ProductFilter};
    use scaleflow_products::ProductStatus;
    use serde_json::json;

    fn pipeline(batch_size: usize) -> (Arc<InMemoryStore>, ImportPipeline<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        (Arc::clone(&store), ImportPipeline::new(store, batch_size))
    }

    fn named(i: usize) -> Value {
        json!({ "name": format!("item {i}"), "weight": i as f64 })
    }

    #[tokio::test]
    async fn bad_row_is_rejected_and_sibling_is_inserted() {
        let (store, pipeline) = pipeline(DEFAULT_BATCH_SIZE);
        let rows = vec![
            json!({ "product_name": null, "category": "x" }),
            json!({ "product_name": "Crate", "real_weight": 3.5 }),
        ];

        let report = pipeline.run(&rows).await;
        assert_eq!(report.accepted, 1);
        assert_eq!(report.rejected, 1);
        assert_eq!(report.errors[0].row, 0);
        assert!(report.is_complete());

        let products = store.list_products(ProductFilter::default()).await.unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].status, ProductStatus::Accepted);
        assert_eq!(products[0].predicted_weight, None);
    }

    #[tokio::test]
    async fn row_indexes_span_batches() {
        let (_, pipeline) = pipeline(2);
        let rows = vec![named(0), named(1), named(2), json!("not an object"), named(4)];

        let report = pipeline.run(&rows).await;
        assert_eq!(report.accepted, 4);
        assert_eq!(report.batches_committed, 3);
        assert_eq!(report.errors, vec![ImportRowError {
            row: 3,
            reason: "row is not a JSON object".to_string(),
        }]);
    }

    #[tokio::test]
    async fn failed_batch_stops_later_batches_and_keeps_earlier_ones() {
        let (store, pipeline) = pipeline(2);
        store.fail_product_batch_after(1);
        let rows: Vec<Value> = (0..7).map(named).collect();

        let report = pipeline.run(&rows).await;
        assert_eq!(report.batches_committed, 1);
        assert_eq!(report.accepted, 2);
        assert_eq!(report.rows_failed, 2);
        assert_eq!(report.rows_skipped, 3);
        assert!(report.batch_error.is_some());
        assert!(!report.is_complete());

        let products = store.list_products(ProductFilter::default()).await.unwrap();
        assert_eq!(products.len(), 2);
    }

    #[tokio::test]
    async fn zero_batch_size_is_clamped() {
        let (_, pipeline) = pipeline(0);
        assert_eq!(pipeline.batch_size(), 1);
        let report = pipeline.run(&[named(1)]).await;
        assert_eq!(report.accepted, 1);
    }

    #[tokio::test]
    async fn empty_input_is_an_empty_report() {
        let (_, pipeline) = pipeline(10);
        assert_eq!(pipeline.run(&[]).await, ImportReport::default());
    }
}
