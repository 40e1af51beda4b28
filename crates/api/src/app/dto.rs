use serde::{Deserialize, Serialize};
use serde_json::Value;

use scaleflow_infra::lifecycle::{PredictNowOutcome, RefreshSummary};
use scaleflow_products::{HistoryRecord, Product, Quote};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct ListProductsQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct RecordRealWeightRequest {
    pub real_weight: f64,
}

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub rows: Vec<Value>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct ItemsResponse<T> {
    pub items: Vec<T>,
}

impl<T> From<Vec<T>> for ItemsResponse<T> {
    fn from(items: Vec<T>) -> Self {
        Self { items }
    }
}

#[derive(Debug, Serialize)]
pub struct ArchivedProductResponse {
    pub product: Product,
    pub history: HistoryRecord,
}

#[derive(Debug, Serialize)]
pub struct QuoteStatusResponse {
    pub quote: Quote,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<HistoryRecord>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum PredictResponse {
    Predicted { product: Product },
    Skipped { status: String },
}

impl From<PredictNowOutcome> for PredictResponse {
    fn from(value: PredictNowOutcome) -> Self {
        match value {
            PredictNowOutcome::Predicted(product) => PredictResponse::Predicted { product },
            PredictNowOutcome::Skipped(status) => PredictResponse::Skipped {
                status: status.to_string(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub candidates: usize,
    pub updated: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl From<RefreshSummary> for RefreshResponse {
    fn from(s: RefreshSummary) -> Self {
        Self {
            candidates: s.candidates,
            updated: s.updated,
            failed: s.failed,
            skipped: s.skipped,
        }
    }
}
