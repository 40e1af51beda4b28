//! Product lifecycle orchestration.
//!
//! ```text
//! Command
//!   ↓
//! 1. Validate input (pure, before any store call)
//!   ↓
//! 2. Read current state from the store
//!   ↓
//! 3. Decide the transition (domain rules on the read row)
//!   ↓
//! 4. Persist through a guarded store call (compare-and-set or archival unit)
//!   ↓
//! 5. Side effects: schedule prediction, log
//! ```
//!
//! The engine holds no state of its own; correctness under concurrency comes from the
//! guarded store calls, never from in-process locks.

use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;

use scaleflow_core::{DomainError, HistoryId, ProductId, QuoteId, Weight};
use scaleflow_prediction::{PredictionError, PredictionRequest, WeightPredictor};
use scaleflow_products::{
    ArchiveSubject, ArchivedEntity, CreateProduct, CreateQuote, HistoryRecord, NewProduct, NewQuote,
    Product, ProductDetailsPatch, ProductStatus, Quote, ReviewDecision,
};

use crate::store::{
    ArchiveReceipt, ArchiveStore, HistoryStore, LifecycleStore, ProductFilter, ProductStore, QuoteStore,
    StoreError,
};

#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Input rejected before touching the store.
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found")]
    NotFound,

    /// The current state does not allow the requested transition.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// The prediction service failed on a caller-awaited call.
    #[error("prediction failed: {0}")]
    Dependency(PredictionError),

    #[error(transparent)]
    Store(StoreError),
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

impl From<DomainError> for LifecycleError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => LifecycleError::Validation(msg),
            DomainError::InvalidTransition(msg) | DomainError::Conflict(msg) => {
                LifecycleError::InvalidTransition(msg)
            }
            DomainError::NotFound => LifecycleError::NotFound,
        }
    }
}

impl From<StoreError> for LifecycleError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound => LifecycleError::NotFound,
            StoreError::Rejected(err) => err.into(),
            StoreError::Conflict(msg) => LifecycleError::InvalidTransition(msg),
            other => LifecycleError::Store(other),
        }
    }
}

impl From<PredictionError> for LifecycleError {
    fn from(value: PredictionError) -> Self {
        LifecycleError::Dependency(value)
    }
}

/// How a background prediction ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionOutcome {
    Recorded(Weight),
    /// The product left `pending` (or was deleted) before the estimate arrived.
    Stale,
    Failed(PredictionError),
    StoreFailed(String),
    Aborted(String),
}

/// Handle on a scheduled prediction. Dropping it does not cancel the task.
#[derive(Debug)]
pub struct PredictionTask {
    product_id: ProductId,
    handle: JoinHandle<PredictionOutcome>,
}

impl PredictionTask {
    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub async fn outcome(self) -> PredictionOutcome {
        self.handle
            .await
            .unwrap_or_else(|e| PredictionOutcome::Aborted(e.to_string()))
    }
}

#[derive(Debug)]
pub struct Created {
    pub product: Product,
    /// Present iff the product was created `pending`.
    pub prediction: Option<PredictionTask>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductArchived {
    pub product: Product,
    pub history: HistoryRecord,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PredictNowOutcome {
    Predicted(Product),
    Skipped(ProductStatus),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub candidates: usize,
    pub updated: usize,
    pub failed: usize,
    /// Candidates that left `pending` while their estimate was in flight.
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuoteStatusChange {
    pub quote: Quote,
    /// Set when the quote was accepted (and therefore archived).
    pub history: Option<HistoryRecord>,
}

/// Lifecycle engine over an injected store and predictor.
#[derive(Debug)]
pub struct LifecycleEngine<S, P> {
    store: Arc<S>,
    predictor: Arc<P>,
}

impl<S, P> Clone for LifecycleEngine<S, P> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            predictor: Arc::clone(&self.predictor),
        }
    }
}

impl<S, P> LifecycleEngine<S, P> {
    pub fn new(store: Arc<S>, predictor: Arc<P>) -> Self {
        Self { store, predictor }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}

impl<S, P> LifecycleEngine<S, P>
where
    S: LifecycleStore,
    P: WeightPredictor,
{
    /// Create a product; a `pending` product gets a background prediction.
    ///
    /// Prediction failures never fail or roll back the creation.
    pub async fn create(&self, cmd: CreateProduct) -> LifecycleResult<Created> {
        let new = NewProduct::new(cmd)?;
        let wants_prediction = new.wants_prediction();

        let product = self.store.insert_product(new).await?;
        tracing::info!(product_id = %product.id, status = %product.status, "product created");

        let prediction = wants_prediction.then(|| self.schedule_prediction(&product));
        Ok(Created { product, prediction })
    }

    fn schedule_prediction(&self, product: &Product) -> PredictionTask {
        let store = Arc::clone(&self.store);
        let predictor = Arc::clone(&self.predictor);
        let request = prediction_request(product);
        let product_id = product.id;

        let handle = tokio::spawn(async move {
            let weight = match predictor.predict(&request).await {
                Ok(w) => w,
                Err(e) => {
                    tracing::warn!(product_id = %product_id, error = %e, "prediction failed");
                    return PredictionOutcome::Failed(e);
                }
            };

            match store.record_prediction(product_id, weight).await {
                Ok(Some(_)) => {
                    tracing::debug!(product_id = %product_id, weight = %weight, "prediction recorded");
                    PredictionOutcome::Recorded(weight)
                }
                Ok(None) => {
                    tracing::debug!(product_id = %product_id, "product no longer pending; prediction dropped");
                    PredictionOutcome::Stale
                }
                Err(e) => {
                    tracing::warn!(product_id = %product_id, error = %e, "failed to store prediction");
                    PredictionOutcome::StoreFailed(e.to_string())
                }
            }
        });

        PredictionTask { product_id, handle }
    }

    pub async fn get(&self, id: ProductId) -> LifecycleResult<Product> {
        Ok(self.store.get_product(id).await?)
    }

    /// List products, newest first, optionally filtered by a status name.
    /// A blank name means no filter.
    pub async fn list(&self, status: Option<&str>) -> LifecycleResult<Vec<Product>> {
        let filter = match status.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => ProductFilter::status(s.parse()?),
            None => ProductFilter::default(),
        };
        Ok(self.store.list_products(filter).await?)
    }

    /// Review a pending product: `accepted` or `canceled`.
    pub async fn change_status(&self, id: ProductId, target: &str) -> LifecycleResult<Product> {
        let decision: ReviewDecision = target.parse()?;
        let current = self.store.get_product(id).await?;
        let next = current.review(decision)?;

        match self.store.transition_product_status(id, current.status, next).await {
            Ok(product) => {
                tracing::info!(product_id = %id, from = %current.status, to = %next, "product status changed");
                Ok(product)
            }
            Err(StoreError::Conflict(_)) => {
                let latest = self.store.get_product(id).await?;
                Err(LifecycleError::InvalidTransition(format!(
                    "product is '{}', only pending products can be reviewed",
                    latest.status
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Record the measured weight and archive the product into history.
    ///
    /// Allowed from any status and not idempotent: every call adds a history record.
    pub async fn record_real_weight(&self, id: ProductId, real_weight: f64) -> LifecycleResult<ProductArchived> {
        let weight = Weight::new(real_weight)?;
        let receipt = self.archive(ArchiveSubject::Product(id), Some(weight)).await?;

        match receipt.entity {
            ArchivedEntity::Product(product) => Ok(ProductArchived {
                product,
                history: receipt.record,
            }),
            ArchivedEntity::Quote(_) => Err(LifecycleError::Store(StoreError::Backend(
                "archival of a product returned a quote".to_string(),
            ))),
        }
    }

    async fn archive(&self, subject: ArchiveSubject, real_weight: Option<Weight>) -> LifecycleResult<ArchiveReceipt> {
        match self.store.archive(subject, real_weight).await {
            Ok(receipt) => {
                tracing::info!(
                    source = subject.source().as_str(),
                    subject_id = %subject.uuid(),
                    history_id = %receipt.record.id,
                    "archived into history"
                );
                Ok(receipt)
            }
            Err(e @ StoreError::ArchiveSourceUpdate { .. }) => {
                tracing::error!(
                    subject_id = %subject.uuid(),
                    history_id = ?e.orphaned_history(),
                    error = %e,
                    "archival left an orphan history record"
                );
                Err(e.into())
            }
            Err(e @ StoreError::ArchiveRolledBack { .. }) => {
                tracing::error!(subject_id = %subject.uuid(), error = %e, "archival rolled back");
                Err(e.into())
            }
            Err(e @ StoreError::ArchiveHistoryInsert(_)) => {
                tracing::error!(subject_id = %subject.uuid(), error = %e, "archival aborted");
                Err(e.into())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete(&self, id: ProductId) -> LifecycleResult<()> {
        self.store.delete_product(id).await?;
        tracing::info!(product_id = %id, "product deleted");
        Ok(())
    }

    /// Edit descriptive fields; archived products are frozen.
    pub async fn update_details(&self, id: ProductId, patch: ProductDetailsPatch) -> LifecycleResult<Product> {
        let current = self.store.get_product(id).await?;
        let next = current.apply_details(&patch)?;

        match self.store.update_product_details(&next).await {
            Ok(product) => Ok(product),
            Err(StoreError::Conflict(_)) => Err(LifecycleError::InvalidTransition(
                "product changed status during the edit".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Caller-awaited prediction; gateway failures surface as `Dependency`.
    pub async fn predict_now(&self, id: ProductId) -> LifecycleResult<PredictNowOutcome> {
        let product = self.store.get_product(id).await?;
        if !product.accepts_prediction() {
            return Ok(PredictNowOutcome::Skipped(product.status));
        }

        let weight = self.predictor.predict(&prediction_request(&product)).await?;
        match self.store.record_prediction(id, weight).await? {
            Some(updated) => Ok(PredictNowOutcome::Predicted(updated)),
            None => {
                let latest = self.store.get_product(id).await?;
                Ok(PredictNowOutcome::Skipped(latest.status))
            }
        }
    }

    /// Re-predict every pending product that has no measured weight yet.
    pub async fn refresh_pending_predictions(&self) -> LifecycleResult<RefreshSummary> {
        let pending = self
            .store
            .list_products(ProductFilter::status(ProductStatus::Pending))
            .await?;

        let mut summary = RefreshSummary::default();
        for product in pending.iter().filter(|p| p.needs_prediction()) {
            summary.candidates += 1;
            match self.predictor.predict(&prediction_request(product)).await {
                Ok(weight) => match self.store.record_prediction(product.id, weight).await? {
                    Some(_) => summary.updated += 1,
                    None => summary.skipped += 1,
                },
                Err(e) => {
                    tracing::warn!(product_id = %product.id, error = %e, "prediction refresh failed");
                    summary.failed += 1;
                }
            }
        }

        tracing::info!(
            candidates = summary.candidates,
            updated = summary.updated,
            failed = summary.failed,
            "pending predictions refreshed"
        );
        Ok(summary)
    }

    pub async fn list_history(&self) -> LifecycleResult<Vec<HistoryRecord>> {
        Ok(self.store.list_history().await?)
    }

    pub async fn delete_history(&self, id: HistoryId) -> LifecycleResult<()> {
        self.store.delete_history(id).await?;
        tracing::info!(history_id = %id, "history record deleted");
        Ok(())
    }

    pub async fn create_quote(&self, cmd: CreateQuote) -> LifecycleResult<Quote> {
        let new = NewQuote::new(cmd)?;
        let quote = self.store.insert_quote(new).await?;
        tracing::info!(quote_id = %quote.id, "quote created");
        Ok(quote)
    }

    pub async fn list_quotes(&self) -> LifecycleResult<Vec<Quote>> {
        Ok(self.store.list_quotes().await?)
    }

    /// Review a pending quote. Accepting archives it into history.
    pub async fn change_quote_status(&self, id: QuoteId, target: &str) -> LifecycleResult<QuoteStatusChange> {
        let decision: ReviewDecision = target.parse()?;
        let current = self.store.get_quote(id).await?;
        let next = current.review(decision)?;

        match decision {
            ReviewDecision::Accepted => {
                let receipt = self.archive(ArchiveSubject::Quote(id), None).await?;
                match receipt.entity {
                    ArchivedEntity::Quote(quote) => Ok(QuoteStatusChange {
                        quote,
                        history: Some(receipt.record),
                    }),
                    ArchivedEntity::Product(_) => Err(LifecycleError::Store(StoreError::Backend(
                        "archival of a quote returned a product".to_string(),
                    ))),
                }
            }
            ReviewDecision::Canceled => {
                let quote = self
                    .store
                    .transition_quote_status(id, current.status, next)
                    .await?;
                tracing::info!(quote_id = %id, "quote canceled");
                Ok(QuoteStatusChange { quote, history: None })
            }
        }
    }
}

fn prediction_request(product: &Product) -> PredictionRequest {
    PredictionRequest::new(product.category.as_deref(), product.sub_category.as_deref())
}
