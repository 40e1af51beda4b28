//! Persistence boundary for products, quotes and history.
//!
//! The lifecycle engine never holds a lock across operations: every read-modify-write
//! that must be serialized per row (status changes, archival) is expressed as a single
//! store call so the backend can enforce it (compare-and-set or a transaction).

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use scaleflow_core::{DomainError, HistoryId, ProductId, QuoteId, Weight};
use scaleflow_products::{
    ArchiveSubject, ArchivedEntity, HistoryRecord, HistorySource, NewHistoryRecord, NewProduct,
    NewQuote, Product, ProductStatus, Quote, QuoteStatus,
};

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Store operation error.
///
/// These are **infrastructure errors**; deterministic domain checks that must run
/// inside a store transaction come back as `Rejected`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,

    /// A compare-and-set lost against a concurrent writer.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A domain rule evaluated on the locked row refused the operation.
    #[error("rejected: {0}")]
    Rejected(DomainError),

    /// Archival aborted before anything was written.
    #[error("archival failed inserting the history record: {0}")]
    ArchiveHistoryInsert(String),

    /// Archival wrote the history record but could not update the source row; the
    /// record stays behind and needs reconciling.
    #[error("archival inserted history record {history_id} but failed updating the {kind} row: {message}")]
    ArchiveSourceUpdate {
        kind: &'static str,
        history_id: HistoryId,
        message: String,
    },

    /// Archival failed updating the source row and its history insert was rolled back
    /// with it; nothing was written.
    #[error("archival failed updating the {kind} row, history insert rolled back: {message}")]
    ArchiveRolledBack { kind: &'static str, message: String },

    #[error("storage error: {0}")]
    Backend(String),
}

impl StoreError {
    pub(crate) fn source_update(kind: HistorySource, history_id: HistoryId, message: impl Into<String>) -> Self {
        Self::ArchiveSourceUpdate {
            kind: kind.as_str(),
            history_id,
            message: message.into(),
        }
    }

    pub(crate) fn rolled_back(kind: HistorySource, message: impl Into<String>) -> Self {
        Self::ArchiveRolledBack {
            kind: kind.as_str(),
            message: message.into(),
        }
    }

    /// Whether a failed archival left a history record without its source update.
    pub fn orphaned_history(&self) -> Option<HistoryId> {
        match self {
            Self::ArchiveSourceUpdate { history_id, .. } => Some(*history_id),
            _ => None,
        }
    }
}

/// Product listing filter (results are always `created_at DESC`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProductFilter {
    pub status: Option<ProductStatus>,
}

impl ProductFilter {
    pub fn status(status: ProductStatus) -> Self {
        Self {
            status: Some(status),
        }
    }

    pub fn matches(&self, product: &Product) -> bool {
        self.status.is_none_or(|s| product.status == s)
    }
}

/// Outcome of a successful archival unit.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveReceipt {
    pub record: HistoryRecord,
    pub entity: ArchivedEntity,
}

#[async_trait]
pub trait ProductStore: Send + Sync + 'static {
    async fn insert_product(&self, product: NewProduct) -> StoreResult<Product>;

    /// Insert a batch atomically: either every row is committed or none is.
    async fn insert_products(&self, batch: Vec<NewProduct>) -> StoreResult<Vec<Product>>;

    async fn get_product(&self, id: ProductId) -> StoreResult<Product>;

    async fn list_products(&self, filter: ProductFilter) -> StoreResult<Vec<Product>>;

    /// Persist descriptive fields of `product` (name, categories, estimate, notes).
    ///
    /// Guarded by the status the caller read: `Conflict` if it changed meanwhile.
    async fn update_product_details(&self, product: &Product) -> StoreResult<Product>;

    /// Compare-and-set on status: `Conflict` if the stored status is not `from`.
    async fn transition_product_status(
        &self,
        id: ProductId,
        from: ProductStatus,
        to: ProductStatus,
    ) -> StoreResult<Product>;

    /// Best-effort prediction write; only applied while the product is `pending`.
    ///
    /// Returns `None` when the product is gone or no longer pending.
    async fn record_prediction(&self, id: ProductId, weight: Weight) -> StoreResult<Option<Product>>;

    async fn delete_product(&self, id: ProductId) -> StoreResult<()>;
}

#[async_trait]
pub trait QuoteStore: Send + Sync + 'static {
    async fn insert_quote(&self, quote: NewQuote) -> StoreResult<Quote>;

    async fn get_quote(&self, id: QuoteId) -> StoreResult<Quote>;

    async fn list_quotes(&self) -> StoreResult<Vec<Quote>>;

    async fn transition_quote_status(
        &self,
        id: QuoteId,
        from: QuoteStatus,
        to: QuoteStatus,
    ) -> StoreResult<Quote>;
}

/// Append-only from the engine's point of view: no update is exposed.
#[async_trait]
pub trait HistoryStore: Send + Sync + 'static {
    async fn insert_history(&self, record: NewHistoryRecord) -> StoreResult<HistoryRecord>;

    async fn list_history(&self) -> StoreResult<Vec<HistoryRecord>>;

    async fn delete_history(&self, id: HistoryId) -> StoreResult<()>;
}

/// The archival unit, shared by every archivable entity kind.
///
/// Implementations must:
/// 1. read (and lock, where supported) the subject row,
/// 2. run `Archivable::ensure_archivable` on it,
/// 3. insert the snapshot into history,
/// 4. write the archived row,
///
/// in the narrowest transaction available, with the history insert happening before
/// the source update.
#[async_trait]
pub trait ArchiveStore: Send + Sync + 'static {
    async fn archive(
        &self,
        subject: ArchiveSubject,
        real_weight: Option<Weight>,
    ) -> StoreResult<ArchiveReceipt>;
}

/// Everything the lifecycle engine needs from persistence.
pub trait LifecycleStore: ProductStore + QuoteStore + HistoryStore + ArchiveStore {}

impl<S> LifecycleStore for S where S: ProductStore + QuoteStore + HistoryStore + ArchiveStore {}
