//! History records and the archival snapshot contract.
//!
//! A history record is a point-in-time copy of a product (or quote) taken when it is
//! archived. It holds denormalized values, never a live reference, so the source row
//! may later change or be deleted without affecting it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use scaleflow_core::{DomainResult, Entity, HistoryId, ProductId, QuoteId, Weight};

use crate::product::Product;
use crate::quote::Quote;

/// Which entity kind produced a history record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistorySource {
    Product,
    Quote,
}

impl HistorySource {
    pub fn as_str(self) -> &'static str {
        match self {
            HistorySource::Product => "product",
            HistorySource::Quote => "quote",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "product" => Some(HistorySource::Product),
            "quote" => Some(HistorySource::Quote),
            _ => None,
        }
    }
}

/// Immutable archival snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: HistoryId,
    /// Back-reference to the originating product or quote (lookup only).
    pub quote_id: Uuid,
    pub source: HistorySource,
    pub product_name: String,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub estimated_weight: Option<Weight>,
    pub predicted_weight: Option<Weight>,
    pub real_weight: Option<Weight>,
    pub created_at: DateTime<Utc>,
}

impl Entity for HistoryRecord {
    type Id = HistoryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Snapshot fields before the history store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewHistoryRecord {
    pub quote_id: Uuid,
    pub source: HistorySource,
    pub product_name: String,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub estimated_weight: Option<Weight>,
    pub predicted_weight: Option<Weight>,
    pub real_weight: Option<Weight>,
}

impl NewHistoryRecord {
    pub fn into_record(self, id: HistoryId, created_at: DateTime<Utc>) -> HistoryRecord {
        HistoryRecord {
            id,
            quote_id: self.quote_id,
            source: self.source,
            product_name: self.product_name,
            category: self.category,
            sub_category: self.sub_category,
            estimated_weight: self.estimated_weight,
            predicted_weight: self.predicted_weight,
            real_weight: self.real_weight,
            created_at,
        }
    }
}

/// The entity an archival operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveSubject {
    Product(ProductId),
    Quote(QuoteId),
}

impl ArchiveSubject {
    pub fn source(self) -> HistorySource {
        match self {
            ArchiveSubject::Product(_) => HistorySource::Product,
            ArchiveSubject::Quote(_) => HistorySource::Quote,
        }
    }

    pub fn uuid(self) -> Uuid {
        match self {
            ArchiveSubject::Product(id) => *id.as_uuid(),
            ArchiveSubject::Quote(id) => *id.as_uuid(),
        }
    }
}

/// The source entity after a successful archival, as persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum ArchivedEntity {
    Product(Product),
    Quote(Quote),
}

/// An entity that can be archived into history.
///
/// Stores drive the archival unit through this trait so products and quotes share one
/// implementation of "lock row, check, snapshot, insert history, update source":
///
/// 1. `ensure_archivable` on the freshly read row (inside the store's transaction),
/// 2. `snapshot` to build the history insert,
/// 3. `archived` to build the updated source row.
pub trait Archivable: Entity + Clone {
    const SOURCE: HistorySource;

    fn ensure_archivable(&self) -> DomainResult<()>;

    fn snapshot(&self, real_weight: Option<Weight>) -> NewHistoryRecord;

    fn archived(self, real_weight: Option<Weight>) -> Self;
}
