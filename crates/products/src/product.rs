use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use scaleflow_core::{DomainError, DomainResult, Entity, ProductId, Weight};

use crate::history::{Archivable, HistorySource, NewHistoryRecord};
use crate::status::{ProductStatus, ReviewDecision};

/// A tracked item under weight review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub product_name: String,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub estimated_weight: Option<Weight>,
    pub predicted_weight: Option<Weight>,
    pub real_weight: Option<Weight>,
    pub status: ProductStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Product {
    /// Decide the status a review decision leads to (pure; does not mutate).
    pub fn review(&self, decision: ReviewDecision) -> DomainResult<ProductStatus> {
        self.status.review(decision)
    }

    /// Predictions are only written while the product awaits review.
    pub fn accepts_prediction(&self) -> bool {
        self.status == ProductStatus::Pending
    }

    /// Pending products without a measured weight are candidates for a re-prediction sweep.
    pub fn needs_prediction(&self) -> bool {
        self.accepts_prediction() && self.real_weight.is_none()
    }

    /// Apply an operator edit of descriptive fields.
    ///
    /// Status and weights owned by the workflow (predicted/real) are never touched here.
    pub fn apply_details(&self, patch: &ProductDetailsPatch) -> DomainResult<Product> {
        if self.status == ProductStatus::History {
            return Err(DomainError::invalid_transition(
                "archived products cannot be edited",
            ));
        }

        let mut next = self.clone();
        if let Some(name) = &patch.product_name {
            next.product_name = required_name(Some(name.as_str()))?;
        }
        if let Some(category) = &patch.category {
            next.category = normalize_optional(Some(category.as_str()));
        }
        if let Some(sub_category) = &patch.sub_category {
            next.sub_category = normalize_optional(Some(sub_category.as_str()));
        }
        if let Some(w) = patch.estimated_weight {
            next.estimated_weight = Some(Weight::new(w)?);
        }
        if let Some(notes) = &patch.notes {
            next.notes = normalize_optional(Some(notes.as_str()));
        }
        Ok(next)
    }
}

impl Archivable for Product {
    const SOURCE: HistorySource = HistorySource::Product;

    /// Recording a real weight is allowed from any status.
    fn ensure_archivable(&self) -> DomainResult<()> {
        Ok(())
    }

    fn snapshot(&self, real_weight: Option<Weight>) -> NewHistoryRecord {
        NewHistoryRecord {
            quote_id: *self.id.as_uuid(),
            source: Self::SOURCE,
            product_name: self.product_name.clone(),
            category: self.category.clone(),
            sub_category: self.sub_category.clone(),
            estimated_weight: self.estimated_weight,
            predicted_weight: self.predicted_weight,
            real_weight,
        }
    }

    fn archived(mut self, real_weight: Option<Weight>) -> Self {
        self.real_weight = real_weight;
        self.status = ProductStatus::History;
        self
    }
}

/// Command: create a product (raw caller input).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub product_name: Option<String>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub estimated_weight: Option<f64>,
    pub notes: Option<String>,
    pub status: Option<String>,
}

/// A validated product insert (before the store assigns `id`/`created_at`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub product_name: String,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub estimated_weight: Option<Weight>,
    pub real_weight: Option<Weight>,
    pub status: ProductStatus,
    pub notes: Option<String>,
}

impl NewProduct {
    /// Validate a create command. All checks happen before anything is persisted.
    pub fn new(cmd: CreateProduct) -> DomainResult<Self> {
        let product_name = required_name(cmd.product_name.as_deref())?;

        let status = match cmd.status.as_deref() {
            Some(s) => ProductStatus::parse_for_creation(s)?,
            None => ProductStatus::Pending,
        };

        let estimated_weight = cmd.estimated_weight.map(Weight::new).transpose()?;

        Ok(Self {
            product_name,
            category: normalize_optional(cmd.category.as_deref()),
            sub_category: normalize_optional(cmd.sub_category.as_deref()),
            estimated_weight,
            real_weight: None,
            status,
            notes: normalize_optional(cmd.notes.as_deref()),
        })
    }

    /// Bulk-import insert: already reviewed, with an optional measured weight.
    pub fn imported(
        product_name: String,
        category: Option<String>,
        sub_category: Option<String>,
        real_weight: Option<Weight>,
    ) -> Self {
        Self {
            product_name,
            category,
            sub_category,
            estimated_weight: None,
            real_weight,
            status: ProductStatus::Accepted,
            notes: None,
        }
    }

    /// Only products that start in `pending` get a machine prediction.
    pub fn wants_prediction(&self) -> bool {
        self.status == ProductStatus::Pending
    }

    pub fn into_product(self, id: ProductId, created_at: DateTime<Utc>) -> Product {
        Product {
            id,
            product_name: self.product_name,
            category: self.category,
            sub_category: self.sub_category,
            estimated_weight: self.estimated_weight,
            predicted_weight: None,
            real_weight: self.real_weight,
            status: self.status,
            notes: self.notes,
            created_at,
        }
    }
}

/// Operator edit of descriptive fields. `None` leaves a field unchanged; an empty
/// string clears an optional field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductDetailsPatch {
    pub product_name: Option<String>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub estimated_weight: Option<f64>,
    pub notes: Option<String>,
}

pub(crate) fn required_name(name: Option<&str>) -> DomainResult<String> {
    match name.map(str::trim) {
        Some(n) if !n.is_empty() => Ok(n.to_string()),
        _ => Err(DomainError::validation("product_name is required")),
    }
}

pub(crate) fn normalize_optional(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
