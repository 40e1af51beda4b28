//! Legacy quote entity.
//!
//! Quotes predate the product workflow: they always start `pending`, and accepting one
//! archives it straight into history (without a measured weight).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use scaleflow_core::{DomainError, DomainResult, Entity, QuoteId, Weight};

use crate::history::{Archivable, HistorySource, NewHistoryRecord};
use crate::product::{normalize_optional, required_name};
use crate::status::{QuoteStatus, ReviewDecision};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub product_name: String,
    pub category: String,
    pub estimated_weight: Weight,
    pub predicted_weight: Option<Weight>,
    pub status: QuoteStatus,
    pub created_at: DateTime<Utc>,
}

impl Entity for Quote {
    type Id = QuoteId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Quote {
    pub fn review(&self, decision: ReviewDecision) -> DomainResult<QuoteStatus> {
        self.status.review(decision)
    }
}

impl Archivable for Quote {
    const SOURCE: HistorySource = HistorySource::Quote;

    fn ensure_archivable(&self) -> DomainResult<()> {
        self.review(ReviewDecision::Accepted).map(|_| ())
    }

    fn snapshot(&self, real_weight: Option<Weight>) -> NewHistoryRecord {
        NewHistoryRecord {
            quote_id: *self.id.as_uuid(),
            source: Self::SOURCE,
            product_name: self.product_name.clone(),
            category: Some(self.category.clone()),
            sub_category: None,
            estimated_weight: Some(self.estimated_weight),
            predicted_weight: self.predicted_weight,
            real_weight,
        }
    }

    fn archived(mut self, _real_weight: Option<Weight>) -> Self {
        self.status = QuoteStatus::Accepted;
        self
    }
}

/// Command: create a quote (raw caller input).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CreateQuote {
    pub product_name: Option<String>,
    pub category: Option<String>,
    pub estimated_weight: Option<f64>,
    pub predicted_weight: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewQuote {
    pub product_name: String,
    pub category: String,
    pub estimated_weight: Weight,
    pub predicted_weight: Option<Weight>,
}

impl NewQuote {
    pub fn new(cmd: CreateQuote) -> DomainResult<Self> {
        let product_name = required_name(cmd.product_name.as_deref())?;
        let category = normalize_optional(cmd.category.as_deref())
            .ok_or_else(|| DomainError::validation("category is required"))?;
        let estimated_weight = cmd
            .estimated_weight
            .ok_or_else(|| DomainError::validation("estimated_weight is required"))
            .and_then(Weight::new)?;
        let predicted_weight = cmd.predicted_weight.map(Weight::new).transpose()?;

        Ok(Self {
            product_name,
            category,
            estimated_weight,
            predicted_weight,
        })
    }

    pub fn into_quote(self, id: QuoteId, created_at: DateTime<Utc>) -> Quote {
        Quote {
            id,
            product_name: self.product_name,
            category: self.category,
            estimated_weight: self.estimated_weight,
            predicted_weight: self.predicted_weight,
            status: QuoteStatus::Pending,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_cmd() -> CreateQuote {
        CreateQuote {
            product_name: Some("Pallet".into()),
            category: Some("bulk".into()),
            estimated_weight: Some(120.0),
            predicted_weight: Some(118.5),
        }
    }

    #[test]
    fn create_requires_name_category_and_estimate() {
        let missing_name = CreateQuote {
            product_name: None,
            ..valid_cmd()
        };
        let missing_category = CreateQuote {
            category: Some(" ".into()),
            ..valid_cmd()
        };
        let missing_estimate = CreateQuote {
            estimated_weight: None,
            ..valid_cmd()
        };
        for cmd in [missing_name, missing_category, missing_estimate] {
            assert!(matches!(NewQuote::new(cmd), Err(DomainError::Validation(_))));
        }
    }

    #[test]
    fn quotes_always_start_pending() {
        let q = NewQuote::new(valid_cmd())
            .unwrap()
            .into_quote(QuoteId::new(), Utc::now());
        assert_eq!(q.status, QuoteStatus::Pending);
    }

    #[test]
    fn accepting_snapshots_without_real_weight() {
        let q = NewQuote::new(valid_cmd())
            .unwrap()
            .into_quote(QuoteId::new(), Utc::now());
        q.ensure_archivable().unwrap();

        let snap = q.snapshot(None);
        assert_eq!(snap.source, HistorySource::Quote);
        assert_eq!(snap.quote_id, *q.id.as_uuid());
        assert_eq!(snap.category.as_deref(), Some("bulk"));
        assert_eq!(snap.real_weight, None);
        assert_eq!(snap.predicted_weight.map(Weight::value), Some(118.5));

        let archived = q.archived(None);
        assert_eq!(archived.status, QuoteStatus::Accepted);
    }

    #[test]
    fn reviewed_quotes_cannot_be_archived_again() {
        let mut q = NewQuote::new(valid_cmd())
            .unwrap()
            .into_quote(QuoteId::new(), Utc::now());
        q.status = QuoteStatus::Accepted;
        assert!(matches!(
            q.ensure_archivable(),
            Err(DomainError::InvalidTransition(_))
        ));
    }
}
