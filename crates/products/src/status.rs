//! Status enumerations and the transition graph.
//!
//! ```text
//! pending ──accept──▶ accepted ──record real weight──▶ history
//!    │
//!    └──cancel──▶ canceled
//! ```
//!
//! `canceled` and `history` are terminal. `quoting` is a legacy value that may be
//! supplied on creation but has no outgoing review transition.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use scaleflow_core::{DomainError, DomainResult};

/// Product status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Pending,
    Accepted,
    Canceled,
    History,
    Quoting,
}

impl ProductStatus {
    pub const ALL: [ProductStatus; 5] = [
        ProductStatus::Pending,
        ProductStatus::Accepted,
        ProductStatus::Canceled,
        ProductStatus::History,
        ProductStatus::Quoting,
    ];

    /// Statuses a caller may request explicitly when creating a product.
    pub const CREATABLE: [ProductStatus; 4] = [
        ProductStatus::Pending,
        ProductStatus::Accepted,
        ProductStatus::Canceled,
        ProductStatus::Quoting,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProductStatus::Pending => "pending",
            ProductStatus::Accepted => "accepted",
            ProductStatus::Canceled => "canceled",
            ProductStatus::History => "history",
            ProductStatus::Quoting => "quoting",
        }
    }

    /// Parse a status supplied on creation. `history` is only reachable by archival.
    pub fn parse_for_creation(s: &str) -> DomainResult<Self> {
        let status: ProductStatus = s.parse()?;
        if !Self::CREATABLE.contains(&status) {
            return Err(DomainError::validation(format!(
                "status '{s}' cannot be set on creation (expected one of: pending, accepted, canceled, quoting)"
            )));
        }
        Ok(status)
    }

    /// Validate a review decision against the current status.
    pub fn review(self, decision: ReviewDecision) -> DomainResult<ProductStatus> {
        if self != ProductStatus::Pending {
            return Err(DomainError::invalid_transition(format!(
                "cannot change status from '{}' to '{}': only pending products can be reviewed",
                self.as_str(),
                decision.as_str()
            )));
        }
        Ok(decision.product_status())
    }
}

impl FromStr for ProductStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                DomainError::validation(format!(
                    "unknown status '{s}' (expected one of: pending, accepted, canceled, history, quoting)"
                ))
            })
    }
}

impl core::fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quote status lifecycle (legacy entity).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteStatus {
    Pending,
    Accepted,
    Canceled,
}

impl QuoteStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            QuoteStatus::Pending => "pending",
            QuoteStatus::Accepted => "accepted",
            QuoteStatus::Canceled => "canceled",
        }
    }

    pub fn review(self, decision: ReviewDecision) -> DomainResult<QuoteStatus> {
        if self != QuoteStatus::Pending {
            return Err(DomainError::invalid_transition(format!(
                "cannot change quote status from '{}' to '{}': only pending quotes can be reviewed",
                self.as_str(),
                decision.as_str()
            )));
        }
        Ok(decision.quote_status())
    }
}

impl FromStr for QuoteStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(QuoteStatus::Pending),
            "accepted" => Ok(QuoteStatus::Accepted),
            "canceled" => Ok(QuoteStatus::Canceled),
            other => Err(DomainError::validation(format!(
                "unknown quote status '{other}' (expected one of: pending, accepted, canceled)"
            ))),
        }
    }
}

/// Operator decision on a pending item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Accepted,
    Canceled,
}

impl ReviewDecision {
    pub fn as_str(self) -> &'static str {
        match self {
            ReviewDecision::Accepted => "accepted",
            ReviewDecision::Canceled => "canceled",
        }
    }

    pub fn product_status(self) -> ProductStatus {
        match self {
            ReviewDecision::Accepted => ProductStatus::Accepted,
            ReviewDecision::Canceled => ProductStatus::Canceled,
        }
    }

    pub fn quote_status(self) -> QuoteStatus {
        match self {
            ReviewDecision::Accepted => QuoteStatus::Accepted,
            ReviewDecision::Canceled => QuoteStatus::Canceled,
        }
    }
}

impl FromStr for ReviewDecision {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "accepted" => Ok(ReviewDecision::Accepted),
            "canceled" => Ok(ReviewDecision::Canceled),
            other => Err(DomainError::validation(format!(
                "status '{other}' is not a review decision (expected: accepted or canceled)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_every_known_status() {
        for status in ProductStatus::ALL {
            assert_eq!(status.as_str().parse::<ProductStatus>().unwrap(), status);
        }
    }

    #[test]
    fn parse_rejects_unknown_status() {
        let err = "estimated".parse::<ProductStatus>().unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn history_cannot_be_requested_on_creation() {
        let err = ProductStatus::parse_for_creation("history").unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(
            ProductStatus::parse_for_creation("quoting").unwrap(),
            ProductStatus::Quoting
        );
    }

    #[test]
    fn pending_can_be_accepted_or_canceled() {
        assert_eq!(
            ProductStatus::Pending.review(ReviewDecision::Accepted).unwrap(),
            ProductStatus::Accepted
        );
        assert_eq!(
            ProductStatus::Pending.review(ReviewDecision::Canceled).unwrap(),
            ProductStatus::Canceled
        );
    }

    #[test]
    fn canceled_and_accepted_cannot_swap() {
        let err = ProductStatus::Canceled.review(ReviewDecision::Accepted).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));

        let err = ProductStatus::Accepted.review(ReviewDecision::Canceled).unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn only_pending_has_review_transitions() {
        for status in ProductStatus::ALL {
            for decision in [ReviewDecision::Accepted, ReviewDecision::Canceled] {
                let res = status.review(decision);
                assert_eq!(res.is_ok(), status == ProductStatus::Pending, "{status} -> {decision:?}");
            }
        }
    }

    #[test]
    fn review_decision_rejects_pending_and_history() {
        assert!("pending".parse::<ReviewDecision>().is_err());
        assert!("history".parse::<ReviewDecision>().is_err());
    }

    #[test]
    fn quote_review_is_pending_only() {
        assert_eq!(
            QuoteStatus::Pending.review(ReviewDecision::Accepted).unwrap(),
            QuoteStatus::Accepted
        );
        assert!(matches!(
            QuoteStatus::Canceled.review(ReviewDecision::Accepted),
            Err(DomainError::InvalidTransition(_))
        ));
    }

    #[test]
    fn serde_uses_lowercase_names() {
        assert_eq!(serde_json::to_string(&ProductStatus::History).unwrap(), "\"history\"");
        let s: QuoteStatus = serde_json::from_str("\"canceled\"").unwrap();
        assert_eq!(s, QuoteStatus::Canceled);
    }
}
