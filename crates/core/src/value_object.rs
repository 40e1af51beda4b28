//! Value objects: equality by value, not identity.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// A physical weight.
///
/// Always finite and non-negative. The unit is whatever the operators record
/// (the prediction service is trained on the same unit).
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Weight(f64);

impl Weight {
    pub fn new(value: f64) -> DomainResult<Self> {
        if !value.is_finite() {
            return Err(DomainError::validation("weight must be a finite number"));
        }
        if value < 0.0 {
            return Err(DomainError::validation("weight cannot be negative"));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Weight {
    type Error = DomainError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Weight> for f64 {
    fn from(value: Weight) -> Self {
        value.0
    }
}

impl core::fmt::Display for Weight {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn accepts_zero() {
        assert_eq!(Weight::new(0.0).unwrap().value(), 0.0);
    }

    #[test]
    fn rejects_negative_and_non_finite() {
        assert!(matches!(Weight::new(-0.5), Err(DomainError::Validation(_))));
        assert!(matches!(Weight::new(f64::NAN), Err(DomainError::Validation(_))));
        assert!(matches!(Weight::new(f64::INFINITY), Err(DomainError::Validation(_))));
    }

    #[test]
    fn deserialize_validates() {
        let ok: Weight = serde_json::from_str("12.5").unwrap();
        assert_eq!(ok.value(), 12.5);
        assert!(serde_json::from_str::<Weight>("-1").is_err());
    }

    proptest! {
        /// Property: every finite non-negative value is accepted unchanged.
        #[test]
        fn finite_non_negative_is_accepted(v in 0.0f64..1.0e9) {
            prop_assert_eq!(Weight::new(v).unwrap().value(), v);
        }
    }
}
