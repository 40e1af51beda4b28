use serde::{Deserialize, Serialize};

use scaleflow_core::Weight;

use crate::error::PredictionError;

/// Payload sent to the prediction service.
///
/// Categorical features are normalized (trimmed, lower-cased) because the model is
/// trained on normalized values; absent features are sent as empty strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub category: String,
    pub sub_category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature1: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature2: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature3: Option<f64>,
}

impl PredictionRequest {
    pub fn new(category: Option<&str>, sub_category: Option<&str>) -> Self {
        Self {
            category: normalize_feature(category),
            sub_category: normalize_feature(sub_category),
            feature1: None,
            feature2: None,
            feature3: None,
        }
    }
}

fn normalize_feature(value: Option<&str>) -> String {
    value.map(|v| v.trim().to_lowercase()).unwrap_or_default()
}

/// Response of the prediction service: `{"prediction": n}` or `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PredictionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PredictionResponse {
    pub fn prediction(value: f64) -> Self {
        Self {
            prediction: Some(value),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            prediction: None,
            error: Some(message.into()),
        }
    }

    /// Interpret the payload. An `error` field wins over a `prediction` field.
    pub fn into_result(self) -> Result<Weight, PredictionError> {
        if let Some(err) = self.error {
            return Err(PredictionError::Rejected(err));
        }
        let value = self
            .prediction
            .ok_or_else(|| PredictionError::Malformed("missing 'prediction' field".to_string()))?;
        Weight::new(value).map_err(|e| PredictionError::Malformed(e.to_string()))
    }
}
