//! HTTP client for the weight-prediction service.
//!
//! Contract: `POST {base_url}/predict` with a [`PredictionRequest`] body, answered by
//! `{"prediction": n}` or `{"error": "..."}`.

use std::time::Duration;

use async_trait::async_trait;

use scaleflow_core::Weight;
use scaleflow_prediction::{PredictionError, PredictionRequest, PredictionResponse, WeightPredictor};

#[derive(Debug, Clone)]
pub struct HttpWeightPredictor {
    client: reqwest::Client,
    predict_url: String,
    timeout: Duration,
}

impl HttpWeightPredictor {
    /// Build a client whose every call is bounded by `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, PredictionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PredictionError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            predict_url: format!("{}/predict", base_url.trim_end_matches('/')),
            timeout,
        })
    }

    pub fn predict_url(&self) -> &str {
        &self.predict_url
    }

    fn map_transport(&self, err: reqwest::Error) -> PredictionError {
        if err.is_timeout() {
            PredictionError::Timeout(self.timeout.as_millis() as u64)
        } else {
            PredictionError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl WeightPredictor for HttpWeightPredictor {
    async fn predict(&self, request: &PredictionRequest) -> Result<Weight, PredictionError> {
        let resp = self
            .client
            .post(&self.predict_url)
            .json(request)
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        let status = resp.status();
        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), "prediction service returned an error status");
            return Err(PredictionError::Status(status.as_u16()));
        }

        let body = resp.bytes().await.map_err(|e| self.map_transport(e))?;
        let payload: PredictionResponse =
            serde_json::from_slice(&body).map_err(|e| PredictionError::Malformed(e.to_string()))?;
        payload.into_result()
    }
}
