use std::sync::Arc;

use async_trait::async_trait;

use scaleflow_core::Weight;

use crate::error::PredictionError;
use crate::request::PredictionRequest;

/// A (possibly slow, possibly unavailable) weight estimator.
///
/// Implementations must bound their own latency (e.g. a request timeout) and map every
/// transport problem to a [`PredictionError`].
#[async_trait]
pub trait WeightPredictor: Send + Sync + 'static {
    async fn predict(&self, request: &PredictionRequest) -> Result<Weight, PredictionError>;
}

#[async_trait]
impl<P> WeightPredictor for Arc<P>
where
    P: WeightPredictor + ?Sized,
{
    async fn predict(&self, request: &PredictionRequest) -> Result<Weight, PredictionError> {
        (**self).predict(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(f64);

    #[async_trait]
    impl WeightPredictor for Fixed {
        async fn predict(&self, _request: &PredictionRequest) -> Result<Weight, PredictionError> {
            Weight::new(self.0).map_err(|e| PredictionError::Malformed(e.to_string()))
        }
    }

    #[tokio::test]
    async fn shared_predictors_delegate() {
        let shared: Arc<dyn WeightPredictor> = Arc::new(Fixed(2.5));
        let req = PredictionRequest::new(Some("a"), Some("b"));
        assert_eq!(shared.predict(&req).await.unwrap().value(), 2.5);
    }
}
