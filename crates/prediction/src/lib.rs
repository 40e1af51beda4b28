//! `scaleflow-prediction`
//!
//! **Responsibility:** boundary contract of the external weight-prediction service.
//!
//! This crate is intentionally **not** part of the domain model:
//! - It must not depend on product aggregates or stores.
//! - It must not mutate domain state; callers decide what to do with an estimate.
//! - Transports (HTTP, stubs) implement [`WeightPredictor`] elsewhere.

pub mod error;
pub mod predictor;
pub mod request;

pub use error::PredictionError;
pub use predictor::WeightPredictor;
pub use request::{PredictionRequest, PredictionResponse};
