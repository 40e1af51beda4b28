//! External service clients.

pub mod http_predictor;

pub use http_predictor::HttpWeightPredictor;
