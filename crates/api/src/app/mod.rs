//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store/predictor wiring behind the lifecycle engine
//! - `routes/`: HTTP routes + handlers (one file per resource)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use scaleflow_infra::config::Settings;
use scaleflow_infra::store::LifecycleStore;
use scaleflow_prediction::WeightPredictor;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::AppServices;

/// Build the full HTTP router from settings (public entrypoint used by `main.rs`).
pub async fn build_app(settings: &Settings) -> anyhow::Result<Router> {
    services::build_app(settings).await
}

/// Build the router over already-wired services.
pub fn router<S, P>(services: Arc<AppServices<S, P>>) -> Router
where
    S: LifecycleStore,
    P: WeightPredictor,
{
    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router::<S, P>())
        .layer(Extension(services))
        .layer(ServiceBuilder::new())
}
