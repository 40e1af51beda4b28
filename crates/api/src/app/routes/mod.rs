use axum::Router;

use scaleflow_infra::store::LifecycleStore;
use scaleflow_prediction::WeightPredictor;

pub mod history;
pub mod products;
pub mod quotes;
pub mod system;

/// Router for every resource endpoint.
pub fn router<S, P>() -> Router
where
    S: LifecycleStore,
    P: WeightPredictor,
{
    Router::new()
        .nest("/products", products::router::<S, P>())
        .nest("/quotes", quotes::router::<S, P>())
        .nest("/history", history::router::<S, P>())
}
