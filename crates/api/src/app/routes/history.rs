use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
};

use scaleflow_core::HistoryId;
use scaleflow_infra::store::LifecycleStore;
use scaleflow_prediction::WeightPredictor;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router<S, P>() -> Router
where
    S: LifecycleStore,
    P: WeightPredictor,
{
    Router::new()
        .route("/", get(list_history::<S, P>))
        .route("/:id", delete(delete_history::<S, P>))
}

pub async fn list_history<S: LifecycleStore, P: WeightPredictor>(
    Extension(services): Extension<Arc<AppServices<S, P>>>,
) -> axum::response::Response {
    match services.engine.list_history().await {
        Ok(items) => (StatusCode::OK, Json(dto::ItemsResponse::from(items))).into_response(),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}

pub async fn delete_history<S: LifecycleStore, P: WeightPredictor>(
    Extension(services): Extension<Arc<AppServices<S, P>>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: HistoryId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.engine.delete_history(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}
