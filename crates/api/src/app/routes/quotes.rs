use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};

use scaleflow_core::QuoteId;
use scaleflow_infra::store::LifecycleStore;
use scaleflow_prediction::WeightPredictor;
use scaleflow_products::CreateQuote;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router<S, P>() -> Router
where
    S: LifecycleStore,
    P: WeightPredictor,
{
    Router::new()
        .route("/", post(create_quote::<S, P>).get(list_quotes::<S, P>))
        .route("/:id/status", post(change_quote_status::<S, P>))
}

pub async fn create_quote<S: LifecycleStore, P: WeightPredictor>(
    Extension(services): Extension<Arc<AppServices<S, P>>>,
    body: Result<Json<CreateQuote>, JsonRejection>,
) -> axum::response::Response {
    let cmd = match errors::json_body(body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.engine.create_quote(cmd).await {
        Ok(quote) => (StatusCode::CREATED, Json(quote)).into_response(),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}

pub async fn list_quotes<S: LifecycleStore, P: WeightPredictor>(
    Extension(services): Extension<Arc<AppServices<S, P>>>,
) -> axum::response::Response {
    match services.engine.list_quotes().await {
        Ok(items) => (StatusCode::OK, Json(dto::ItemsResponse::from(items))).into_response(),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}

pub async fn change_quote_status<S: LifecycleStore, P: WeightPredictor>(
    Extension(services): Extension<Arc<AppServices<S, P>>>,
    Path(id): Path<String>,
    body: Result<Json<dto::ChangeStatusRequest>, JsonRejection>,
) -> axum::response::Response {
    let id: QuoteId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let req = match errors::json_body(body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.engine.change_quote_status(id, &req.status).await {
        Ok(change) => (
            StatusCode::OK,
            Json(dto::QuoteStatusResponse {
                quote: change.quote,
                history: change.history,
            }),
        )
            .into_response(),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}
