use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use scaleflow_core::ProductId;
use scaleflow_infra::store::LifecycleStore;
use scaleflow_prediction::WeightPredictor;
use scaleflow_products::{CreateProduct, ProductDetailsPatch};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router<S, P>() -> Router
where
    S: LifecycleStore,
    P: WeightPredictor,
{
    Router::new()
        .route("/", post(create_product::<S, P>).get(list_products::<S, P>))
        .route("/import", post(import_products::<S, P>))
        .route("/predictions/refresh", post(refresh_predictions::<S, P>))
        .route(
            "/:id",
            get(get_product::<S, P>)
                .patch(update_product::<S, P>)
                .delete(delete_product::<S, P>),
        )
        .route("/:id/status", post(change_status::<S, P>))
        .route("/:id/real-weight", post(record_real_weight::<S, P>))
        .route("/:id/predict", post(predict_now::<S, P>))
}

pub async fn create_product<S: LifecycleStore, P: WeightPredictor>(
    Extension(services): Extension<Arc<AppServices<S, P>>>,
    body: Result<Json<CreateProduct>, JsonRejection>,
) -> axum::response::Response {
    let cmd = match errors::json_body(body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.engine.create(cmd).await {
        // The prediction task keeps running after its handle is dropped.
        Ok(created) => (StatusCode::CREATED, Json(created.product)).into_response(),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}

pub async fn list_products<S: LifecycleStore, P: WeightPredictor>(
    Extension(services): Extension<Arc<AppServices<S, P>>>,
    Query(query): Query<dto::ListProductsQuery>,
) -> axum::response::Response {
    match services.engine.list(query.status.as_deref()).await {
        Ok(items) => (StatusCode::OK, Json(dto::ItemsResponse::from(items))).into_response(),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}

pub async fn get_product<S: LifecycleStore, P: WeightPredictor>(
    Extension(services): Extension<Arc<AppServices<S, P>>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ProductId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.engine.get(id).await {
        Ok(product) => (StatusCode::OK, Json(product)).into_response(),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}

pub async fn update_product<S: LifecycleStore, P: WeightPredictor>(
    Extension(services): Extension<Arc<AppServices<S, P>>>,
    Path(id): Path<String>,
    body: Result<Json<ProductDetailsPatch>, JsonRejection>,
) -> axum::response::Response {
    let id: ProductId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let patch = match errors::json_body(body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.engine.update_details(id, patch).await {
        Ok(product) => (StatusCode::OK, Json(product)).into_response(),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}

pub async fn delete_product<S: LifecycleStore, P: WeightPredictor>(
    Extension(services): Extension<Arc<AppServices<S, P>>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ProductId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.engine.delete(id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}

pub async fn change_status<S: LifecycleStore, P: WeightPredictor>(
    Extension(services): Extension<Arc<AppServices<S, P>>>,
    Path(id): Path<String>,
    body: Result<Json<dto::ChangeStatusRequest>, JsonRejection>,
) -> axum::response::Response {
    let id: ProductId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let req = match errors::json_body(body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.engine.change_status(id, &req.status).await {
        Ok(product) => (StatusCode::OK, Json(product)).into_response(),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}

pub async fn record_real_weight<S: LifecycleStore, P: WeightPredictor>(
    Extension(services): Extension<Arc<AppServices<S, P>>>,
    Path(id): Path<String>,
    body: Result<Json<dto::RecordRealWeightRequest>, JsonRejection>,
) -> axum::response::Response {
    let id: ProductId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let req = match errors::json_body(body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.engine.record_real_weight(id, req.real_weight).await {
        Ok(archived) => (
            StatusCode::OK,
            Json(dto::ArchivedProductResponse {
                product: archived.product,
                history: archived.history,
            }),
        )
            .into_response(),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}

pub async fn predict_now<S: LifecycleStore, P: WeightPredictor>(
    Extension(services): Extension<Arc<AppServices<S, P>>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ProductId = match errors::parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.engine.predict_now(id).await {
        Ok(outcome) => (StatusCode::OK, Json(dto::PredictResponse::from(outcome))).into_response(),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}

pub async fn refresh_predictions<S: LifecycleStore, P: WeightPredictor>(
    Extension(services): Extension<Arc<AppServices<S, P>>>,
) -> axum::response::Response {
    match services.engine.refresh_pending_predictions().await {
        Ok(summary) => (StatusCode::OK, Json(dto::RefreshResponse::from(summary))).into_response(),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}

pub async fn import_products<S: LifecycleStore, P: WeightPredictor>(
    Extension(services): Extension<Arc<AppServices<S, P>>>,
    body: Result<Json<dto::ImportRequest>, JsonRejection>,
) -> axum::response::Response {
    let req = match errors::json_body(body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let report = services.import.run(&req.rows).await;
    let status = if report.is_complete() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(report)).into_response()
}
