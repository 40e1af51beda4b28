use std::time::Duration;

use axum::{Json, Router, http::StatusCode as AxumStatus, response::IntoResponse, routing::post};
use reqwest::StatusCode;
use serde_json::{Value, json};

use scaleflow_infra::config::Settings;

struct TestServer {
    base_url: String,
    handles: Vec<tokio::task::JoinHandle<()>>,
}

/// Fake prediction service: `{"prediction": 3.2}`, or 503 for category "broken".
async fn fake_predict(Json(body): Json<Value>) -> axum::response::Response {
    if body["category"] == "broken" {
        return (AxumStatus::SERVICE_UNAVAILABLE, "down").into_response();
    }
    Json(json!({ "prediction": 3.2 })).into_response()
}

async fn serve(app: Router) -> (String, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind ephemeral port");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), handle)
}

impl TestServer {
    async fn spawn() -> Self {
        let (predictor_url, predictor) = serve(Router::new().route("/predict", post(fake_predict))).await;

        // Same router as prod (in-memory stores), bound to an ephemeral port.
        let settings = Settings {
            predictor_url,
            predictor_timeout: Duration::from_secs(2),
            import_batch_size: 2,
            ..Settings::default()
        };
        let app = scaleflow_api::app::build_app(&settings).await.unwrap();
        let (base_url, api) = serve(app).await;

        Self {
            base_url,
            handles: vec![predictor, api],
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        for h in &self.handles {
            h.abort();
        }
    }
}

async fn create_product(client: &reqwest::Client, srv: &TestServer, body: Value) -> Value {
    let res = client.post(srv.url("/products")).json(&body).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    res.json().await.unwrap()
}

async fn predicted_eventually(client: &reqwest::Client, srv: &TestServer, id: &str) -> Value {
    // Prediction runs in the background after creation; poll briefly.
    for _ in 0..100 {
        let product: Value = client
            .get(srv.url(&format!("/products/{id}")))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if !product["predicted_weight"].is_null() {
            return product;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("prediction was not recorded within timeout");
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(srv.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn created_product_gets_background_prediction() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let created = create_product(
        &client,
        &srv,
        json!({ "product_name": "Box A", "category": "fragile", "estimated_weight": 4.0 }),
    )
    .await;
    assert_eq!(created["status"], "pending");

    let id = created["id"].as_str().unwrap();
    let product = predicted_eventually(&client, &srv, id).await;
    assert_eq!(product["predicted_weight"], 3.2);
    assert_eq!(product["status"], "pending");
}

#[tokio::test]
async fn invalid_input_is_a_400_with_error_body() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/products"))
        .json(&json!({ "product_name": "  ", "status": "pending" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");

    let res = client
        .post(srv.url("/products"))
        .json(&json!({ "product_name": "Box", "status": "history" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client.get(srv.url("/products/not-a-uuid")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_id");
}

#[tokio::test]
async fn unknown_ids_are_404() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let missing = "0190b6a0-0000-7000-8000-000000000000";

    let res = client.get(srv.url(&format!("/products/{missing}"))).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .post(srv.url(&format!("/products/{missing}/real-weight")))
        .json(&json!({ "real_weight": 1.0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client.delete(srv.url(&format!("/history/{missing}"))).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn review_then_archive_flow() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let created = create_product(
        &client,
        &srv,
        json!({ "product_name": "Box A", "category": "fragile", "estimated_weight": 4.0 }),
    )
    .await;
    let id = created["id"].as_str().unwrap().to_string();
    predicted_eventually(&client, &srv, &id).await;

    let res = client
        .post(srv.url(&format!("/products/{id}/status")))
        .json(&json!({ "status": "accepted" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .post(srv.url(&format!("/products/{id}/status")))
        .json(&json!({ "status": "canceled" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_transition");

    let res = client
        .post(srv.url(&format!("/products/{id}/real-weight")))
        .json(&json!({ "real_weight": 12.5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let archived: Value = res.json().await.unwrap();
    assert_eq!(archived["product"]["status"], "history");
    assert_eq!(archived["product"]["real_weight"], 12.5);

    let history: Value = client.get(srv.url("/history")).send().await.unwrap().json().await.unwrap();
    let items = history["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["quote_id"], id.as_str());
    assert_eq!(items[0]["estimated_weight"], 4.0);
    assert_eq!(items[0]["predicted_weight"], 3.2);

    let res = client
        .post(srv.url(&format!("/products/{id}/real-weight")))
        .json(&json!({ "real_weight": -1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn explicit_prediction_failure_is_502() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let created = create_product(&client, &srv, json!({ "product_name": "Drum", "category": "broken" })).await;
    let id = created["id"].as_str().unwrap();

    let res = client
        .post(srv.url(&format!("/products/{id}/predict")))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);

    let product: Value = client
        .get(srv.url(&format!("/products/{id}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(product["status"], "pending");
    assert!(product["predicted_weight"].is_null());
}

#[tokio::test]
async fn import_reports_row_errors_and_filters_by_status() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/products/import"))
        .json(&json!({ "rows": [
            { "product_name": null, "category": "x" },
            { "Item Name": "Crate", "Weight": "14.2" },
            { "name": "Pallet" }
        ]}))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let report: Value = res.json().await.unwrap();
    assert_eq!(report["accepted"], 2);
    assert_eq!(report["rejected"], 1);
    assert_eq!(report["errors"][0]["row"], 0);

    let accepted: Value = client
        .get(srv.url("/products?status=accepted"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(accepted["items"].as_array().unwrap().len(), 2);

    let res = client.get(srv.url("/products?status=estimated")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client.get(srv.url("/products?status=")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let all: Value = res.json().await.unwrap();
    assert_eq!(all["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn accepting_a_quote_archives_it() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(srv.url("/quotes"))
        .json(&json!({ "product_name": "Pallet", "category": "bulk", "estimated_weight": 120.0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let quote: Value = res.json().await.unwrap();
    let id = quote["id"].as_str().unwrap();

    let res = client
        .post(srv.url(&format!("/quotes/{id}/status")))
        .json(&json!({ "status": "accepted" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["quote"]["status"], "accepted");
    assert_eq!(body["history"]["source"], "quote");

    let res = client
        .post(srv.url(&format!("/quotes/{id}/status")))
        .json(&json!({ "status": "canceled" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}
