use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use sqlx::postgres::PgPoolOptions;

use scaleflow_infra::{
    config::{Settings, StoreBackend},
    external::HttpWeightPredictor,
    import::ImportPipeline,
    lifecycle::LifecycleEngine,
    store::{InMemoryStore, LifecycleStore, PostgresStore},
};
use scaleflow_prediction::WeightPredictor;

/// Everything the handlers need, sharing one store.
#[derive(Debug)]
pub struct AppServices<S, P> {
    pub engine: LifecycleEngine<S, P>,
    pub import: ImportPipeline<S>,
}

impl<S, P> AppServices<S, P>
where
    S: LifecycleStore,
    P: WeightPredictor,
{
    pub fn new(store: Arc<S>, predictor: Arc<P>, import_batch_size: usize) -> Self {
        Self {
            engine: LifecycleEngine::new(Arc::clone(&store), predictor),
            import: ImportPipeline::new(store, import_batch_size),
        }
    }
}

/// Wire stores and the prediction client according to `settings`.
pub async fn build_app(settings: &Settings) -> anyhow::Result<Router> {
    let predictor = Arc::new(
        HttpWeightPredictor::new(&settings.predictor_url, settings.predictor_timeout)
            .context("failed to build prediction client")?,
    );
    tracing::info!(
        predictor = predictor.predict_url(),
        timeout_ms = settings.predictor_timeout.as_millis() as u64,
        "prediction client configured"
    );

    match &settings.store {
        StoreBackend::InMemory => {
            tracing::warn!("using in-memory stores; data is lost on restart");
            let store = Arc::new(InMemoryStore::new());
            Ok(super::router(Arc::new(AppServices::new(
                store,
                predictor,
                settings.import_batch_size,
            ))))
        }
        StoreBackend::Postgres { database_url } => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(database_url)
                .await
                .context("failed to connect to Postgres")?;
            let store = Arc::new(PostgresStore::new(pool));
            store
                .ensure_schema()
                .await
                .context("failed to apply database schema")?;
            tracing::info!("using Postgres stores");
            Ok(super::router(Arc::new(AppServices::new(
                store,
                predictor,
                settings.import_batch_size,
            ))))
        }
    }
}
