use axum::{
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    db::ContentStore,
    middleware::{make_span_with_request_id, request_id_middleware},
    services::{
        batch::CancellationFlag,
        providers::{CatalogProvider, GenerativeAi, VectorIndex},
        recommendations::Recommender,
        similarity_store::SimilaritySettings,
    },
};

pub mod content;
pub mod feedback;
pub mod recommendations;
pub mod similarity;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ContentStore>,
    pub catalog: Arc<dyn CatalogProvider>,
    pub ai: Arc<dyn GenerativeAi>,
    pub vectors: Arc<dyn VectorIndex>,
    pub settings: SimilaritySettings,
    /// Flag of the full recalculation in progress, if any
    pub recalculation: Arc<Mutex<Option<CancellationFlag>>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn ContentStore>,
        catalog: Arc<dyn CatalogProvider>,
        ai: Arc<dyn GenerativeAi>,
        vectors: Arc<dyn VectorIndex>,
        settings: SimilaritySettings,
    ) -> Self {
        Self {
            store,
            catalog,
            ai,
            vectors,
            settings,
            recalculation: Arc::new(Mutex::new(None)),
        }
    }

    pub fn recommender(&self) -> Recommender {
        Recommender {
            store: self.store.clone(),
            catalog: self.catalog.clone(),
            ai: self.ai.clone(),
            vectors: self.vectors.clone(),
            settings: self.settings.clone(),
        }
    }
}

/// Creates the application router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
}

/// API routes under /api/v1
fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/content", post(content::ingest))
        .route("/content/import", post(content::import))
        .route("/content/:id/similar", get(content::similar))
        .route("/content/:id/similarities", post(content::refresh_similarities))
        .route("/similarity/score", post(similarity::score))
        .route("/similarity/recalculate", post(similarity::recalculate))
        .route("/similarity/recalculate/cancel", post(similarity::cancel_recalculation))
        .route("/match", post(similarity::best_match))
        .route("/recommendations", post(recommendations::recommend))
        .route("/feedback", post(feedback::submit))
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}
