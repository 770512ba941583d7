use axum::{extract::State, Extension, Json};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    error::AppResult,
    middleware::RequestId,
    routes::AppState,
    services::recommendations::RecommendationResponse,
};

fn default_count() -> usize {
    5
}

#[derive(Debug, Deserialize)]
pub struct RecommendationRequest {
    pub content_id: String,
    #[serde(default = "default_count")]
    pub count: usize,
}

/// Handler for recommendations endpoint
pub async fn recommend(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<RecommendationRequest>,
) -> AppResult<Json<RecommendationResponse>> {
    tracing::info!(
        request_id = %request_id,
        content_id = %request.content_id,
        count = request.count,
        "Processing recommendation request"
    );

    let response = state
        .recommender()
        .recommend_for(&request.content_id, request.count)
        .await?;

    tracing::info!(
        request_id = %request_id,
        items = response.items.len(),
        fallback = response.fallback,
        "Recommendations completed"
    );

    Ok(Json(response))
}
