use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    middleware::RequestId,
    models::{ContentRecord, ImportProgress, RecalculationProgress},
    routes::AppState,
    services::{
        batch::CancellationFlag,
        ingest,
        recommendations::SimilarItem,
        similarity_store,
    },
};

const DEFAULT_SIMILAR_LIMIT: usize = 10;
const MAX_SIMILAR_LIMIT: usize = 50;
const MAX_IMPORT_IDS: usize = 500;

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    pub ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SimilarQuery {
    pub limit: Option<usize>,
}

/// Fetches one title from the catalog and adds it to the collection
pub async fn ingest(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<IngestRequest>,
) -> AppResult<(StatusCode, Json<ContentRecord>)> {
    tracing::info!(request_id = %request_id, id = %request.id, "Ingesting content");

    let record = ingest::ingest_one(
        state.store.as_ref(),
        state.catalog.as_ref(),
        state.vectors.as_ref(),
        &state.settings,
        &request.id,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(record)))
}

/// Imports many titles, reporting per-id failures
pub async fn import(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<ImportRequest>,
) -> AppResult<Json<ImportProgress>> {
    if request.ids.len() > MAX_IMPORT_IDS {
        return Err(AppError::InvalidInput(format!(
            "at most {} ids per import",
            MAX_IMPORT_IDS
        )));
    }

    tracing::info!(request_id = %request_id, count = request.ids.len(), "Starting import");

    let progress = ingest::import_batch(
        state.store.clone(),
        state.catalog.clone(),
        state.vectors.clone(),
        &state.settings,
        request.ids,
        &CancellationFlag::new(),
    )
    .await;

    Ok(Json(progress))
}

pub async fn similar(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<SimilarQuery>,
) -> AppResult<Json<Vec<SimilarItem>>> {
    let limit = params.limit.unwrap_or(DEFAULT_SIMILAR_LIMIT);
    if limit == 0 || limit > MAX_SIMILAR_LIMIT {
        return Err(AppError::InvalidInput(format!(
            "limit must be between 1 and {}",
            MAX_SIMILAR_LIMIT
        )));
    }

    let items = state.recommender().similar_content(&id, limit).await?;
    Ok(Json(items))
}

/// Recomputes the stored edges of one title against the whole collection
pub async fn refresh_similarities(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<RecalculationProgress>> {
    let progress =
        similarity_store::refresh_for_content(state.store.as_ref(), &id, &state.settings).await?;
    Ok(Json(progress))
}
