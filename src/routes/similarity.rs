use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{
    error::{AppError, AppResult},
    middleware::RequestId,
    models::{ContentRecord, RecalculationProgress},
    routes::AppState,
    services::{
        batch::CancellationFlag,
        similarity::{score_breakdown, select_best, MatchQuery, ScoreBreakdown},
        similarity_store,
    },
};

#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    pub a: ContentRecord,
    pub b: ContentRecord,
}

#[derive(Debug, Serialize)]
pub struct ScoreResponse {
    pub score: f64,
    pub breakdown: ScoreBreakdown,
}

#[derive(Debug, Deserialize)]
pub struct MatchRequest {
    pub query: MatchQuery,
    pub candidates: Vec<ContentRecord>,
}

#[derive(Debug, Serialize)]
pub struct MatchResponse {
    pub best: Option<ContentRecord>,
    pub score: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub cancelled: bool,
}

/// Attribute similarity of two ad-hoc records
pub async fn score(Json(request): Json<ScoreRequest>) -> Json<ScoreResponse> {
    let breakdown = score_breakdown(&request.a, &request.b);
    Json(ScoreResponse {
        score: breakdown.normalized(),
        breakdown,
    })
}

/// Best catalog candidate for a title/year/synopsis query
pub async fn best_match(Json(request): Json<MatchRequest>) -> Json<MatchResponse> {
    let best = select_best(&request.query, &request.candidates);
    Json(MatchResponse {
        score: best.map(|b| b.score),
        best: best.map(|b| b.record.clone()),
    })
}

/// Full pairwise recalculation. Only one may run at a time.
pub async fn recalculate(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
) -> AppResult<Json<RecalculationProgress>> {
    let flag = {
        let mut running = state.recalculation.lock().await;
        if running.is_some() {
            return Err(AppError::Conflict(
                "A recalculation is already running".to_string(),
            ));
        }
        let flag = CancellationFlag::new();
        *running = Some(flag.clone());
        flag
    };

    tracing::info!(request_id = %request_id, "Recalculation started");

    // Detached so a dropped connection cannot leave the slot taken
    let job_state = state.clone();
    let job = tokio::spawn(async move {
        let result =
            similarity_store::recalculate_all(job_state.store.as_ref(), &job_state.settings, &flag)
                .await;
        *job_state.recalculation.lock().await = None;
        result
    });

    let progress = job
        .await
        .map_err(|e| AppError::Internal(format!("Recalculation task failed: {}", e)))??;
    tracing::info!(
        request_id = %request_id,
        edges_written = progress.edges_written,
        cancelled = progress.cancelled,
        "Recalculation completed"
    );
    Ok(Json(progress))
}

/// Asks the running recalculation to stop after its current chunk
pub async fn cancel_recalculation(State(state): State<Arc<AppState>>) -> Json<CancelResponse> {
    let running = state.recalculation.lock().await;
    let cancelled = match running.as_ref() {
        Some(flag) => {
            flag.cancel();
            true
        }
        None => false,
    };
    Json(CancelResponse { cancelled })
}
