use axum::{extract::State, Json};
use std::sync::Arc;

use crate::{
    error::AppResult,
    routes::AppState,
    services::feedback::{self, FeedbackOutcome, FeedbackRequest},
};

pub async fn submit(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FeedbackRequest>,
) -> AppResult<Json<FeedbackOutcome>> {
    let outcome = feedback::submit_feedback(state.store.as_ref(), request).await?;
    Ok(Json(outcome))
}
