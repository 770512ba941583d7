use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{
    db::ContentStore,
    error::{AppError, AppResult},
    models::FeedbackEvent,
};

#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    pub content_id: String,
    #[serde(default)]
    pub source_content_id: Option<String>,
    pub is_positive: bool,
}

/// What changed after a piece of feedback was applied
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FeedbackOutcome {
    pub content_id: String,
    pub source_content_id: Option<String>,
    /// Stored edge score after adjustment; `None` when there was no source item
    pub adjusted_score: Option<f64>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn validate(request: FeedbackRequest) -> AppResult<FeedbackEvent> {
    let content_id = request.content_id.trim().to_string();
    if content_id.is_empty() {
        return Err(AppError::InvalidInput("content_id must not be empty".to_string()));
    }

    let source_content_id = non_blank(request.source_content_id);
    if source_content_id.as_deref() == Some(content_id.as_str()) {
        return Err(AppError::InvalidInput(
            "source_content_id must differ from content_id".to_string(),
        ));
    }

    Ok(FeedbackEvent {
        user_id: non_blank(request.user_id),
        content_id,
        source_content_id,
        is_positive: request.is_positive,
        created_at: Utc::now(),
    })
}

async fn ensure_exists(store: &dyn ContentStore, id: &str) -> AppResult<()> {
    match store.get_by_id(id).await? {
        Some(_) => Ok(()),
        None => Err(AppError::NotFound(format!("Content {} not found", id))),
    }
}

/// Records a feedback event and nudges the `source → content` edge.
///
/// Both items must already be stored. The edge update is a single atomic
/// store operation that starts from the neutral prior when the pair has no
/// edge yet.
pub async fn submit_feedback(
    store: &dyn ContentStore,
    request: FeedbackRequest,
) -> AppResult<FeedbackOutcome> {
    let event = validate(request)?;

    ensure_exists(store, &event.content_id).await?;
    if let Some(source_id) = event.source_content_id.as_deref() {
        ensure_exists(store, source_id).await?;
    }

    store.record_feedback(&event).await?;

    let Some(source_id) = event.source_content_id.clone() else {
        tracing::info!(content_id = %event.content_id, is_positive = event.is_positive, "Feedback recorded without source");
        return Ok(FeedbackOutcome {
            content_id: event.content_id,
            source_content_id: None,
            adjusted_score: None,
        });
    };

    let adjusted = store
        .adjust_edge(&source_id, &event.content_id, event.is_positive)
        .await?;

    tracing::info!(
        source_id = %source_id,
        content_id = %event.content_id,
        is_positive = event.is_positive,
        adjusted_score = adjusted,
        "Feedback applied"
    );

    Ok(FeedbackOutcome {
        content_id: event.content_id,
        source_content_id: Some(source_id),
        adjusted_score: Some(adjusted),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{store::MockContentStore, InMemoryContentStore};
    use crate::models::{ContentRecord, SimilarityEdge};
    use mockall::predicate::eq;
    use std::sync::Arc;

    fn request(source: Option<&str>, is_positive: bool) -> FeedbackRequest {
        FeedbackRequest {
            user_id: Some("user-1".to_string()),
            content_id: "tt1216496".to_string(),
            source_content_id: source.map(str::to_string),
            is_positive,
        }
    }

    fn known_ids(store: &mut MockContentStore) {
        store.expect_get_by_id().returning(|id| {
            Ok(Some(ContentRecord {
                id: id.to_string(),
                ..ContentRecord::default()
            }))
        });
    }

    fn stored_pair() -> InMemoryContentStore {
        InMemoryContentStore::with_records(["tt6751668", "tt1216496"].map(|id| ContentRecord {
            id: id.to_string(),
            ..ContentRecord::default()
        }))
    }

    #[tokio::test]
    async fn test_positive_feedback_adjusts_edge() {
        let mut store = MockContentStore::new();
        known_ids(&mut store);
        store.expect_record_feedback().times(1).returning(|_| Ok(()));
        store
            .expect_adjust_edge()
            .with(eq("tt6751668"), eq("tt1216496"), eq(true))
            .times(1)
            .returning(|_, _, _| Ok(0.7));

        let outcome = submit_feedback(&store, request(Some("tt6751668"), true))
            .await
            .unwrap();

        assert_eq!(outcome.adjusted_score, Some(0.7));
        assert_eq!(outcome.source_content_id.as_deref(), Some("tt6751668"));
    }

    #[tokio::test]
    async fn test_negative_feedback_without_edge_uses_prior() {
        let store = stored_pair();

        let outcome = submit_feedback(&store, request(Some("tt6751668"), false))
            .await
            .unwrap();

        assert!((outcome.adjusted_score.unwrap() - 0.4).abs() < 1e-9);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_feedback_on_same_pair_accumulates() {
        let store = Arc::new(stored_pair());
        store
            .upsert_edge(&SimilarityEdge::new("tt6751668", "tt1216496", 0.5))
            .await
            .unwrap();

        let (first, second) = tokio::join!(
            submit_feedback(store.as_ref(), request(Some("tt6751668"), true)),
            submit_feedback(store.as_ref(), request(Some("tt6751668"), true)),
        );
        first.unwrap();
        second.unwrap();

        let edge = store.get_edge("tt6751668", "tt1216496").await.unwrap().unwrap();
        assert!((edge.score - 0.7).abs() < 1e-9);
        assert_eq!(store.feedback_events().await.len(), 2);
    }

    #[tokio::test]
    async fn test_feedback_without_source_only_records_event() {
        let mut store = MockContentStore::new();
        known_ids(&mut store);
        store
            .expect_record_feedback()
            .withf(|event| event.source_content_id.is_none() && event.is_positive)
            .times(1)
            .returning(|_| Ok(()));
        store.expect_adjust_edge().never();

        let outcome = submit_feedback(&store, request(Some("  "), true)).await.unwrap();
        assert_eq!(outcome.adjusted_score, None);
    }

    #[tokio::test]
    async fn test_unknown_ids_are_rejected_before_any_write() {
        let store = InMemoryContentStore::new();
        let mut req = request(Some("nobody"), true);
        req.content_id = "ghost".to_string();

        let result = submit_feedback(&store, req).await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert!(store.feedback_events().await.is_empty());
        assert_eq!(store.edge_count().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_source_is_rejected() {
        let store = InMemoryContentStore::with_records([ContentRecord {
            id: "tt1216496".to_string(),
            ..ContentRecord::default()
        }]);

        let result = submit_feedback(&store, request(Some("nobody"), true)).await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert!(store.feedback_events().await.is_empty());
    }

    #[tokio::test]
    async fn test_rejects_empty_content_id() {
        let store = MockContentStore::new();
        let mut req = request(None, true);
        req.content_id = " ".to_string();

        let result = submit_feedback(&store, req).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_rejects_self_feedback() {
        let store = MockContentStore::new();
        let result = submit_feedback(&store, request(Some("tt1216496"), true)).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_blank_user_is_anonymous() {
        let mut req = request(None, true);
        req.user_id = Some(String::new());
        let event = validate(req).unwrap();
        assert_eq!(event.user_id, None);
    }
}
