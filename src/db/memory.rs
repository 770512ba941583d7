use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{
    db::ContentStore,
    error::AppResult,
    models::{ContentRecord, FeedbackEvent, SimilarityEdge},
    services::similarity::adjust_score,
};

/// Content store held entirely in memory
///
/// Used for local runs without Postgres and by the HTTP tests.
#[derive(Clone, Default)]
pub struct InMemoryContentStore {
    inner: Arc<RwLock<StoreInner>>,
}

#[derive(Default)]
struct StoreInner {
    records: HashMap<String, ContentRecord>,
    edges: HashMap<(String, String), SimilarityEdge>,
    feedback: Vec<FeedbackEvent>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with records
    pub fn with_records(records: impl IntoIterator<Item = ContentRecord>) -> Self {
        let inner = StoreInner {
            records: records.into_iter().map(|r| (r.id.clone(), r)).collect(),
            ..StoreInner::default()
        };
        Self {
            inner: Arc::new(RwLock::new(inner)),
        }
    }

    pub async fn edge_count(&self) -> usize {
        self.inner.read().await.edges.len()
    }

    pub async fn feedback_events(&self) -> Vec<FeedbackEvent> {
        self.inner.read().await.feedback.clone()
    }
}

fn sorted_by_id(mut records: Vec<ContentRecord>) -> Vec<ContentRecord> {
    records.sort_by(|a, b| a.id.cmp(&b.id));
    records
}

#[async_trait::async_trait]
impl ContentStore for InMemoryContentStore {
    async fn get_by_id(&self, id: &str) -> AppResult<Option<ContentRecord>> {
        Ok(self.inner.read().await.records.get(id).cloned())
    }

    async fn get_by_ids(&self, ids: &[String]) -> AppResult<Vec<ContentRecord>> {
        let inner = self.inner.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| inner.records.get(id).cloned())
            .collect())
    }

    async fn get_all(&self) -> AppResult<Vec<ContentRecord>> {
        let inner = self.inner.read().await;
        Ok(sorted_by_id(inner.records.values().cloned().collect()))
    }

    async fn get_all_except(&self, id: &str) -> AppResult<Vec<ContentRecord>> {
        let inner = self.inner.read().await;
        Ok(sorted_by_id(
            inner
                .records
                .values()
                .filter(|r| r.id != id)
                .cloned()
                .collect(),
        ))
    }

    async fn upsert_content(&self, record: &ContentRecord) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        inner.records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn get_edge(
        &self,
        source_id: &str,
        target_id: &str,
    ) -> AppResult<Option<SimilarityEdge>> {
        let inner = self.inner.read().await;
        Ok(inner
            .edges
            .get(&(source_id.to_string(), target_id.to_string()))
            .cloned())
    }

    async fn upsert_edges(&self, edges: &[SimilarityEdge]) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        for edge in edges {
            inner.edges.insert(
                (edge.source_id.clone(), edge.target_id.clone()),
                edge.clone(),
            );
        }
        Ok(())
    }

    async fn adjust_edge(
        &self,
        source_id: &str,
        target_id: &str,
        is_positive: bool,
    ) -> AppResult<f64> {
        // Read and write under one lock so concurrent adjustments serialize
        let mut inner = self.inner.write().await;
        let key = (source_id.to_string(), target_id.to_string());
        let score = adjust_score(inner.edges.get(&key).map(|e| e.score), is_positive);
        inner
            .edges
            .insert(key, SimilarityEdge::new(source_id, target_id, score));
        Ok(score)
    }

    async fn edges_from(&self, source_id: &str, limit: usize) -> AppResult<Vec<SimilarityEdge>> {
        let inner = self.inner.read().await;
        let mut edges: Vec<SimilarityEdge> = inner
            .edges
            .values()
            .filter(|e| e.source_id == source_id)
            .cloned()
            .collect();

        edges.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.target_id.cmp(&b.target_id))
        });
        edges.truncate(limit);
        Ok(edges)
    }

    async fn record_feedback(&self, event: &FeedbackEvent) -> AppResult<()> {
        self.inner.write().await.feedback.push(event.clone());
        Ok(())
    }
}
