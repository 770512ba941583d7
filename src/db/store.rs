use crate::{
    error::AppResult,
    models::{ContentRecord, FeedbackEvent, SimilarityEdge},
};

/// Relational content store
///
/// Records are keyed by their external id; edges are unique on
/// `(source_id, target_id)` and upserts on that key are idempotent.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ContentStore: Send + Sync {
    async fn get_by_id(&self, id: &str) -> AppResult<Option<ContentRecord>>;

    /// Records for the given ids; unknown ids are skipped
    async fn get_by_ids(&self, ids: &[String]) -> AppResult<Vec<ContentRecord>>;

    async fn get_all(&self) -> AppResult<Vec<ContentRecord>>;

    async fn get_all_except(&self, id: &str) -> AppResult<Vec<ContentRecord>>;

    async fn upsert_content(&self, record: &ContentRecord) -> AppResult<()>;

    async fn get_edge(&self, source_id: &str, target_id: &str)
        -> AppResult<Option<SimilarityEdge>>;

    /// Inserts or updates all edges in one round-trip
    async fn upsert_edges(&self, edges: &[SimilarityEdge]) -> AppResult<()>;

    async fn upsert_edge(&self, edge: &SimilarityEdge) -> AppResult<()> {
        self.upsert_edges(std::slice::from_ref(edge)).await
    }

    /// Applies one feedback step to the `source → target` edge as a single
    /// atomic read-modify-write, creating it from the neutral prior when
    /// absent. Returns the stored score.
    async fn adjust_edge(&self, source_id: &str, target_id: &str, is_positive: bool)
        -> AppResult<f64>;

    /// Outgoing edges for a record, strongest first
    async fn edges_from(&self, source_id: &str, limit: usize) -> AppResult<Vec<SimilarityEdge>>;

    async fn record_feedback(&self, event: &FeedbackEvent) -> AppResult<()>;
}
