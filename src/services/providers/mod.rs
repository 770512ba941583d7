/// External collaborators behind narrow async traits
///
/// The scoring core never talks to these directly. Orchestration services hold
/// them as `Arc<dyn Trait>` so they can be swapped for stubs in tests.
use crate::{
    error::AppResult,
    models::{AiMatch, AiRecommendation, ContentRecord, VectorMatch},
};

pub mod ai;
pub mod omdb;
pub mod vector_index;

pub use ai::OpenAiCompatibleClient;
pub use omdb::OmdbProvider;
pub use vector_index::HttpVectorIndex;

/// Movie/series metadata source
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Full record by catalog id
    async fn fetch(&self, id: &str) -> AppResult<ContentRecord>;

    /// Title search; results usually lack plot, cast and genres
    async fn search(&self, title: &str, year: Option<i32>) -> AppResult<Vec<ContentRecord>>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

/// Opaque nearest-neighbour service; embeddings are computed on its side
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert(&self, id: &str, text: &str, metadata: serde_json::Value) -> AppResult<()>;

    /// Closest entries to `text`, best first
    async fn query(&self, text: &str, top_k: usize) -> AppResult<Vec<VectorMatch>>;
}

/// Generative model used for recommendations and result matching.
///
/// Both calls are fallible and non-deterministic; callers keep a fallback.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait GenerativeAi: Send + Sync {
    async fn recommend(
        &self,
        source: &ContentRecord,
        count: usize,
    ) -> AppResult<Vec<AiRecommendation>>;

    /// Picks which search result corresponds to the recommendation
    async fn match_best_result(
        &self,
        original: &AiRecommendation,
        candidates: &[ContentRecord],
    ) -> AppResult<AiMatch>;
}
