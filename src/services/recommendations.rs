use serde::Serialize;
use serde_json::json;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::{
    db::ContentStore,
    error::{AppError, AppResult},
    models::{parse_leading_year, AiRecommendation, ContentRecord, SimilarityEdge},
    services::{
        batch::{run_batched, with_timeout, CancellationFlag},
        providers::{CatalogProvider, GenerativeAi, VectorIndex},
        similarity::{attribute_score, select_best, MatchQuery},
        similarity_store::SimilaritySettings,
    },
};

pub const MAX_RECOMMENDATIONS: usize = 20;

/// Where a similar item's score came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilaritySource {
    Stored,
    Vector,
    Both,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SimilarItem {
    pub content: ContentRecord,
    pub score: f64,
    pub source: SimilaritySource,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecommendedItem {
    pub content: ContentRecord,
    /// Attribute similarity to the source item
    pub score: f64,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RecommendationResponse {
    pub source_id: String,
    pub items: Vec<RecommendedItem>,
    /// Recommended titles that no catalog entry could be resolved for
    pub unresolved: Vec<String>,
    /// True when the model was unavailable and stored similar content was used
    pub fallback: bool,
}

/// Index payload stored alongside each embedded record
pub fn vector_metadata(record: &ContentRecord) -> serde_json::Value {
    json!({
        "title": record.title,
        "year": record.year,
        "kind": record.kind.to_string(),
    })
}

/// Recommendation pipeline over the store, the catalog, the model and the index
#[derive(Clone)]
pub struct Recommender {
    pub store: Arc<dyn ContentStore>,
    pub catalog: Arc<dyn CatalogProvider>,
    pub ai: Arc<dyn GenerativeAi>,
    pub vectors: Arc<dyn VectorIndex>,
    pub settings: SimilaritySettings,
}

impl Recommender {
    async fn load_source(&self, content_id: &str) -> AppResult<ContentRecord> {
        self.store
            .get_by_id(content_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Content {} not found", content_id)))
    }

    /// Stored similarity edges merged with nearest neighbours from the vector
    /// index. Items scored by both get the mean of the two scores. Vector
    /// failures degrade to edges only.
    pub async fn similar_content(&self, content_id: &str, limit: usize) -> AppResult<Vec<SimilarItem>> {
        let source = self.load_source(content_id).await?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let edges = self.store.edges_from(content_id, limit).await?;

        let neighbours = match with_timeout(
            self.settings.batch.timeout,
            "vector query",
            self.vectors.query(&source.embedding_text(), limit + 1),
        )
        .await
        {
            Ok(matches) => matches,
            Err(e) => {
                tracing::warn!(content_id = %content_id, error = %e, "Vector query failed, using stored edges only");
                Vec::new()
            }
        };

        let mut scores: HashMap<String, (Option<f64>, Option<f64>)> = HashMap::new();
        for edge in edges {
            scores.entry(edge.target_id).or_default().0 = Some(edge.score);
        }
        for hit in neighbours {
            if hit.id == content_id || !hit.score.is_finite() {
                continue;
            }
            scores.entry(hit.id).or_default().1 = Some(hit.score.clamp(0.0, 1.0));
        }

        let mut merged: Vec<(String, f64, SimilaritySource)> = scores
            .into_iter()
            .filter_map(|(id, pair)| match pair {
                (Some(a), Some(b)) => Some((id, (a + b) / 2.0, SimilaritySource::Both)),
                (Some(a), None) => Some((id, a, SimilaritySource::Stored)),
                (None, Some(b)) => Some((id, b, SimilaritySource::Vector)),
                (None, None) => None,
            })
            .collect();

        merged.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });

        let ids: Vec<String> = merged.iter().map(|(id, _, _)| id.clone()).collect();
        let mut records: HashMap<String, ContentRecord> = self
            .store
            .get_by_ids(&ids)
            .await?
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect();

        // Index hits for items that were never stored are dropped
        let items: Vec<SimilarItem> = merged
            .into_iter()
            .filter_map(|(id, score, source)| {
                records.remove(&id).map(|content| SimilarItem {
                    content,
                    score,
                    source,
                })
            })
            .take(limit)
            .collect();

        tracing::debug!(content_id = %content_id, results = items.len(), "Similar content merged");
        Ok(items)
    }

    /// Asks the model for titles like `content_id` and resolves each one to a
    /// catalog entry. Resolved entries are stored and indexed best-effort.
    pub async fn recommend_for(&self, content_id: &str, count: usize) -> AppResult<RecommendationResponse> {
        if count == 0 || count > MAX_RECOMMENDATIONS {
            return Err(AppError::InvalidInput(format!(
                "count must be between 1 and {}",
                MAX_RECOMMENDATIONS
            )));
        }

        let source = self.load_source(content_id).await?;

        let recommendations = match with_timeout(
            self.settings.batch.timeout,
            "model recommendation",
            self.ai.recommend(&source, count),
        )
        .await
        {
            Ok(recs) => recs,
            Err(e) => {
                tracing::warn!(content_id = %content_id, error = %e, "Model recommendation failed, falling back to similar content");
                return self.similar_fallback(&source, count).await;
            }
        };

        let catalog = self.catalog.clone();
        let ai = self.ai.clone();
        let min_confidence = self.settings.min_ai_confidence;
        let outcome = run_batched(
            recommendations.clone(),
            &self.settings.batch,
            &CancellationFlag::new(),
            move |rec| {
                let catalog = catalog.clone();
                let ai = ai.clone();
                async move { resolve_recommendation(catalog.as_ref(), ai.as_ref(), &rec, min_confidence).await }
            },
        )
        .await;

        let mut seen: HashSet<String> = HashSet::from([source.id.clone()]);
        let mut items = Vec::new();
        let mut unresolved = Vec::new();

        for (rec, result) in recommendations.into_iter().zip(outcome.results) {
            match result {
                Ok(Some(record)) => {
                    if !seen.insert(record.id.clone()) {
                        continue;
                    }
                    let score = attribute_score(&source, &record);
                    self.remember(&source, &record, score).await;
                    items.push(RecommendedItem {
                        content: record,
                        score,
                        reason: rec.reason,
                    });
                }
                Ok(None) => unresolved.push(rec.title),
                Err(e) => {
                    tracing::warn!(title = %rec.title, error = %e, "Failed to resolve recommendation");
                    unresolved.push(rec.title);
                }
            }
        }

        tracing::info!(
            content_id = %content_id,
            resolved = items.len(),
            unresolved = unresolved.len(),
            "Recommendations resolved"
        );

        Ok(RecommendationResponse {
            source_id: source.id,
            items,
            unresolved,
            fallback: false,
        })
    }

    async fn similar_fallback(&self, source: &ContentRecord, count: usize) -> AppResult<RecommendationResponse> {
        let items = self
            .similar_content(&source.id, count)
            .await?
            .into_iter()
            .map(|item| RecommendedItem {
                content: item.content,
                score: item.score,
                reason: None,
            })
            .collect();

        Ok(RecommendationResponse {
            source_id: source.id.clone(),
            items,
            unresolved: Vec::new(),
            fallback: true,
        })
    }

    /// Stores, indexes and links a resolved record. Failures are logged only.
    async fn remember(&self, source: &ContentRecord, record: &ContentRecord, score: f64) {
        if let Err(e) = self.store.upsert_content(record).await {
            tracing::warn!(id = %record.id, error = %e, "Failed to store recommended content");
            return;
        }

        if let Err(e) = self
            .vectors
            .upsert(&record.id, &record.embedding_text(), vector_metadata(record))
            .await
        {
            tracing::warn!(id = %record.id, error = %e, "Failed to index recommended content");
        }

        if score > self.settings.threshold {
            let edge = SimilarityEdge::new(&source.id, &record.id, score);
            if let Err(e) = self.store.upsert_edge(&edge).await {
                tracing::warn!(source_id = %source.id, target_id = %record.id, error = %e, "Failed to store recommendation edge");
            }
        }
    }
}

/// Finds the catalog entry a model recommendation refers to.
///
/// Order: exact IMDb id among the search results, then the model's own pick
/// when confident, then the composite best match.
pub async fn resolve_recommendation(
    catalog: &dyn CatalogProvider,
    ai: &dyn GenerativeAi,
    rec: &AiRecommendation,
    min_confidence: f64,
) -> AppResult<Option<ContentRecord>> {
    let year = rec.year.as_deref().and_then(parse_leading_year);

    let mut candidates = catalog.search(&rec.title, year).await?;
    if candidates.is_empty() && year.is_some() {
        candidates = catalog.search(&rec.title, None).await?;
    }
    if candidates.is_empty() {
        tracing::debug!(title = %rec.title, provider = catalog.name(), "No catalog results");
        return Ok(None);
    }

    let Some(chosen_id) = pick_candidate(ai, rec, &candidates, min_confidence).await else {
        return Ok(None);
    };
    let Some(chosen) = candidates.into_iter().find(|c| c.id == chosen_id) else {
        return Ok(None);
    };

    // Search results are thin; prefer the full record when it can be fetched
    match catalog.fetch(&chosen.id).await {
        Ok(full) => Ok(Some(full)),
        Err(e) => {
            tracing::warn!(id = %chosen.id, error = %e, "Detail fetch failed, keeping search result");
            Ok(Some(chosen))
        }
    }
}

async fn pick_candidate(
    ai: &dyn GenerativeAi,
    rec: &AiRecommendation,
    candidates: &[ContentRecord],
    min_confidence: f64,
) -> Option<String> {
    if let Some(imdb_id) = rec.imdb_id.as_deref() {
        if let Some(exact) = candidates.iter().find(|c| c.id == imdb_id) {
            return Some(exact.id.clone());
        }
    }

    match ai.match_best_result(rec, candidates).await {
        Ok(m) if m.confidence >= min_confidence => {
            if let Some(id) = m
                .matched_id
                .filter(|id| candidates.iter().any(|c| &c.id == id))
            {
                return Some(id);
            }
        }
        Ok(m) => {
            tracing::debug!(title = %rec.title, confidence = m.confidence, "Model match below confidence threshold");
        }
        Err(e) => {
            tracing::warn!(title = %rec.title, error = %e, "Model match failed");
        }
    }

    select_best(&MatchQuery::from(rec), candidates)
        .map(|best| best.record)
        .map(|record| record.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryContentStore;
    use crate::models::{AiMatch, VectorMatch};
    use crate::services::batch::BatchOptions;
    use crate::services::providers::{MockCatalogProvider, MockGenerativeAi, MockVectorIndex};
    use std::time::Duration;

    fn record(id: &str, title: &str, year: &str, genres: &[&str]) -> ContentRecord {
        ContentRecord {
            id: id.to_string(),
            title: title.to_string(),
            year: Some(year.to_string()),
            genres: genres.iter().map(|g| g.to_string()).collect(),
            ..ContentRecord::default()
        }
    }

    fn rec(title: &str, year: Option<&str>, imdb_id: Option<&str>) -> AiRecommendation {
        AiRecommendation {
            title: title.to_string(),
            year: year.map(str::to_string),
            imdb_id: imdb_id.map(str::to_string),
            reason: Some("similar tone".to_string()),
        }
    }

    fn settings() -> SimilaritySettings {
        SimilaritySettings {
            batch: BatchOptions {
                batch_size: 2,
                delay: Duration::ZERO,
                timeout: Duration::from_secs(1),
            },
            ..SimilaritySettings::default()
        }
    }

    fn mothers() -> Vec<ContentRecord> {
        vec![
            record("tt5109784", "Mother!", "2017", &["Horror"]),
            record("tt1216496", "Mother", "2009", &["Drama"]),
        ]
    }

    #[tokio::test]
    async fn test_resolve_prefers_exact_imdb_id() {
        let mut catalog = MockCatalogProvider::new();
        catalog.expect_search().returning(|_, _| Ok(mothers()));
        catalog
            .expect_fetch()
            .returning(|id| Ok(record(id, "Mother", "2009", &["Drama", "Crime"])));
        catalog.expect_name().return_const("test");
        let mut ai = MockGenerativeAi::new();
        ai.expect_match_best_result().never();

        let resolved = resolve_recommendation(&catalog, &ai, &rec("Mother", None, Some("tt1216496")), 0.5)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(resolved.id, "tt1216496");
        assert_eq!(resolved.genres.len(), 2);
    }

    #[tokio::test]
    async fn test_resolve_uses_confident_model_match() {
        let mut catalog = MockCatalogProvider::new();
        catalog.expect_search().returning(|_, _| Ok(mothers()));
        catalog.expect_fetch().returning(|_| Err(AppError::ExternalApi("down".to_string())));
        catalog.expect_name().return_const("test");
        let mut ai = MockGenerativeAi::new();
        ai.expect_match_best_result().returning(|_, _| {
            Ok(AiMatch {
                matched_id: Some("tt5109784".to_string()),
                confidence: 0.9,
                reason: None,
            })
        });

        let resolved = resolve_recommendation(&catalog, &ai, &rec("Mother", Some("2009"), None), 0.5)
            .await
            .unwrap()
            .unwrap();

        // Fetch failed, so the search result is kept
        assert_eq!(resolved.id, "tt5109784");
    }

    #[tokio::test]
    async fn test_resolve_ignores_unconfident_or_unknown_model_match() {
        for matched in [("tt5109784", 0.2), ("tt0000001", 0.99)] {
            let mut catalog = MockCatalogProvider::new();
            catalog.expect_search().returning(|_, _| Ok(mothers()));
            catalog.expect_fetch().returning(|id| Ok(record(id, "x", "2009", &[])));
            catalog.expect_name().return_const("test");
            let mut ai = MockGenerativeAi::new();
            ai.expect_match_best_result().returning(move |_, _| {
                Ok(AiMatch {
                    matched_id: Some(matched.0.to_string()),
                    confidence: matched.1,
                    reason: None,
                })
            });

            let resolved = resolve_recommendation(&catalog, &ai, &rec("Mother", Some("2009"), None), 0.5)
                .await
                .unwrap()
                .unwrap();

            // Composite match: exact title and year
            assert_eq!(resolved.id, "tt1216496");
        }
    }

    #[tokio::test]
    async fn test_resolve_with_no_title_overlap_keeps_search_order() {
        let mut catalog = MockCatalogProvider::new();
        catalog.expect_search().returning(|_, _| {
            Ok(vec![
                record("tt0000010", "Jaws", "1975", &[]),
                record("tt0000011", "Heat", "1995", &[]),
            ])
        });
        catalog.expect_fetch().returning(|id| Err(AppError::NotFound(id.to_string())));
        catalog.expect_name().return_const("test");
        let mut ai = MockGenerativeAi::new();
        ai.expect_match_best_result()
            .returning(|_, _| Err(AppError::ExternalApi("model down".to_string())));

        let resolved = resolve_recommendation(&catalog, &ai, &rec("Up", None, None), 0.5)
            .await
            .unwrap()
            .unwrap();

        // Equal composite scores rank in search order
        assert_eq!(resolved.id, "tt0000010");
    }

    #[tokio::test]
    async fn test_resolve_retries_search_without_year() {
        let mut catalog = MockCatalogProvider::new();
        catalog
            .expect_search()
            .withf(|_, year| year.is_some())
            .times(1)
            .returning(|_, _| Ok(Vec::new()));
        catalog
            .expect_search()
            .withf(|_, year| year.is_none())
            .times(1)
            .returning(|_, _| Ok(Vec::new()));
        catalog.expect_name().return_const("test");
        let ai = MockGenerativeAi::new();

        let resolved = resolve_recommendation(&catalog, &ai, &rec("Nowhere", Some("1999"), None), 0.5)
            .await
            .unwrap();
        assert!(resolved.is_none());
    }

    fn recommender(
        store: InMemoryContentStore,
        catalog: MockCatalogProvider,
        ai: MockGenerativeAi,
        vectors: MockVectorIndex,
    ) -> Recommender {
        Recommender {
            store: Arc::new(store),
            catalog: Arc::new(catalog),
            ai: Arc::new(ai),
            vectors: Arc::new(vectors),
            settings: settings(),
        }
    }

    #[tokio::test]
    async fn test_similar_content_merges_edges_and_vectors() {
        let store = InMemoryContentStore::with_records(vec![
            record("src", "Source", "2019", &["Drama"]),
            record("a", "A", "2019", &["Drama"]),
            record("b", "B", "2019", &["Drama"]),
            record("c", "C", "2019", &["Drama"]),
        ]);
        store
            .upsert_edges(&[SimilarityEdge::new("src", "a", 0.8), SimilarityEdge::new("src", "b", 0.4)])
            .await
            .unwrap();

        let mut vectors = MockVectorIndex::new();
        vectors.expect_query().returning(|_, _| {
            Ok(vec![
                VectorMatch { id: "src".to_string(), score: 1.0, metadata: None },
                VectorMatch { id: "b".to_string(), score: 0.8, metadata: None },
                VectorMatch { id: "c".to_string(), score: 0.6, metadata: None },
                VectorMatch { id: "unknown".to_string(), score: 0.9, metadata: None },
            ])
        });

        let service = recommender(store, MockCatalogProvider::new(), MockGenerativeAi::new(), vectors);
        let items = service.similar_content("src", 10).await.unwrap();

        let ids: Vec<&str> = items.iter().map(|i| i.content.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(items[0].source, SimilaritySource::Stored);
        assert_eq!(items[1].source, SimilaritySource::Both);
        assert!((items[1].score - 0.6).abs() < 1e-9);
        assert_eq!(items[2].source, SimilaritySource::Vector);
    }

    #[tokio::test]
    async fn test_similar_content_ties_broken_by_id() {
        let store = InMemoryContentStore::with_records(vec![
            record("src", "Source", "2019", &[]),
            record("y", "Y", "2019", &[]),
            record("x", "X", "2019", &[]),
        ]);
        store
            .upsert_edges(&[SimilarityEdge::new("src", "y", 0.5), SimilarityEdge::new("src", "x", 0.5)])
            .await
            .unwrap();
        let mut vectors = MockVectorIndex::new();
        vectors
            .expect_query()
            .returning(|_, _| Err(AppError::ExternalApi("index down".to_string())));

        let service = recommender(store, MockCatalogProvider::new(), MockGenerativeAi::new(), vectors);
        let items = service.similar_content("src", 10).await.unwrap();

        assert_eq!(items[0].content.id, "x");
        assert_eq!(items[1].content.id, "y");
    }

    #[tokio::test]
    async fn test_similar_content_unknown_source() {
        let service = recommender(
            InMemoryContentStore::new(),
            MockCatalogProvider::new(),
            MockGenerativeAi::new(),
            MockVectorIndex::new(),
        );
        let result = service.similar_content("missing", 5).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_recommend_for_resolves_and_stores() {
        let store = InMemoryContentStore::with_records(vec![record("tt6751668", "Parasite", "2019", &["Drama"])]);

        let mut ai = MockGenerativeAi::new();
        ai.expect_recommend().returning(|_, _| {
            Ok(vec![
                rec("Mother", Some("2009"), Some("tt1216496")),
                rec("Parasite", Some("2019"), Some("tt6751668")),
                rec("Nothing Found", None, None),
            ])
        });
        ai.expect_match_best_result().returning(|_, _| {
            Ok(AiMatch { matched_id: None, confidence: 0.0, reason: None })
        });

        let mut catalog = MockCatalogProvider::new();
        catalog.expect_search().returning(|title, _| {
            Ok(match title {
                "Mother" => mothers(),
                "Parasite" => vec![record("tt6751668", "Parasite", "2019", &["Drama"])],
                _ => Vec::new(),
            })
        });
        catalog
            .expect_fetch()
            .returning(|id| Ok(record(id, "Mother", "2009", &["Drama"])));
        catalog.expect_name().return_const("test");

        let mut vectors = MockVectorIndex::new();
        vectors.expect_upsert().times(1).returning(|_, _, _| Ok(()));

        let service = recommender(store, catalog, ai, vectors);
        let response = service.recommend_for("tt6751668", 3).await.unwrap();

        assert!(!response.fallback);
        assert_eq!(response.items.len(), 1);
        assert_eq!(response.items[0].content.id, "tt1216496");
        assert_eq!(response.unresolved, vec!["Nothing Found".to_string()]);
        assert!(service.store.get_by_id("tt1216496").await.unwrap().is_some());
        // Shared genre only: 3 / 6
        assert!(service.store.get_edge("tt6751668", "tt1216496").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_recommend_for_falls_back_when_model_fails() {
        let store = InMemoryContentStore::with_records(vec![
            record("src", "Source", "2019", &["Drama"]),
            record("a", "A", "2019", &["Drama"]),
        ]);
        store.upsert_edge(&SimilarityEdge::new("src", "a", 0.7)).await.unwrap();

        let mut ai = MockGenerativeAi::new();
        ai.expect_recommend()
            .returning(|_, _| Err(AppError::ExternalApi("rate limited".to_string())));
        let mut vectors = MockVectorIndex::new();
        vectors.expect_query().returning(|_, _| Ok(Vec::new()));

        let service = recommender(store, MockCatalogProvider::new(), ai, vectors);
        let response = service.recommend_for("src", 5).await.unwrap();

        assert!(response.fallback);
        assert_eq!(response.items.len(), 1);
        assert_eq!(response.items[0].content.id, "a");
    }

    #[tokio::test]
    async fn test_recommend_for_rejects_bad_count() {
        let service = recommender(
            InMemoryContentStore::new(),
            MockCatalogProvider::new(),
            MockGenerativeAi::new(),
            MockVectorIndex::new(),
        );
        assert!(matches!(
            service.recommend_for("src", 0).await,
            Err(AppError::InvalidInput(_))
        ));
    }
}
