use crate::{
    db::ContentStore,
    error::{AppError, AppResult},
    models::{ContentRecord, RecalculationProgress, SimilarityEdge},
    services::{
        batch::{BatchOptions, CancellationFlag},
        similarity::attribute_score,
    },
};
use std::time::Instant;

/// Minimum attribute score for an edge to be stored
pub const DEFAULT_THRESHOLD: f64 = 0.3;
pub const DEFAULT_PERSIST_CHUNK_SIZE: usize = 50;

/// Tunables for similarity persistence and the external-call pipelines
#[derive(Debug, Clone, PartialEq)]
pub struct SimilaritySettings {
    pub threshold: f64,
    pub persist_chunk_size: usize,
    pub batch: BatchOptions,
    /// AI matches below this confidence are ignored
    pub min_ai_confidence: f64,
}

impl Default for SimilaritySettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            persist_chunk_size: DEFAULT_PERSIST_CHUNK_SIZE,
            batch: BatchOptions::default(),
            min_ai_confidence: 0.5,
        }
    }
}

/// Scores `source` against every other record and keeps edges above
/// `threshold`. Only `source → other` edges are produced.
pub fn compute_for_one(
    source: &ContentRecord,
    others: &[ContentRecord],
    threshold: f64,
) -> Vec<SimilarityEdge> {
    others
        .iter()
        .filter(|other| other.id != source.id)
        .filter_map(|other| {
            let score = attribute_score(source, other);
            (score > threshold).then(|| SimilarityEdge::new(&source.id, &other.id, score))
        })
        .collect()
}

/// Scores every unordered pair once and emits both directions for each pair
/// above `threshold`. Quadratic in the number of items.
pub fn compute_for_all(items: &[ContentRecord], threshold: f64) -> Vec<SimilarityEdge> {
    let mut edges = Vec::new();

    for (i, a) in items.iter().enumerate() {
        for b in &items[i + 1..] {
            if a.id == b.id {
                continue;
            }
            let score = attribute_score(a, b);
            if score > threshold {
                edges.push(SimilarityEdge::new(&a.id, &b.id, score));
                edges.push(SimilarityEdge::new(&b.id, &a.id, score));
            }
        }
    }

    edges
}

fn pair_count(n: usize) -> usize {
    n.saturating_mul(n.saturating_sub(1)) / 2
}

/// Counts from writing a set of edges
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistOutcome {
    pub written: usize,
    pub failed: usize,
    pub cancelled: bool,
}

/// Writes edges in chunks. A chunk the store rejects is retried one edge at a
/// time so a single bad pair only loses itself. The flag is checked between
/// chunks; chunks already written stay written.
pub async fn persist_edges(
    store: &dyn ContentStore,
    edges: &[SimilarityEdge],
    chunk_size: usize,
    flag: &CancellationFlag,
) -> PersistOutcome {
    let mut outcome = PersistOutcome::default();

    for chunk in edges.chunks(chunk_size.max(1)) {
        if !flag.should_continue() {
            outcome.cancelled = true;
            break;
        }

        match store.upsert_edges(chunk).await {
            Ok(()) => outcome.written += chunk.len(),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    chunk_len = chunk.len(),
                    "Edge chunk rejected, retrying individually"
                );
                for edge in chunk {
                    match store.upsert_edge(edge).await {
                        Ok(()) => outcome.written += 1,
                        Err(e) => {
                            outcome.failed += 1;
                            tracing::error!(
                                error = %e,
                                source_id = %edge.source_id,
                                target_id = %edge.target_id,
                                "Failed to persist similarity edge"
                            );
                        }
                    }
                }
            }
        }
    }

    outcome
}

/// Recomputes and stores the outgoing edges of one record
pub async fn refresh_for_content(
    store: &dyn ContentStore,
    content_id: &str,
    settings: &SimilaritySettings,
) -> AppResult<RecalculationProgress> {
    let source = store
        .get_by_id(content_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Content {} not found", content_id)))?;

    let others = store.get_all_except(content_id).await?;
    let edges = compute_for_one(&source, &others, settings.threshold);

    let outcome = persist_edges(
        store,
        &edges,
        settings.persist_chunk_size,
        &CancellationFlag::new(),
    )
    .await;

    tracing::info!(
        content_id = %content_id,
        compared = others.len(),
        edges = edges.len(),
        written = outcome.written,
        failed = outcome.failed,
        "Similarities refreshed"
    );

    Ok(RecalculationProgress {
        items: others.len() + 1,
        pairs_compared: others.len(),
        edges_found: edges.len(),
        edges_written: outcome.written,
        edges_failed: outcome.failed,
        cancelled: false,
    })
}

/// Full pairwise recalculation over the whole collection.
///
/// Scoring runs on a blocking thread; persistence happens in chunks and
/// stops early when `flag` is cancelled.
pub async fn recalculate_all(
    store: &dyn ContentStore,
    settings: &SimilaritySettings,
    flag: &CancellationFlag,
) -> AppResult<RecalculationProgress> {
    let start = Instant::now();
    let items = store.get_all().await?;
    let item_count = items.len();

    tracing::info!(items = item_count, pairs = pair_count(item_count), "Starting full recalculation");

    let threshold = settings.threshold;
    let edges = tokio::task::spawn_blocking(move || compute_for_all(&items, threshold))
        .await
        .map_err(|e| AppError::Internal(format!("Scoring task failed: {}", e)))?;

    let outcome = persist_edges(store, &edges, settings.persist_chunk_size, flag).await;

    let progress = RecalculationProgress {
        items: item_count,
        pairs_compared: pair_count(item_count),
        edges_found: edges.len(),
        edges_written: outcome.written,
        edges_failed: outcome.failed,
        cancelled: outcome.cancelled,
    };

    tracing::info!(
        items = progress.items,
        edges_found = progress.edges_found,
        edges_written = progress.edges_written,
        edges_failed = progress.edges_failed,
        cancelled = progress.cancelled,
        processing_time_ms = start.elapsed().as_millis(),
        "Full recalculation finished"
    );

    Ok(progress)
}
