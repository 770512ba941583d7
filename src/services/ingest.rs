use std::collections::HashSet;
use std::sync::Arc;

use crate::{
    db::ContentStore,
    error::{AppError, AppResult},
    models::{ContentRecord, ImportProgress},
    services::{
        batch::{run_batched, CancellationFlag},
        providers::{CatalogProvider, VectorIndex},
        recommendations::vector_metadata,
        similarity_store::{refresh_for_content, SimilaritySettings},
    },
};

/// Fetches a title from the catalog, stores it, indexes it and refreshes its
/// outgoing similarity edges. Indexing and edge refresh are best-effort; the
/// call fails only when the record cannot be fetched or stored.
pub async fn ingest_one(
    store: &dyn ContentStore,
    catalog: &dyn CatalogProvider,
    vectors: &dyn VectorIndex,
    settings: &SimilaritySettings,
    content_id: &str,
) -> AppResult<ContentRecord> {
    let content_id = content_id.trim();
    if content_id.is_empty() {
        return Err(AppError::InvalidInput("content id must not be empty".to_string()));
    }

    let record = catalog.fetch(content_id).await?;
    store.upsert_content(&record).await?;

    if let Err(e) = vectors
        .upsert(&record.id, &record.embedding_text(), vector_metadata(&record))
        .await
    {
        tracing::warn!(id = %record.id, error = %e, "Failed to index content");
    }

    match refresh_for_content(store, &record.id, settings).await {
        Ok(progress) => tracing::info!(
            id = %record.id,
            provider = catalog.name(),
            edges = progress.edges_written,
            "Content ingested"
        ),
        Err(e) => tracing::warn!(id = %record.id, error = %e, "Failed to refresh similarities"),
    }

    Ok(record)
}

/// Ingests many ids through the batch runner. Failed ids are reported in the
/// returned progress instead of aborting the import.
pub async fn import_batch(
    store: Arc<dyn ContentStore>,
    catalog: Arc<dyn CatalogProvider>,
    vectors: Arc<dyn VectorIndex>,
    settings: &SimilaritySettings,
    ids: Vec<String>,
    flag: &CancellationFlag,
) -> ImportProgress {
    let mut seen = HashSet::new();
    let ids: Vec<String> = ids
        .into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect();

    let mut progress = ImportProgress::new(ids.len());
    let task_settings = settings.clone();

    let outcome = run_batched(ids.clone(), &settings.batch, flag, move |id: String| {
        let store = store.clone();
        let catalog = catalog.clone();
        let vectors = vectors.clone();
        let settings = task_settings.clone();
        async move {
            ingest_one(
                store.as_ref(),
                catalog.as_ref(),
                vectors.as_ref(),
                &settings,
                &id,
            )
            .await
        }
    })
    .await;

    for (id, result) in ids.into_iter().zip(outcome.results) {
        match result {
            Ok(_) => progress.imported += 1,
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "Import failed");
                progress.failed.push(id);
            }
        }
    }
    progress.cancelled = outcome.cancelled;

    tracing::info!(
        total = progress.total,
        imported = progress.imported,
        failed = progress.failed.len(),
        cancelled = progress.cancelled,
        "Batch import finished"
    );

    progress
}
