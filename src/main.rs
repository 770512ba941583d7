use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use cinematch_api::{
    config::Config,
    db::{create_pool, create_redis_client, Cache, PgContentStore},
    routes::{create_router, AppState},
    services::providers::{HttpVectorIndex, OmdbProvider, OpenAiCompatibleClient},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("cinematch_api=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;
    let timeout = config.external_timeout();

    let pool = create_pool(&config.database_url).await?;
    let redis_client = create_redis_client(&config.redis_url)?;
    let (cache, cache_writer) = Cache::new(redis_client).await;

    let catalog = OmdbProvider::new(
        cache,
        config.omdb_api_key.clone(),
        config.omdb_api_url.clone(),
        timeout,
    )?;
    let ai = OpenAiCompatibleClient::new(
        config.ai_api_url.clone(),
        config.ai_api_key.clone(),
        config.ai_model.clone(),
        timeout,
    )?;
    let vectors = HttpVectorIndex::new(
        config.vector_api_url.clone(),
        config.vector_api_token.clone(),
        timeout,
    )?;

    let state = AppState::new(
        Arc::new(PgContentStore::new(pool)),
        Arc::new(catalog),
        Arc::new(ai),
        Arc::new(vectors),
        config.similarity_settings(),
    );
    let app = create_router(Arc::new(state));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(address = %addr, "Server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await?;

    cache_writer.shutdown().await;
    tracing::info!("Server stopped");
    Ok(())
}
