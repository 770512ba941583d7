/// OMDB catalog provider
///
/// API Flow:
/// 1. Details: `?i={imdb_id}&plot=full` → full record (genres, director, actors, plot)
/// 2. Search: `?s={title}&y={year}` → lightweight results (title, year, id, type)
///
/// OMDB answers HTTP 200 even for misses and reports them with
/// `"Response": "False"` plus an `"Error"` message.
use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::{ContentRecord, OmdbSearchItem, OmdbTitle},
    services::providers::CatalogProvider,
};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use std::time::Duration;

const TITLE_CACHE_TTL: u64 = 604800; // 1 week
const SEARCH_CACHE_TTL: u64 = 86400; // 1 day

#[derive(Clone)]
pub struct OmdbProvider {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    cache: Cache,
}

#[derive(Debug, Deserialize)]
struct OmdbEnvelope {
    #[serde(rename = "Response")]
    response: String,
    #[serde(rename = "Error", default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OmdbSearchResponse {
    #[serde(rename = "Search", default)]
    search: Vec<OmdbSearchItem>,
}

/// Outcome of checking OMDB's in-band status flag
#[derive(Debug, PartialEq)]
enum OmdbStatus {
    Found,
    NotFound(String),
    Failed(String),
}

fn check_response(body: &str) -> AppResult<OmdbStatus> {
    let envelope: OmdbEnvelope = serde_json::from_str(body)
        .map_err(|e| AppError::ExternalApi(format!("Failed to parse OMDB response: {}", e)))?;

    if envelope.response.eq_ignore_ascii_case("true") {
        return Ok(OmdbStatus::Found);
    }

    let message = envelope.error.unwrap_or_else(|| "Unknown OMDB error".to_string());
    // OMDB phrases misses as "Movie not found!" / "Incorrect IMDb ID."
    let lower = message.to_lowercase();
    if lower.contains("not found") || lower.contains("incorrect imdb id") {
        Ok(OmdbStatus::NotFound(message))
    } else {
        Ok(OmdbStatus::Failed(message))
    }
}

fn parse_title(body: &str) -> AppResult<ContentRecord> {
    match check_response(body)? {
        OmdbStatus::Found => {}
        OmdbStatus::NotFound(msg) => return Err(AppError::NotFound(msg)),
        OmdbStatus::Failed(msg) => return Err(AppError::ExternalApi(msg)),
    }

    let title: OmdbTitle = serde_json::from_str(body)
        .map_err(|e| AppError::ExternalApi(format!("Failed to parse OMDB title: {}", e)))?;
    Ok(title.into())
}

fn parse_search(body: &str) -> AppResult<Vec<ContentRecord>> {
    match check_response(body)? {
        OmdbStatus::Found => {}
        OmdbStatus::NotFound(_) => return Ok(Vec::new()),
        OmdbStatus::Failed(msg) => return Err(AppError::ExternalApi(msg)),
    }

    let response: OmdbSearchResponse = serde_json::from_str(body)
        .map_err(|e| AppError::ExternalApi(format!("Failed to parse OMDB search: {}", e)))?;
    Ok(response.search.into_iter().map(ContentRecord::from).collect())
}

impl OmdbProvider {
    pub fn new(
        cache: Cache,
        api_key: String,
        api_url: String,
        timeout: Duration,
    ) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            api_key,
            api_url,
            cache,
        })
    }

    async fn get(&self, params: &[(&str, &str)]) -> AppResult<String> {
        let response = self
            .http_client
            .get(&self.api_url)
            .query(&[("apikey", self.api_key.as_str())])
            .query(params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "OMDB API returned status {}: {}",
                status, body
            )));
        }

        Ok(response.text().await?)
    }
}

#[async_trait::async_trait]
impl CatalogProvider for OmdbProvider {
    async fn fetch(&self, id: &str) -> AppResult<ContentRecord> {
        if id.trim().is_empty() {
            return Err(AppError::InvalidInput("Content id cannot be empty".to_string()));
        }

        cached!(
            self.cache,
            CacheKey::OmdbTitle(id.to_string()),
            TITLE_CACHE_TTL,
            async move {
                let body = self.get(&[("i", id), ("plot", "full")]).await?;
                let record = parse_title(&body)?;

                tracing::info!(
                    id = %id,
                    title = %record.title,
                    provider = "omdb",
                    "Title fetched"
                );

                Ok::<_, AppError>(record)
            }
        )
    }

    async fn search(&self, title: &str, year: Option<i32>) -> AppResult<Vec<ContentRecord>> {
        if title.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "Search query cannot be empty".to_string(),
            ));
        }

        cached!(
            self.cache,
            CacheKey::OmdbSearch {
                title: title.to_string(),
                year,
            },
            SEARCH_CACHE_TTL,
            async move {
                let year_param = year.map(|y| y.to_string());
                let mut params = vec![("s", title)];
                if let Some(y) = year_param.as_deref() {
                    params.push(("y", y));
                }

                let body = self.get(&params).await?;
                let results = parse_search(&body)?;

                tracing::info!(
                    query = %title,
                    year = ?year,
                    results = results.len(),
                    provider = "omdb",
                    "Title search completed"
                );

                Ok::<_, AppError>(results)
            }
        )
    }

    fn name(&self) -> &'static str {
        "omdb"
    }
}
