/// REST client for a hosted vector index that embeds raw text server-side
///
/// Endpoints:
/// - `POST /upsert-data` with `{id, data, metadata}`
/// - `POST /query-data` with `{data, topK, includeMetadata}` → `{result: [{id, score, metadata}]}`
use crate::{
    error::{AppError, AppResult},
    models::VectorMatch,
    services::providers::VectorIndex,
};
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone)]
pub struct HttpVectorIndex {
    http_client: HttpClient,
    api_url: String,
    token: String,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    id: &'a str,
    data: &'a str,
    metadata: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    data: &'a str,
    top_k: usize,
    include_metadata: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    result: Vec<VectorMatch>,
}

impl HttpVectorIndex {
    pub fn new(api_url: String, token: String, timeout: Duration) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> AppResult<String> {
        let url = format!("{}/{}", self.api_url, path);
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Vector index returned status {}: {}",
                status, body
            )));
        }

        Ok(response.text().await?)
    }
}

fn parse_query_response(body: &str) -> AppResult<Vec<VectorMatch>> {
    let parsed: QueryResponse = serde_json::from_str(body).map_err(|e| {
        AppError::ExternalApi(format!("Failed to parse vector query response: {}", e))
    })?;
    Ok(parsed.result)
}

#[async_trait::async_trait]
impl VectorIndex for HttpVectorIndex {
    async fn upsert(&self, id: &str, text: &str, metadata: serde_json::Value) -> AppResult<()> {
        if text.trim().is_empty() {
            return Err(AppError::InvalidInput(format!(
                "Refusing to index empty text for {}",
                id
            )));
        }

        self.post(
            "upsert-data",
            &UpsertRequest {
                id,
                data: text,
                metadata,
            },
        )
        .await?;

        tracing::debug!(id = %id, "Vector upserted");
        Ok(())
    }

    async fn query(&self, text: &str, top_k: usize) -> AppResult<Vec<VectorMatch>> {
        if text.trim().is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let body = self
            .post(
                "query-data",
                &QueryRequest {
                    data: text,
                    top_k,
                    include_metadata: true,
                },
            )
            .await?;

        let matches = parse_query_response(&body)?;
        tracing::debug!(top_k, results = matches.len(), "Vector query completed");
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_request_serialization() {
        let request = QueryRequest {
            data: "heist thriller",
            top_k: 5,
            include_metadata: true,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({"data": "heist thriller", "topK": 5, "includeMetadata": true})
        );
    }

    #[test]
    fn test_parse_query_response() {
        let body = r#"{"result": [
            {"id": "tt0113277", "score": 0.91, "metadata": {"title": "Heat"}},
            {"id": "tt0468569", "score": 0.80}
        ]}"#;

        let matches = parse_query_response(body).unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].id, "tt0113277");
        assert_eq!(matches[0].metadata, Some(json!({"title": "Heat"})));
        assert_eq!(matches[1].metadata, None);
    }

    #[test]
    fn test_parse_query_response_malformed() {
        assert!(parse_query_response("not json").is_err());
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let index = HttpVectorIndex::new(
            "http://vectors.local/".to_string(),
            "token".to_string(),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(index.api_url, "http://vectors.local");
    }
}
