/// Generative model client speaking the chat-completions protocol in JSON mode
///
/// Replies are parsed into explicit structs with nullable fields. When a
/// recommendation reply is not valid JSON the numbered-list parser in
/// [`fallback`] is tried before giving up.
use crate::{
    error::{AppError, AppResult},
    models::{AiMatch, AiRecommendation, ContentRecord},
    services::providers::GenerativeAi,
};
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

pub mod fallback;
pub mod prompts;

#[derive(Clone)]
pub struct OpenAiCompatibleClient {
    http_client: HttpClient,
    api_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecommendationReply {
    Wrapped {
        recommendations: Vec<AiRecommendation>,
    },
    Bare(Vec<AiRecommendation>),
}

/// Removes a surrounding ```json fence if the model added one
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

pub fn parse_recommendations(content: &str) -> AppResult<Vec<AiRecommendation>> {
    let body = strip_code_fences(content);

    let recommendations = match serde_json::from_str::<RecommendationReply>(body) {
        Ok(RecommendationReply::Wrapped { recommendations })
        | Ok(RecommendationReply::Bare(recommendations)) => recommendations,
        Err(e) => {
            tracing::warn!(error = %e, "Recommendation reply was not JSON, using list parser");
            fallback::parse_numbered_list(body)
        }
    };

    let recommendations: Vec<AiRecommendation> = recommendations
        .into_iter()
        .filter(|r| !r.title.trim().is_empty())
        .collect();

    if recommendations.is_empty() {
        return Err(AppError::ExternalApi(
            "Model reply contained no recommendations".to_string(),
        ));
    }
    Ok(recommendations)
}

pub fn parse_match(content: &str) -> AppResult<AiMatch> {
    let mut parsed: AiMatch = serde_json::from_str(strip_code_fences(content))
        .map_err(|e| AppError::ExternalApi(format!("Malformed match reply: {}", e)))?;

    parsed.confidence = if parsed.confidence.is_finite() {
        parsed.confidence.clamp(0.0, 1.0)
    } else {
        0.0
    };
    parsed.matched_id = parsed.matched_id.filter(|id| !id.trim().is_empty());
    Ok(parsed)
}

impl OpenAiCompatibleClient {
    pub fn new(api_url: String, api_key: String, model: String, timeout: Duration) -> AppResult<Self> {
        let http_client = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        })
    }

    async fn complete(&self, system: &str, user: &str) -> AppResult<String> {
        let url = format!("{}/chat/completions", self.api_url);
        let messages = [
            ChatMessage {
                role: "system",
                content: system,
            },
            ChatMessage {
                role: "user",
                content: user,
            },
        ];

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": messages,
                "response_format": { "type": "json_object" },
                "temperature": 0.4,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "Model API returned status {}: {}",
                status, body
            )));
        }

        let chat: ChatResponse = response.json().await?;
        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AppError::ExternalApi("Model reply had no content".to_string()))
    }
}

#[async_trait::async_trait]
impl GenerativeAi for OpenAiCompatibleClient {
    async fn recommend(
        &self,
        source: &ContentRecord,
        count: usize,
    ) -> AppResult<Vec<AiRecommendation>> {
        let prompt = prompts::build_recommendation_prompt(source, count);
        let content = self
            .complete(prompts::RECOMMENDATION_SYSTEM_PROMPT, &prompt)
            .await?;

        let mut recommendations = parse_recommendations(&content)?;
        recommendations.truncate(count);

        tracing::info!(
            source_id = %source.id,
            requested = count,
            received = recommendations.len(),
            "Model recommendations received"
        );
        Ok(recommendations)
    }

    async fn match_best_result(
        &self,
        original: &AiRecommendation,
        candidates: &[ContentRecord],
    ) -> AppResult<AiMatch> {
        if candidates.is_empty() {
            return Ok(AiMatch {
                matched_id: None,
                confidence: 0.0,
                reason: Some("No candidates".to_string()),
            });
        }

        let prompt = prompts::build_match_prompt(original, candidates);
        let content = self.complete(prompts::MATCH_SYSTEM_PROMPT, &prompt).await?;
        let result = parse_match(&content)?;

        tracing::debug!(
            title = %original.title,
            matched_id = ?result.matched_id,
            confidence = result.confidence,
            "Model match received"
        );
        Ok(result)
    }
}
