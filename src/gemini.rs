//! Google Gemini client over the Generative Language REST API.

use crate::ai_client::{transport_error, AiClient, Generation, Provider, Usage};
use crate::error::{GenError, ProviderErrorKind};
use crate::http_client::HttpClient;
use crate::prompts::single_turn;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

pub struct GeminiClient {
    http: Arc<dyn HttpClient>,
    api_key: String,
}

impl GeminiClient {
    pub fn new(http: Arc<dyn HttpClient>, api_key: String) -> Self {
        Self { http, api_key }
    }

    fn request_body(system: Option<&str>, prompt: &str) -> serde_json::Value {
        let full_prompt = match system {
            Some(system) => single_turn(system, prompt),
            None => prompt.to_string(),
        };
        json!({
            "contents": [
                { "role": "user", "parts": [ { "text": full_prompt } ] }
            ],
            "generationConfig": {
                "temperature": 0.7,
                "maxOutputTokens": 2048
            }
        })
    }

    fn parse_response(body: &str) -> Result<Generation, GenError> {
        let response: GenerateContentResponse = serde_json::from_str(body).map_err(|e| {
            warn!("Failed to parse Gemini response: {}", e);
            GenError::provider(
                Provider::Gemini,
                ProviderErrorKind::MalformedResponse,
                format!("response was not valid JSON: {}", e),
            )
        })?;

        let text: String = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(GenError::provider(
                Provider::Gemini,
                ProviderErrorKind::MalformedResponse,
                "no candidate text in response",
            ));
        }

        let usage = response.usage_metadata.map(|u| Usage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        });
        Ok(Generation { text, usage })
    }

    fn classify_failure(status: u16, body: &str) -> GenError {
        let (message, mut kind) = match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => (
                envelope.error.message,
                match envelope.error.status.as_str() {
                    "RESOURCE_EXHAUSTED" => Some(ProviderErrorKind::Quota),
                    "UNAUTHENTICATED" | "PERMISSION_DENIED" => Some(ProviderErrorKind::Auth),
                    _ => None,
                },
            ),
            Err(_) => (body.chars().take(200).collect(), None),
        };
        // Gemini reports an invalid key as a 400 with this wording.
        if message.contains("API key not valid") {
            kind = Some(ProviderErrorKind::Auth);
        }
        let kind = kind.unwrap_or_else(|| ProviderErrorKind::from_status(status, &message));
        GenError::provider(Provider::Gemini, kind, format!("HTTP {}: {}", status, message))
    }
}

#[async_trait]
impl AiClient for GeminiClient {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    async fn generate(
        &self,
        system: Option<&str>,
        prompt: &str,
        model: &str,
    ) -> Result<Generation, GenError> {
        let url = format!("{}/{}:generateContent", API_BASE, model);
        let body = Self::request_body(system, prompt);
        let headers = [
            ("x-goog-api-key", self.api_key.as_str()),
            ("content-type", "application/json"),
        ];

        let response = self
            .http
            .post_json(&url, &headers, &body)
            .await
            .map_err(|e| transport_error(Provider::Gemini, e))?;
        debug!("Gemini answered with HTTP {}", response.status);

        if !response.is_success() {
            return Err(Self::classify_failure(response.status, &response.body));
        }
        Self::parse_response(&response.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::tests::MockHttpClient;

    #[test]
    fn test_request_body_combines_system_and_prompt() {
        let body = GeminiClient::request_body(Some("SYSTEM"), "a cat");
        let text = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert_eq!(text, "SYSTEM\n\nUser request: a cat");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 2048);
    }

    #[tokio::test]
    async fn test_generate_parses_text_and_usage() {
        let http = Arc::new(MockHttpClient::new(
            200,
            r#"{
                "candidates": [{"content": {"parts": [{"text": " /\\_/\\ "}, {"text": "\n( o.o )"}]}}],
                "usageMetadata": {"promptTokenCount": 12, "candidatesTokenCount": 8, "totalTokenCount": 20}
            }"#,
        ));
        let client = GeminiClient::new(http.clone(), "key".to_string());
        let generation = client.generate(None, "a cat", "gemini-2.5-pro").await.unwrap();

        assert_eq!(generation.text, " /\\_/\\ \n( o.o )");
        assert_eq!(generation.usage.unwrap().total_tokens, 20);
        assert!(http
            .last_url
            .lock()
            .unwrap()
            .as_deref()
            .unwrap()
            .ends_with("/gemini-2.5-pro:generateContent"));
    }

    #[tokio::test]
    async fn test_quota_failure_is_retryable() {
        let http = Arc::new(MockHttpClient::new(
            429,
            r#"{"error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}}"#,
        ));
        let client = GeminiClient::new(http, "key".to_string());
        let err = client.generate(None, "a cat", "m").await.unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("gemini"));
    }

    #[tokio::test]
    async fn test_invalid_key_is_auth_error() {
        let http = Arc::new(MockHttpClient::new(
            400,
            r#"{"error": {"code": 400, "message": "API key not valid. Please pass a valid API key.", "status": "INVALID_ARGUMENT"}}"#,
        ));
        let client = GeminiClient::new(http, "bad".to_string());
        let err = client.generate(None, "a cat", "m").await.unwrap_err();
        assert!(matches!(
            err,
            GenError::Provider {
                kind: ProviderErrorKind::Auth,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_empty_candidates_is_malformed() {
        let http = Arc::new(MockHttpClient::new(200, r#"{"candidates": []}"#));
        let client = GeminiClient::new(http, "key".to_string());
        let err = client.generate(None, "a cat", "m").await.unwrap_err();
        assert!(matches!(
            err,
            GenError::Provider {
                kind: ProviderErrorKind::MalformedResponse,
                ..
            }
        ));
    }
}
