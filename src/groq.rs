//! Groq client over its OpenAI-compatible chat completions endpoint.

use crate::ai_client::{transport_error, AiClient, Generation, Provider, Usage};
use crate::error::{GenError, ProviderErrorKind};
use crate::http_client::HttpClient;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, warn};

const CHAT_COMPLETIONS_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<CompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
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
    code: Option<String>,
}

pub struct GroqClient {
    http: Arc<dyn HttpClient>,
    api_key: String,
}

impl GroqClient {
    pub fn new(http: Arc<dyn HttpClient>, api_key: String) -> Self {
        Self { http, api_key }
    }

    fn request_body(system: Option<&str>, prompt: &str, model: &str) -> serde_json::Value {
        let mut messages = Vec::new();
        if let Some(system) = system {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": prompt }));

        json!({
            "model": model,
            "messages": messages,
            "temperature": 0.6,
            "max_completion_tokens": 1024,
            "top_p": 1,
            "stream": false
        })
    }

    fn parse_response(body: &str) -> Result<Generation, GenError> {
        let completion: ChatCompletion = serde_json::from_str(body).map_err(|e| {
            warn!("Failed to parse Groq response: {}", e);
            GenError::provider(
                Provider::Groq,
                ProviderErrorKind::MalformedResponse,
                format!("response was not valid JSON: {}", e),
            )
        })?;

        let text = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                GenError::provider(
                    Provider::Groq,
                    ProviderErrorKind::MalformedResponse,
                    "no response generated from the API",
                )
            })?;

        let usage = completion.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });
        Ok(Generation { text, usage })
    }

    fn classify_failure(status: u16, body: &str) -> GenError {
        let (message, code) = match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) => (envelope.error.message, envelope.error.code),
            Err(_) => (body.chars().take(200).collect(), None),
        };
        let kind = match code.as_deref() {
            Some("invalid_api_key") => ProviderErrorKind::Auth,
            Some("rate_limit_exceeded") => ProviderErrorKind::Quota,
            _ => ProviderErrorKind::from_status(status, &message),
        };
        GenError::provider(Provider::Groq, kind, format!("HTTP {}: {}", status, message))
    }
}

#[async_trait]
impl AiClient for GroqClient {
    fn provider(&self) -> Provider {
        Provider::Groq
    }

    async fn generate(
        &self,
        system: Option<&str>,
        prompt: &str,
        model: &str,
    ) -> Result<Generation, GenError> {
        let body = Self::request_body(system, prompt, model);
        let auth = format!("Bearer {}", self.api_key);
        let headers = [
            ("authorization", auth.as_str()),
            ("content-type", "application/json"),
        ];

        let response = self
            .http
            .post_json(CHAT_COMPLETIONS_URL, &headers, &body)
            .await
            .map_err(|e| transport_error(Provider::Groq, e))?;
        debug!("Groq answered with HTTP {}", response.status);

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
    fn test_request_body_uses_system_message() {
        let body = GroqClient::request_body(Some("SYSTEM"), "Q1=100", "llama");
        assert_eq!(body["model"], "llama");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Q1=100");
        assert_eq!(body["stream"], false);

        let bare = GroqClient::request_body(None, "hi", "llama");
        assert_eq!(bare["messages"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_generate_parses_choice_and_usage() {
        let http = Arc::new(MockHttpClient::new(
            200,
            r#"{
                "choices": [{"index": 0, "message": {"role": "assistant", "content": "┌─┐\n└─┘"}}],
                "usage": {"prompt_tokens": 30, "completion_tokens": 6, "total_tokens": 36}
            }"#,
        ));
        let client = GroqClient::new(http.clone(), "gsk".to_string());
        let generation = client.generate(Some("sys"), "box", "llama").await.unwrap();

        assert_eq!(generation.text, "┌─┐\n└─┘");
        assert_eq!(
            generation.usage,
            Some(Usage {
                prompt_tokens: 30,
                completion_tokens: 6,
                total_tokens: 36
            })
        );
        let sent = http.last_body.lock().unwrap().clone().unwrap();
        assert_eq!(sent["messages"][0]["content"], "sys");
    }

    #[tokio::test]
    async fn test_invalid_key_is_not_retryable() {
        let http = Arc::new(MockHttpClient::new(
            401,
            r#"{"error": {"message": "Invalid API Key", "type": "invalid_request_error", "code": "invalid_api_key"}}"#,
        ));
        let client = GroqClient::new(http, "bad".to_string());
        let err = client.generate(None, "hi", "llama").await.unwrap_err();
        assert!(matches!(
            err,
            GenError::Provider {
                provider: Provider::Groq,
                kind: ProviderErrorKind::Auth,
                ..
            }
        ));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_rate_limited_response_is_quota() {
        let http = Arc::new(MockHttpClient::new(429, "Too Many Requests"));
        let client = GroqClient::new(http, "gsk".to_string());
        let err = client.generate(None, "hi", "llama").await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_missing_content_is_malformed() {
        let http = Arc::new(MockHttpClient::new(
            200,
            r#"{"choices": [{"message": {"role": "assistant", "content": null}}]}"#,
        ));
        let client = GroqClient::new(http, "gsk".to_string());
        let err = client.generate(None, "hi", "llama").await.unwrap_err();
        assert!(matches!(
            err,
            GenError::Provider {
                kind: ProviderErrorKind::MalformedResponse,
                ..
            }
        ));
    }
}
