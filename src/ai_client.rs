//! Provider-neutral model client interface and the factory that picks one.
//!
//! The generators only ever see [`SelectedClient`]: a concrete client bound
//! to its provider, its model, and that provider's rate limiter. Picking the
//! provider happens once, in [`ClientFactory::create`].

use crate::config::Config;
use crate::error::{GenError, ProviderErrorKind};
use crate::gemini::GeminiClient;
use crate::groq::GroqClient;
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::rate_limiter::RateLimiters;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Output longer than this is cut at a blank line or hard-capped.
const MAX_OUTPUT_LINES: usize = 60;
/// Identical lines kept when a repeated run is what the output ends on.
const MAX_TRAILING_REPEATS: usize = 3;
/// A run this long is runaway generation wherever it sits.
const RUNAWAY_REPEATS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gemini,
    Groq,
}

impl Provider {
    /// Lexicographic order, which is also the auto-selection order.
    pub const ALL: [Provider; 2] = [Provider::Gemini, Provider::Groq];

    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::Groq => "groq",
        }
    }

    fn key_var(self) -> &'static str {
        match self {
            Provider::Gemini => "GEMINI_API_KEY",
            Provider::Groq => "GROQ_API_KEY",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider requested by the user; `Auto` defers to configured keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderChoice {
    Gemini,
    Groq,
    #[default]
    Auto,
}

impl FromStr for ProviderChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "groq" => Ok(Self::Groq),
            "auto" => Ok(Self::Auto),
            other => Err(format!("unknown provider '{}', use gemini, groq or auto", other)),
        }
    }
}

impl fmt::Display for ProviderChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gemini => f.write_str("gemini"),
            Self::Groq => f.write_str("groq"),
            Self::Auto => f.write_str("auto"),
        }
    }
}

/// Token accounting reported by the provider, when it reports any.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub usage: Option<Usage>,
}

/// A model backend that turns a prompt into text.
#[async_trait]
pub trait AiClient: Send + Sync {
    fn provider(&self) -> Provider;

    /// Run one completion. `system` carries the instruction template, `prompt`
    /// the user's request.
    async fn generate(
        &self,
        system: Option<&str>,
        prompt: &str,
        model: &str,
    ) -> Result<Generation, GenError>;
}

/// A client bound to its provider, model and the process rate limiters.
#[derive(Clone)]
pub struct SelectedClient {
    client: Arc<dyn AiClient>,
    model: String,
    limiters: Arc<RateLimiters>,
}

impl SelectedClient {
    pub fn new(client: Arc<dyn AiClient>, model: impl Into<String>, limiters: Arc<RateLimiters>) -> Self {
        Self {
            client,
            model: model.into(),
            limiters,
        }
    }

    pub fn provider(&self) -> Provider {
        self.client.provider()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Claim a rate-limit slot, then call the provider.
    pub async fn call(&self, system: Option<&str>, prompt: &str) -> Result<Generation, GenError> {
        self.limiters.acquire(self.provider()).await;
        let mut generation = self.client.generate(system, prompt, &self.model).await?;
        generation.text = clean_output(&generation.text);
        if generation.text.is_empty() {
            return Err(GenError::provider(
                self.provider(),
                ProviderErrorKind::MalformedResponse,
                "the model returned no text",
            ));
        }
        Ok(generation)
    }
}

/// Builds the one client a run will use.
pub struct ClientFactory {
    config: Config,
    limiters: Arc<RateLimiters>,
    http: Arc<dyn HttpClient>,
}

impl ClientFactory {
    pub fn new(config: Config, limiters: Arc<RateLimiters>) -> Self {
        let http = Arc::new(ReqwestHttpClient::new(config.request_timeout()));
        Self::with_http(config, limiters, http)
    }

    pub fn with_http(config: Config, limiters: Arc<RateLimiters>, http: Arc<dyn HttpClient>) -> Self {
        Self {
            config,
            limiters,
            http,
        }
    }

    /// Resolve `choice` to a concrete provider.
    ///
    /// An explicit provider needs its key. `Auto` takes the first provider with
    /// a key in lexicographic order. Mock mode needs no keys at all.
    pub fn resolve(&self, choice: ProviderChoice) -> Result<Provider, GenError> {
        let explicit = match choice {
            ProviderChoice::Gemini => Some(Provider::Gemini),
            ProviderChoice::Groq => Some(Provider::Groq),
            ProviderChoice::Auto => None,
        };

        if let Some(provider) = explicit {
            if self.config.use_mock || self.config.api_key(provider).is_some() {
                return Ok(provider);
            }
            return Err(GenError::Configuration(format!(
                "{} is required for provider '{}' but is not set",
                provider.key_var(),
                provider
            )));
        }

        if let Some(provider) = Provider::ALL
            .into_iter()
            .find(|p| self.config.api_key(*p).is_some())
        {
            return Ok(provider);
        }
        if self.config.use_mock {
            return Ok(Provider::Gemini);
        }
        Err(GenError::Configuration(
            "no AI provider API keys found; set GEMINI_API_KEY or GROQ_API_KEY in your environment or .env file"
                .to_string(),
        ))
    }

    pub fn create(&self, choice: ProviderChoice) -> Result<SelectedClient, GenError> {
        let provider = self.resolve(choice)?;
        let model = self.config.model(provider).to_string();

        let client: Arc<dyn AiClient> = if self.config.use_mock {
            info!("Using mock {} client (ASCII_GEN_USE_MOCK)", provider);
            Arc::new(MockClient::new(provider))
        } else {
            let key = self
                .config
                .api_key(provider)
                .map(str::to_string)
                .ok_or_else(|| {
                    GenError::Configuration(format!("{} is not set", provider.key_var()))
                })?;
            info!("Using {} with model {}", provider, model);
            match provider {
                Provider::Gemini => Arc::new(GeminiClient::new(Arc::clone(&self.http), key)),
                Provider::Groq => Arc::new(GroqClient::new(Arc::clone(&self.http), key)),
            }
        };

        Ok(SelectedClient::new(client, model, Arc::clone(&self.limiters)))
    }
}

/// Map a failed HTTP exchange to a provider error.
pub(crate) fn transport_error(provider: Provider, error: anyhow::Error) -> GenError {
    let timed_out = error
        .downcast_ref::<reqwest::Error>()
        .is_some_and(|e| e.is_timeout());
    let kind = if timed_out {
        ProviderErrorKind::Timeout
    } else {
        ProviderErrorKind::Network
    };
    GenError::provider(provider, kind, error.to_string())
}

/// Tidy raw model text for display.
///
/// Strips a wrapping markdown fence and caps the output at
/// [`MAX_OUTPUT_LINES`]. Runaway repetition is cut: more than two blank lines
/// in a row, a run of [`RUNAWAY_REPEATS`] identical lines, or a run of more
/// than [`MAX_TRAILING_REPEATS`] that nothing follows. Shorter runs inside a
/// drawing, such as the blank rows of a tall box, are kept.
pub fn clean_output(raw: &str) -> String {
    let mut text = raw.trim_end();
    if text.trim_start().starts_with("```") {
        text = match text.trim_start().split_once('\n') {
            Some((_, rest)) => rest,
            None => "",
        };
        let trimmed = text.trim_end();
        text = trimmed.strip_suffix("```").unwrap_or(trimmed);
    }

    let mut lines: Vec<&str> = Vec::new();
    let mut blank_run = 0;
    let mut repeat_run = 0;
    let mut previous: Option<&str> = None;

    for line in text.lines() {
        let content = line.trim();
        if content.is_empty() {
            blank_run += 1;
            if blank_run > 2 {
                break;
            }
            lines.push("");
            continue;
        }
        blank_run = 0;

        if previous == Some(content) {
            repeat_run += 1;
            if repeat_run > RUNAWAY_REPEATS {
                break;
            }
        } else {
            repeat_run = 1;
            previous = Some(content);
        }
        lines.push(line.trim_end());
    }

    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    if let Some(last) = lines.last().copied().map(str::trim) {
        let run = lines.iter().rev().take_while(|l| l.trim() == last).count();
        if run > MAX_TRAILING_REPEATS {
            lines.truncate(lines.len() - run + MAX_TRAILING_REPEATS);
        }
    }

    if lines.len() > MAX_OUTPUT_LINES {
        let cut = (40..MAX_OUTPUT_LINES)
            .find(|&i| lines[i].is_empty())
            .unwrap_or(MAX_OUTPUT_LINES);
        lines.truncate(cut);
    }

    // Leading indentation carries the drawing, so only trim line ends.
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    while lines.first().is_some_and(|l| l.is_empty()) {
        lines.remove(0);
    }
    lines.join("\n")
}

/// Deterministic offline client.
///
/// Used for `ASCII_GEN_USE_MOCK=1` runs and in tests. It counts calls so
/// callers can check how often the provider was actually reached.
pub struct MockClient {
    provider: Provider,
    response: Option<String>,
    failure: Option<ProviderErrorKind>,
    calls: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
}

impl MockClient {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            response: None,
            failure: None,
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_response(provider: Provider, response: &str) -> Self {
        Self {
            response: Some(response.to_string()),
            ..Self::new(provider)
        }
    }

    pub fn failing(provider: Provider, kind: ProviderErrorKind) -> Self {
        Self {
            failure: Some(kind),
            ..Self::new(provider)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn canned(system: Option<&str>, prompt: &str) -> String {
        let system = system.unwrap_or_default();
        if system.contains("flowchart") || system.contains("architecture") {
            "┌─────────┐\n│  Start  │\n└────┬────┘\n     ↓\n┌─────────┐\n│   End   │\n└─────────┘".to_string()
        } else if system.contains("chart") {
            format!(
                "{}\n┌──────────────────────┐\n│ A ████████       100 │\n│ B ████████████   150 │\n└──────────────────────┘",
                prompt.trim()
            )
        } else if system.contains("ASCII") {
            "  /\\_/\\\n ( o.o )\n  > ^ <".to_string()
        } else {
            format!("Mock response for: {}", prompt.trim())
        }
    }
}

#[async_trait]
impl AiClient for MockClient {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn generate(
        &self,
        system: Option<&str>,
        prompt: &str,
        _model: &str,
    ) -> Result<Generation, GenError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap_or_else(|e| e.into_inner()) = Some(prompt.to_string());

        if let Some(kind) = self.failure {
            warn!("Mock {} client failing with {}", self.provider, kind);
            return Err(GenError::provider(self.provider, kind, "mock failure"));
        }

        let text = self
            .response
            .clone()
            .unwrap_or_else(|| Self::canned(system, prompt));
        Ok(Generation {
            text,
            usage: Some(Usage {
                prompt_tokens: prompt.split_whitespace().count() as u32,
                completion_tokens: 0,
                total_tokens: prompt.split_whitespace().count() as u32,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limiter::RateLimit;
    use std::time::Duration;

    fn limiters() -> Arc<RateLimiters> {
        Arc::new(
            RateLimiters::uniform(RateLimit {
                max_calls: 10,
                window: Duration::from_secs(60),
            })
            .unwrap(),
        )
    }

    fn factory(gemini: Option<&str>, groq: Option<&str>) -> ClientFactory {
        let config = Config {
            gemini_api_key: gemini.map(str::to_string),
            groq_api_key: groq.map(str::to_string),
            ..Config::default()
        };
        ClientFactory::new(config, limiters())
    }

    #[test]
    fn test_auto_prefers_gemini_then_groq() {
        assert_eq!(
            factory(Some("g"), Some("q")).resolve(ProviderChoice::Auto).unwrap(),
            Provider::Gemini
        );
        assert_eq!(
            factory(None, Some("q")).resolve(ProviderChoice::Auto).unwrap(),
            Provider::Groq
        );
    }

    #[test]
    fn test_missing_keys_are_configuration_errors() {
        let err = factory(None, None).resolve(ProviderChoice::Auto).unwrap_err();
        assert!(matches!(err, GenError::Configuration(_)));

        let err = factory(Some("g"), None).resolve(ProviderChoice::Groq).unwrap_err();
        assert!(err.to_string().contains("GROQ_API_KEY"));
    }

    #[test]
    fn test_factory_binds_model_for_provider() {
        let selected = factory(None, Some("q")).create(ProviderChoice::Groq).unwrap();
        assert_eq!(selected.provider(), Provider::Groq);
        assert_eq!(selected.model(), crate::config::DEFAULT_GROQ_MODEL);
    }

    #[test]
    fn test_provider_choice_parsing() {
        assert_eq!("GROQ".parse::<ProviderChoice>().unwrap(), ProviderChoice::Groq);
        assert_eq!(" auto ".parse::<ProviderChoice>().unwrap(), ProviderChoice::Auto);
        assert!("openai".parse::<ProviderChoice>().is_err());
    }

    #[test]
    fn test_clean_output_strips_fences() {
        let raw = "```text\n  /\\_/\\\n ( o.o )\n```";
        assert_eq!(clean_output(raw), "  /\\_/\\\n ( o.o )");
    }

    #[test]
    fn test_clean_output_keeps_leading_indentation() {
        assert_eq!(clean_output("    |\n    |  \n"), "    |\n    |");
    }

    #[test]
    fn test_clean_output_cuts_runaway_repetition() {
        let raw = "top\n| |\n| |\n| |\n| |\n| |\n| |";
        assert_eq!(clean_output(raw), "top\n| |\n| |\n| |");

        let raw = "a\n\n\n\n\nb";
        assert_eq!(clean_output(raw), "a");
    }

    #[test]
    fn test_clean_output_keeps_tall_boxes() {
        let mut rows = vec!["┌──────────┐"];
        rows.extend(["│          │"; 4]);
        rows.extend(["│  Server  │", "└──────────┘"]);
        let raw = rows.join("\n");

        assert_eq!(clean_output(&raw), raw);
    }

    #[test]
    fn test_clean_output_cuts_long_runs_mid_output() {
        let mut rows = vec!["top"];
        rows.extend(["loop"; 30]);
        rows.push("never reached");

        let cleaned = clean_output(&rows.join("\n"));
        assert_eq!(cleaned, "top\nloop\nloop\nloop");
    }

    #[tokio::test]
    async fn test_selected_client_returns_tall_box_whole() {
        let raw = "```\n┌───┐\n│   │\n│   │\n│   │\n│   │\n│ A │\n└───┘\n```";
        let client = Arc::new(MockClient::with_response(Provider::Gemini, raw));
        let selected = SelectedClient::new(client, "m", limiters());

        let generation = selected.call(None, "a tall box").await.unwrap();
        assert_eq!(generation.text.lines().count(), 7);
        assert!(generation.text.ends_with("│ A │\n└───┘"));
    }

    #[test]
    fn test_clean_output_caps_length() {
        let raw: Vec<String> = (0..100).map(|i| format!("line {}", i)).collect();
        let cleaned = clean_output(&raw.join("\n"));
        assert_eq!(cleaned.lines().count(), MAX_OUTPUT_LINES);
    }

    #[tokio::test]
    async fn test_selected_client_rejects_empty_output() {
        let client = Arc::new(MockClient::with_response(Provider::Groq, "```\n```"));
        let selected = SelectedClient::new(client, "m", limiters());
        let err = selected.call(None, "hi").await.unwrap_err();
        assert!(matches!(
            err,
            GenError::Provider {
                kind: ProviderErrorKind::MalformedResponse,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_mock_client_counts_calls() {
        let client = MockClient::new(Provider::Gemini);
        client.generate(None, "a cat", "m").await.unwrap();
        client.generate(None, "a dog", "m").await.unwrap();
        assert_eq!(client.calls(), 2);
        assert_eq!(client.last_prompt().as_deref(), Some("a dog"));
    }
}
