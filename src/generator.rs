//! The generation workflow shared by art, chart and diagram requests.
//!
//! For every prompt: build the request, fingerprint it, consult the cache,
//! and only on a miss claim a rate-limit slot and call the provider. Provider
//! failures are returned to the caller and never cached.

use crate::ai_client::{Provider, ProviderChoice, SelectedClient, Usage};
use crate::cache::{fingerprint, CacheEntry, ContentStore};
use crate::error::GenError;
use crate::prompt_builder::{Mode, Orientation, PromptBuilder, PromptOptions};
use crate::prompts::explanation_prompt;
use crate::providers::TimeProvider;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Request options as the command line sees them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerateOptions {
    pub provider: ProviderChoice,
    pub live: bool,
    pub explain: bool,
    pub colors: bool,
    pub orientation: Orientation,
    pub logo: bool,
    pub no_cache: bool,
    pub max_files: usize,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            provider: ProviderChoice::Auto,
            live: false,
            explain: false,
            colors: true,
            orientation: Orientation::TopToBottom,
            logo: false,
            no_cache: false,
            max_files: 50,
        }
    }
}

impl GenerateOptions {
    pub fn prompt_options(&self, codebase: bool) -> PromptOptions {
        PromptOptions {
            logo: self.logo,
            orientation: self.orientation,
            explain: self.explain,
            colors: self.colors,
            codebase,
        }
    }
}

/// The result of one prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOutcome {
    pub prompt: String,
    pub output: String,
    pub cached: bool,
    pub provider: Provider,
    pub model: String,
    pub usage: Option<Usage>,
    pub explanation: Option<String>,
}

pub struct Generator {
    builder: Arc<PromptBuilder>,
    store: Arc<dyn ContentStore>,
    client: SelectedClient,
    clock: Arc<dyn TimeProvider>,
}

impl Generator {
    pub fn new(
        builder: Arc<PromptBuilder>,
        store: Arc<dyn ContentStore>,
        client: SelectedClient,
        clock: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            builder,
            store,
            client,
            clock,
        }
    }

    pub fn client(&self) -> &SelectedClient {
        &self.client
    }

    /// Run every prompt in order. One failing prompt does not stop the rest.
    pub async fn generate(
        &self,
        mode: Mode,
        prompts: &[String],
        options: &GenerateOptions,
    ) -> Vec<Result<GenerationOutcome, GenError>> {
        let mut results = Vec::with_capacity(prompts.len());
        for prompt in prompts {
            let result = self
                .generate_one(mode, prompt, &options.prompt_options(false))
                .await;
            if let Err(e) = &result {
                warn!("Generation failed for '{}': {}", prompt, e);
            }
            results.push(result);
        }
        results
    }

    /// Generate a single result for `user_text`.
    pub async fn generate_one(
        &self,
        mode: Mode,
        user_text: &str,
        options: &PromptOptions,
    ) -> Result<GenerationOutcome, GenError> {
        let user_text = user_text.trim();
        if user_text.is_empty() {
            return Err(GenError::Configuration("prompt must not be empty".to_string()));
        }

        let request = self.builder.build(mode, user_text, options);
        let provider = self.client.provider();
        let model = self.client.model().to_string();
        let key = fingerprint(mode, &request.user_text, options, provider, &model);

        let (output, cached, usage) = match self.store.get(&key).await {
            Some(entry) => {
                info!("Cache hit for {} request '{}'", mode, user_text);
                (entry.output, true, None)
            }
            None => {
                debug!("Cache miss for {} request '{}'", mode, user_text);
                let generation = self
                    .client
                    .call(Some(request.system_prompt()), &request.user_text)
                    .await?;
                self.store
                    .put(CacheEntry {
                        fingerprint: key,
                        output: generation.text.clone(),
                        created_at: self.clock.now(),
                        provider,
                        model: model.clone(),
                    })
                    .await;
                (generation.text, false, generation.usage)
            }
        };

        let explanation = if options.explain {
            self.explain(mode, user_text, &output).await
        } else {
            None
        };

        Ok(GenerationOutcome {
            prompt: user_text.to_string(),
            output,
            cached,
            provider,
            model,
            usage,
            explanation,
        })
    }

    /// One extra uncached call. A failed explanation only loses the
    /// explanation, never the generated output.
    async fn explain(&self, mode: Mode, user_text: &str, output: &str) -> Option<String> {
        let kind = match mode {
            Mode::Art => "art",
            Mode::Chart => "chart",
            Mode::Diagram => "diagram",
        };
        let prompt = explanation_prompt(kind, user_text, output);
        match self.client.call(None, &prompt).await {
            Ok(generation) => Some(generation.text),
            Err(e) => {
                warn!("Could not generate explanation: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai_client::MockClient;
    use crate::cache::DiskCache;
    use crate::error::ProviderErrorKind;
    use crate::examples_loader::ExampleLoader;
    use crate::providers::FixedTimeProvider;
    use crate::rate_limiter::{RateLimit, RateLimiters};
    use std::time::Duration;
    use tempfile::TempDir;

    struct Harness {
        _dir: TempDir,
        client: Arc<MockClient>,
        generator: Generator,
    }

    fn harness(client: MockClient, cache_enabled: bool) -> Harness {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(FixedTimeProvider::new(1_000));
        let loader = Arc::new(ExampleLoader::new(dir.path().join("corpus"), 4));
        let builder = Arc::new(PromptBuilder::new(loader, 2));
        let store: Arc<dyn ContentStore> = if cache_enabled {
            Arc::new(DiskCache::new(dir.path().join("cache"), None, clock.clone()))
        } else {
            Arc::new(DiskCache::disabled(clock.clone()))
        };
        let limiters = Arc::new(
            RateLimiters::uniform(RateLimit {
                max_calls: 100,
                window: Duration::from_secs(60),
            })
            .unwrap(),
        );
        let client = Arc::new(client);
        let selected = SelectedClient::new(client.clone(), "test-model", limiters);
        Harness {
            _dir: dir,
            client,
            generator: Generator::new(builder, store, selected, clock),
        }
    }

    fn prompts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_second_identical_request_is_cached() {
        let h = harness(MockClient::new(Provider::Groq), true);
        let options = GenerateOptions::default();

        let first = h
            .generator
            .generate(Mode::Chart, &prompts(&["Q1=100"]), &options)
            .await;
        let second = h
            .generator
            .generate(Mode::Chart, &prompts(&["  q1=100 "]), &options)
            .await;

        let first = first[0].as_ref().unwrap();
        let second = second[0].as_ref().unwrap();
        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(first.output, second.output);
        assert_eq!(h.client.calls(), 1);
    }

    #[tokio::test]
    async fn test_disabled_cache_always_calls_provider() {
        let h = harness(MockClient::new(Provider::Gemini), false);
        let options = GenerateOptions::default();
        for _ in 0..2 {
            let results = h
                .generator
                .generate(Mode::Art, &prompts(&["a cat"]), &options)
                .await;
            assert!(!results[0].as_ref().unwrap().cached);
        }
        assert_eq!(h.client.calls(), 2);
    }

    #[tokio::test]
    async fn test_provider_failure_is_not_cached() {
        let h = harness(MockClient::failing(Provider::Groq, ProviderErrorKind::Quota), true);
        let options = GenerateOptions::default();

        for _ in 0..2 {
            let results = h
                .generator
                .generate(Mode::Diagram, &prompts(&["login flow"]), &options)
                .await;
            assert!(matches!(results[0], Err(GenError::Provider { .. })));
        }
        assert_eq!(h.client.calls(), 2);
    }

    #[tokio::test]
    async fn test_each_prompt_gets_its_own_result() {
        let h = harness(MockClient::new(Provider::Groq), true);
        let results = h
            .generator
            .generate(
                Mode::Chart,
                &prompts(&["A=1", "   ", "B=2"]),
                &GenerateOptions::default(),
            )
            .await;

        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(GenError::Configuration(_))));
        assert!(results[2].is_ok());
        assert_eq!(h.client.calls(), 2);
    }

    #[tokio::test]
    async fn test_explain_makes_one_extra_uncached_call() {
        let h = harness(MockClient::new(Provider::Groq), true);
        let options = GenerateOptions {
            explain: true,
            ..GenerateOptions::default()
        };

        let first = h
            .generator
            .generate(Mode::Art, &prompts(&["a cat"]), &options)
            .await;
        assert!(first[0].as_ref().unwrap().explanation.is_some());
        assert_eq!(h.client.calls(), 2);

        // The art is cached, the explanation is not.
        let second = h
            .generator
            .generate(Mode::Art, &prompts(&["a cat"]), &options)
            .await;
        assert!(second[0].as_ref().unwrap().cached);
        assert_eq!(h.client.calls(), 3);
    }

    #[tokio::test]
    async fn test_user_text_reaches_provider() {
        let h = harness(MockClient::new(Provider::Groq), true);
        h.generator
            .generate(Mode::Chart, &prompts(&["  Q1=100, Q2=150  "]), &GenerateOptions::default())
            .await;
        assert_eq!(h.client.last_prompt().as_deref(), Some("Q1=100, Q2=150"));
    }
}
