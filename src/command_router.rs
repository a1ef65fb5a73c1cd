use crate::{
    ai_client::{ClientFactory, ProviderChoice},
    cache::{ContentStore, DiskCache},
    codebase,
    config::Config,
    error::GenError,
    examples_loader::ExampleLoader,
    generator::{GenerateOptions, GenerationOutcome, Generator},
    prompt_builder::{Mode, PromptBuilder},
    providers::{SystemTimeProvider, TimeProvider},
    rate_limiter::RateLimiters,
    render::Renderer,
};
use anyhow::Result;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Wires configuration into the core and routes each CLI command to it.
pub struct CommandRouter {
    config: Config,
    limiters: Arc<RateLimiters>,
    builder: Arc<PromptBuilder>,
    clock: Arc<dyn TimeProvider>,
}

impl CommandRouter {
    pub fn new(config: Config) -> Result<Self, GenError> {
        config.validate()?;
        let limiters = Arc::new(RateLimiters::from_config(&config)?);
        let loader = Arc::new(ExampleLoader::with_source(
            config.corpus_source(),
            config.example_capacity,
        ));
        let builder = Arc::new(PromptBuilder::new(loader, config.max_examples));
        Ok(Self {
            config,
            limiters,
            builder,
            clock: Arc::new(SystemTimeProvider),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn disk_cache(&self) -> Result<DiskCache> {
        Ok(DiskCache::new(
            self.config.cache_dir()?,
            self.config.cache_max_age_secs,
            Arc::clone(&self.clock),
        ))
    }

    fn store(&self, no_cache: bool) -> Result<Arc<dyn ContentStore>> {
        if no_cache || !self.config.cache_enabled {
            return Ok(Arc::new(DiskCache::disabled(Arc::clone(&self.clock))));
        }
        Ok(Arc::new(self.disk_cache()?))
    }

    fn generator(&self, options: &GenerateOptions) -> Result<Generator> {
        let factory = ClientFactory::new(self.config.clone(), Arc::clone(&self.limiters));
        let choice = match options.provider {
            ProviderChoice::Auto => self.config.default_provider,
            explicit => explicit,
        };
        let client = factory.create(choice)?;
        Ok(Generator::new(
            Arc::clone(&self.builder),
            self.store(options.no_cache)?,
            client,
            Arc::clone(&self.clock),
        ))
    }

    /// Generate and print every prompt.
    ///
    /// Fails only when every prompt failed, with the first failure.
    pub async fn process_prompts(
        &self,
        mode: Mode,
        prompts: &[String],
        options: &GenerateOptions,
    ) -> Result<()> {
        if prompts.is_empty() {
            return Err(GenError::Configuration("at least one prompt is required".to_string()).into());
        }
        let generator = self.generator(options)?;
        info!(
            "Generating {} {} result(s) with {}",
            prompts.len(),
            mode,
            generator.client().provider()
        );

        let renderer = Renderer::new(options.colors, options.live);
        let results = generator.generate(mode, prompts, options).await;

        let mut stdout = io::stdout();
        let mut stderr = io::stderr();
        let mut first_error = None;
        let mut succeeded = 0;
        for (prompt, result) in prompts.iter().zip(results) {
            match result {
                Ok(outcome) => {
                    renderer.render(&mut stdout, mode, &outcome).await?;
                    succeeded += 1;
                }
                Err(e) => {
                    renderer.render_error(&mut stderr, prompt, &e)?;
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) if succeeded == 0 => Err(e.into()),
            _ => Ok(()),
        }
    }

    /// Draw an architecture diagram of the source tree under `root`.
    pub async fn process_codebase(&self, root: &Path, options: &GenerateOptions) -> Result<()> {
        let listing = codebase::scan(root, options.max_files)?;
        if listing.files.is_empty() {
            warn!("No source files found under {}", root.display());
            println!("No source files found under {}", root.display());
            return Ok(());
        }

        let generator = self.generator(options)?;
        let outcome = generator
            .generate_one(Mode::Diagram, &listing.describe(), &options.prompt_options(true))
            .await?;

        // The full listing is the prompt; title the result with the path instead.
        let outcome = GenerationOutcome {
            prompt: root.display().to_string(),
            ..outcome
        };
        let renderer = Renderer::new(options.colors, options.live);
        renderer.render(&mut io::stdout(), Mode::Diagram, &outcome).await?;
        Ok(())
    }

    pub async fn clear_cache(&self) -> Result<()> {
        let cache = self.disk_cache()?;
        let removed = cache.clear().await?;
        println!("Removed {} cached result(s) from {}", removed, self.config.cache_dir()?.display());
        Ok(())
    }

    pub fn show_cache_stats(&self) -> Result<()> {
        let cache = self.disk_cache()?;
        let pruned = cache.prune();
        let stats = cache.stats();
        let mut out = io::stdout();
        writeln!(out, "Cache directory: {}", self.config.cache_dir()?.display())?;
        writeln!(
            out,
            "Status:          {}",
            if self.config.cache_enabled { "enabled" } else { "disabled" }
        )?;
        writeln!(out, "Entries:         {}", stats.entries)?;
        writeln!(out, "Size:            {} bytes", stats.total_bytes)?;
        if let (Some(oldest), Some(newest)) = (stats.oldest, stats.newest) {
            let now = self.clock.now();
            writeln!(
                out,
                "Age:             newest {}s, oldest {}s",
                now.saturating_sub(newest),
                now.saturating_sub(oldest)
            )?;
        }
        if pruned > 0 {
            writeln!(out, "Pruned:          {} expired or unreadable", pruned)?;
        }
        Ok(())
    }
}
