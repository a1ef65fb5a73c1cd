use crate::ai_client::{Provider, ProviderChoice};
use crate::error::GenError;
use crate::examples_loader::CorpusSource;
use crate::rate_limiter::RateLimit;
use anyhow::{anyhow, Result};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-pro";
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.3-70b-versatile";

/// Per-provider call budgets. Both providers share one window length.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    pub gemini_max_calls: u32,
    pub groq_max_calls: u32,
    pub window_secs: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        // Gemini free tier allows 15 requests per minute.
        Self {
            gemini_max_calls: 15,
            groq_max_calls: 15,
            window_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub groq_api_key: Option<String>,
    pub groq_model: String,
    pub default_provider: ProviderChoice,
    pub cache_enabled: bool,
    pub cache_dir: Option<PathBuf>,
    /// Entries older than this are treated as misses. `None` keeps them forever.
    pub cache_max_age_secs: Option<u64>,
    pub examples_dir: Option<PathBuf>,
    pub max_examples: usize,
    pub example_capacity: usize,
    pub rate_limits: RateLimitSettings,
    pub request_timeout_secs: u64,
    pub use_mock: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            groq_api_key: None,
            groq_model: DEFAULT_GROQ_MODEL.to_string(),
            default_provider: ProviderChoice::Auto,
            cache_enabled: true,
            cache_dir: None,
            cache_max_age_secs: None,
            examples_dir: None,
            max_examples: 2,
            example_capacity: 10,
            rate_limits: RateLimitSettings::default(),
            request_timeout_secs: 60,
            use_mock: false,
        }
    }
}

impl Config {
    /// Load configuration from file, `.env`, and environment variables.
    ///
    /// Environment variables override the config file. A `.env` file in the
    /// working directory only fills in variables that are not already set.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file().unwrap_or_else(|_| {
            info!("No config file found, using defaults");
            Self::default()
        });

        match dotenvy::dotenv() {
            Ok(path) => debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => warn!("Ignoring unreadable .env file: {}", e),
        }

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply environment overrides using the given variable lookup.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("GEMINI_API_KEY") {
            self.gemini_api_key = Some(key);
        }
        if let Some(model) = non_empty("GEMINI_MODEL") {
            self.gemini_model = model;
        }
        if let Some(key) = non_empty("GROQ_API_KEY") {
            self.groq_api_key = Some(key);
        }
        if let Some(model) = non_empty("GROQ_MODEL") {
            self.groq_model = model;
        }
        if let Some(choice) = non_empty("ASCII_GEN_PROVIDER") {
            match choice.parse() {
                Ok(choice) => self.default_provider = choice,
                Err(e) => warn!("Ignoring ASCII_GEN_PROVIDER: {}", e),
            }
        }
        if let Some(flag) = non_empty("ASCII_GEN_CACHE") {
            self.cache_enabled = !matches!(
                flag.trim().to_lowercase().as_str(),
                "0" | "false" | "off" | "no"
            );
        }
        if let Some(dir) = non_empty("ASCII_GEN_CACHE_DIR") {
            self.cache_dir = Some(PathBuf::from(dir));
        }
        if let Some(secs) = non_empty("ASCII_GEN_CACHE_MAX_AGE_SECS") {
            match secs.trim().parse() {
                Ok(secs) => self.cache_max_age_secs = Some(secs),
                Err(_) => warn!("Ignoring non-numeric ASCII_GEN_CACHE_MAX_AGE_SECS: {}", secs),
            }
        }
        if let Some(dir) = non_empty("ASCII_GEN_EXAMPLES_DIR") {
            self.examples_dir = Some(PathBuf::from(dir));
        }
        if let Some(n) = non_empty("GEMINI_RATE_LIMIT") {
            match n.trim().parse() {
                Ok(n) => self.rate_limits.gemini_max_calls = n,
                Err(_) => warn!("Ignoring non-numeric GEMINI_RATE_LIMIT: {}", n),
            }
        }
        if let Some(n) = non_empty("GROQ_RATE_LIMIT") {
            match n.trim().parse() {
                Ok(n) => self.rate_limits.groq_max_calls = n,
                Err(_) => warn!("Ignoring non-numeric GROQ_RATE_LIMIT: {}", n),
            }
        }
        if let Some(secs) = non_empty("ASCII_GEN_RATE_WINDOW_SECS") {
            match secs.trim().parse() {
                Ok(secs) => self.rate_limits.window_secs = secs,
                Err(_) => warn!("Ignoring non-numeric ASCII_GEN_RATE_WINDOW_SECS: {}", secs),
            }
        }
        if let Some(flag) = lookup("ASCII_GEN_USE_MOCK") {
            self.use_mock = !matches!(flag.trim().to_lowercase().as_str(), "0" | "false" | "off");
        }
    }

    /// Reject settings the core cannot run with. Called once at startup.
    pub fn validate(&self) -> Result<(), GenError> {
        let limits = &self.rate_limits;
        if limits.gemini_max_calls == 0 || limits.groq_max_calls == 0 {
            return Err(GenError::Configuration(
                "rate limit max calls must be at least 1".to_string(),
            ));
        }
        if limits.window_secs == 0 {
            return Err(GenError::Configuration(
                "rate limit window must be at least 1 second".to_string(),
            ));
        }
        if self.example_capacity == 0 {
            return Err(GenError::Configuration(
                "example_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn rate_limit_for(&self, provider: Provider) -> RateLimit {
        let max_calls = match provider {
            Provider::Gemini => self.rate_limits.gemini_max_calls,
            Provider::Groq => self.rate_limits.groq_max_calls,
        };
        RateLimit {
            max_calls,
            window: Duration::from_secs(self.rate_limits.window_secs),
        }
    }

    pub fn api_key(&self, provider: Provider) -> Option<&str> {
        match provider {
            Provider::Gemini => self.gemini_api_key.as_deref(),
            Provider::Groq => self.groq_api_key.as_deref(),
        }
    }

    pub fn model(&self, provider: Provider) -> &str {
        match provider {
            Provider::Gemini => &self.gemini_model,
            Provider::Groq => &self.groq_model,
        }
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(Self::get_config_dir()?.join("cache")),
        }
    }

    /// The configured examples directory, or the corpus built into the binary.
    pub fn corpus_source(&self) -> CorpusSource {
        match &self.examples_dir {
            Some(dir) => CorpusSource::Dir(dir.clone()),
            None => CorpusSource::Bundled,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn load_from_file() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        if config_path.exists() {
            let content = fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            info!("Loaded config from: {}", config_path.display());
            Ok(config)
        } else {
            Err(anyhow!("Config file not found"))
        }
    }

    fn get_config_path() -> Result<PathBuf> {
        Ok(Self::get_config_dir()?.join("config.toml"))
    }

    pub fn get_config_dir() -> Result<PathBuf> {
        let home = home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;
        Ok(home.join(".ascii-gen"))
    }

    pub fn show_config_info(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;
        println!("Configuration file: {}", config_path.display());
        println!(
            "Status: {}",
            if config_path.exists() { "Found" } else { "Not found (using defaults)" }
        );
        println!();
        println!("Gemini API key: {}", mask_key(self.gemini_api_key.as_deref()));
        println!("Gemini model:   {}", self.gemini_model);
        println!("Groq API key:   {}", mask_key(self.groq_api_key.as_deref()));
        println!("Groq model:     {}", self.groq_model);
        println!("Provider:       {}", self.default_provider);
        println!(
            "Cache:          {} ({})",
            if self.cache_enabled { "enabled" } else { "disabled" },
            self.cache_dir()?.display()
        );
        println!("Examples:       {}", self.corpus_source());
        println!(
            "Rate limits:    gemini {}/{}s, groq {}/{}s",
            self.rate_limits.gemini_max_calls,
            self.rate_limits.window_secs,
            self.rate_limits.groq_max_calls,
            self.rate_limits.window_secs
        );
        if self.use_mock {
            println!("Mock mode:      on");
        }

        println!("\nTo set API keys, add them to .env or export them:");
        println!("  export GEMINI_API_KEY=<your-key>");
        println!("  export GROQ_API_KEY=<your-key>");

        Ok(())
    }
}

fn mask_key(key: Option<&str>) -> String {
    match key {
        None => "Not set".to_string(),
        Some(k) if k.chars().count() <= 8 => "Set".to_string(),
        Some(k) => {
            let head: String = k.chars().take(4).collect();
            let tail: String = k.chars().skip(k.chars().count() - 4).collect();
            format!("{}…{}", head, tail)
        }
    }
}
