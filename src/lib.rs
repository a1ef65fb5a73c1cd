//! asciigen - AI-powered ASCII art, chart and diagram generation.
//!
//! This library provides the core of the `ascii-gen` tool:
//!
//! - **Prompt construction** from instruction templates and few-shot examples
//! - **Example loading** from a bundled corpus with bounded in-memory caching
//! - **Rate limiting** of provider calls per rolling time window
//! - **Result caching** on disk, keyed by a fingerprint of the request
//! - **Provider clients** for Gemini and Groq behind one interface
//!
//! # Architecture
//!
//! - [`config`] - Configuration management (API keys, limits, paths)
//! - [`examples_loader`] - Lazy, LRU-bounded few-shot example corpus
//! - [`prompts`] - Instruction templates
//! - [`prompt_builder`] - Template selection and example splicing
//! - [`rate_limiter`] - Per-provider sliding-window call budgets
//! - [`cache`] - Fingerprints and the on-disk content store
//! - [`ai_client`] - Provider-neutral client trait, factory and output cleanup
//! - [`gemini`] / [`groq`] - Concrete provider clients
//! - [`generator`] - The build → fingerprint → cache → call workflow
//! - [`render`] - Terminal output
//! - [`codebase`] - Source-tree listings for architecture diagrams
//! - [`command_router`] - Wires configuration into the core for the CLI
//! - [`providers`] - Shared dependency injection traits
//! - [`http_client`] - HTTP client abstraction
//!
//! # Example
//!
//! ```ignore
//! use asciigen::command_router::CommandRouter;
//! use asciigen::config::Config;
//! use asciigen::generator::GenerateOptions;
//! use asciigen::prompt_builder::Mode;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let router = CommandRouter::new(Config::load()?)?;
//!     let prompts = vec!["Q1=100, Q2=150, Q3=120".to_string()];
//!
//!     // The second identical run is served from the cache.
//!     router.process_prompts(Mode::Chart, &prompts, &GenerateOptions::default()).await?;
//!     router.process_prompts(Mode::Chart, &prompts, &GenerateOptions::default()).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Offline use
//!
//! Set `ASCII_GEN_USE_MOCK=1` to swap in a deterministic mock provider. It
//! still goes through the rate limiter and the cache:
//!
//! ```bash
//! ASCII_GEN_USE_MOCK=1 ascii-gen diagram "login flow" --orientation ltr
//! ```

pub mod ai_client;
pub mod cache;
pub mod codebase;
pub mod command_router;
pub mod config;
pub mod error;
pub mod examples_loader;
pub mod gemini;
pub mod generator;
pub mod groq;
pub mod http_client;
pub mod prompt_builder;
pub mod prompts;
pub mod providers;
pub mod rate_limiter;
pub mod render;
