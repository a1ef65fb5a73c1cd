//! Lazy, bounded access to the few-shot example corpus.
//!
//! The corpus is a directory of JSON files, one per category:
//!
//! ```json
//! { "examples": [ { "prompt": "a cat", "output": " /\\_/\\ " } ] }
//! ```
//!
//! An optional `index.json` maps keywords to categories and categories to
//! files, which lets an art request like "an elephant" find `elephant.json`:
//!
//! ```json
//! { "keywords": { "elephants": "elephant" }, "categories": { "elephant": "animals/elephant.json" } }
//! ```
//!
//! A category's file is read on its first request and kept in an LRU map
//! holding at most `capacity` categories.
//!
//! The corpus under `corpus/` is compiled into the binary, so an installed
//! `ascii-gen` has examples without any files next to it. A directory on disk
//! replaces it when one is configured.

use crate::error::GenError;
use lru::LruCache;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use tracing::{debug, info, warn};

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "of", "in", "on", "at", "for", "with", "and", "or",
];

const BUNDLED_CORPUS: &[(&str, &str)] = &[
    ("index.json", include_str!("../corpus/index.json")),
    ("art.json", include_str!("../corpus/art.json")),
    ("logo.json", include_str!("../corpus/logo.json")),
    ("chart.json", include_str!("../corpus/chart.json")),
    ("diagram.json", include_str!("../corpus/diagram.json")),
    ("codebase.json", include_str!("../corpus/codebase.json")),
    ("animals/cat.json", include_str!("../corpus/animals/cat.json")),
    ("animals/dog.json", include_str!("../corpus/animals/dog.json")),
    ("animals/elephant.json", include_str!("../corpus/animals/elephant.json")),
    ("objects/house.json", include_str!("../corpus/objects/house.json")),
    ("objects/tree.json", include_str!("../corpus/objects/tree.json")),
];

/// Where category files are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorpusSource {
    Dir(PathBuf),
    Bundled,
}

impl CorpusSource {
    fn read(&self, relative: &str) -> io::Result<String> {
        match self {
            CorpusSource::Dir(dir) => fs::read_to_string(dir.join(relative)),
            CorpusSource::Bundled => BUNDLED_CORPUS
                .iter()
                .find(|(name, _)| *name == relative)
                .map(|(_, content)| content.to_string())
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "not in the built-in corpus")),
        }
    }
}

impl fmt::Display for CorpusSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorpusSource::Dir(dir) => write!(f, "{}", dir.display()),
            CorpusSource::Bundled => f.write_str("built-in corpus"),
        }
    }
}

/// One worked input/output pair.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Example {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub prompt: String,
    #[serde(alias = "art")]
    pub output: String,
}

#[derive(Debug, Deserialize)]
struct CategoryFile {
    #[serde(default)]
    examples: Vec<Example>,
}

#[derive(Debug, Default, Deserialize)]
struct CorpusIndex {
    #[serde(default)]
    keywords: HashMap<String, String>,
    #[serde(default)]
    categories: HashMap<String, String>,
}

pub struct ExampleLoader {
    source: CorpusSource,
    index: OnceLock<CorpusIndex>,
    cache: Mutex<LruCache<String, Arc<Vec<Example>>>>,
    loads: AtomicUsize,
}

impl ExampleLoader {
    /// Loader over a corpus directory on disk.
    pub fn new(examples_dir: impl Into<PathBuf>, capacity: usize) -> Self {
        Self::with_source(CorpusSource::Dir(examples_dir.into()), capacity)
    }

    pub fn with_source(source: CorpusSource, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            source,
            index: OnceLock::new(),
            cache: Mutex::new(LruCache::new(capacity)),
            loads: AtomicUsize::new(0),
        }
    }

    /// Up to `limit` examples for `category`, in corpus order.
    ///
    /// Reads the category from disk on first use. A missing or malformed file
    /// yields an empty list and a warning; nothing is cached in that case.
    pub fn get_examples(&self, category: &str, limit: usize) -> Vec<Example> {
        if limit == 0 {
            return Vec::new();
        }
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(examples) = cache.get(category) {
            debug!("Examples for '{}' served from memory", category);
            return examples.iter().take(limit).cloned().collect();
        }

        let examples = match self.load_category(category) {
            Ok(examples) if !examples.is_empty() => Arc::new(examples),
            Ok(_) => {
                debug!("No examples found for '{}'", category);
                return Vec::new();
            }
            Err(e) => {
                warn!("{}", e);
                return Vec::new();
            }
        };

        let selected = examples.iter().take(limit).cloned().collect();
        if let Some((evicted, _)) = cache.push(category.to_string(), examples) {
            if evicted != category {
                debug!("Evicted examples for '{}'", evicted);
            }
        }
        selected
    }

    /// Resolve a free-text subject ("an elephant") to a corpus category.
    pub fn match_subject(&self, query: &str) -> Option<String> {
        let index = self.index();
        let query = query.trim().to_lowercase();
        let words: Vec<&str> = query
            .split_whitespace()
            .map(|w| w.trim_matches(|c: char| ".,!?;:".contains(c)))
            .filter(|w| !w.is_empty() && !STOP_WORDS.contains(w))
            .collect();

        if let Some(category) = words.iter().find_map(|w| index.keywords.get(*w)) {
            return Some(category.clone());
        }
        if let Some(category) = index.keywords.get(query.as_str()) {
            return Some(category.clone());
        }
        if let Some(word) = words.iter().find(|w| index.categories.contains_key(**w)) {
            return Some(word.to_string());
        }

        // Inflected forms ("elephants", "kittens") only. Longest keyword wins,
        // ties broken by name so map iteration order does not matter.
        let mut keywords: Vec<(&String, &String)> = index.keywords.iter().collect();
        keywords.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.cmp(b)));
        words.iter().find_map(|word| {
            keywords
                .iter()
                .find(|(keyword, _)| is_inflection_of(word, keyword))
                .map(|(_, category)| (*category).clone())
        })
    }

    /// Drop a category from memory. Returns whether it was held.
    pub fn evict(&self, category: &str) -> bool {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.pop(category).is_some()
    }

    /// Whether a category is currently held in memory. Does not bump recency.
    pub fn is_cached(&self, category: &str) -> bool {
        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.contains(category)
    }

    pub fn cached_categories(&self) -> usize {
        let cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.len()
    }

    /// Number of category files read from disk so far.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    fn index(&self) -> &CorpusIndex {
        self.index.get_or_init(|| match self.source.read("index.json") {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!("Ignoring malformed example index in {}: {}", self.source, e);
                CorpusIndex::default()
            }),
            Err(_) => {
                debug!("No example index in {}", self.source);
                CorpusIndex::default()
            }
        })
    }

    /// Corpus-relative file holding `category`.
    fn category_file(&self, category: &str) -> Result<String, GenError> {
        let valid = !category.is_empty()
            && category
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(GenError::ExampleLoad {
                category: category.to_string(),
                reason: "invalid category name".to_string(),
            });
        }
        Ok(self
            .index()
            .categories
            .get(category)
            .cloned()
            .unwrap_or_else(|| format!("{}.json", category)))
    }

    fn load_category(&self, category: &str) -> Result<Vec<Example>, GenError> {
        let file_name = self.category_file(category)?;
        let load_error = |reason: String| GenError::ExampleLoad {
            category: category.to_string(),
            reason,
        };

        let content = self
            .source
            .read(&file_name)
            .map_err(|e| load_error(format!("{} in {}: {}", file_name, self.source, e)))?;
        self.loads.fetch_add(1, Ordering::SeqCst);
        let file: CategoryFile = serde_json::from_str(&content)
            .map_err(|e| load_error(format!("{} in {}: {}", file_name, self.source, e)))?;

        let examples: Vec<Example> = file
            .examples
            .into_iter()
            .filter(|e| !e.output.trim().is_empty())
            .map(|mut e| {
                e.category = category.to_string();
                e
            })
            .collect();
        info!("Loaded {} examples for '{}'", examples.len(), category);
        Ok(examples)
    }
}

/// `word` is `keyword` plus a plural or possessive suffix.
fn is_inflection_of(word: &str, keyword: &str) -> bool {
    match word.strip_prefix(keyword) {
        Some(suffix) => matches!(suffix, "s" | "es" | "'s" | "s'"),
        None => false,
    }
}
