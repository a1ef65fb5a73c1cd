use crate::ai_client::Provider;
use crate::error::GenError;
use crate::prompt_builder::{Mode, PromptOptions};
use crate::providers::TimeProvider;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::Builder;
use tracing::{debug, info, warn};

/// Bumped whenever the fingerprint input layout changes.
const FINGERPRINT_VERSION: &str = "v1";
const TEMP_PREFIX: &str = ".entry";
const TEMP_SUFFIX: &str = ".tmp";

/// Cache key: SHA-256 of the normalized request, as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Accepts only strings that could have come from [`fingerprint`].
    pub fn parse(s: &str) -> Option<Self> {
        let valid = s.len() == 64 && s.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase());
        valid.then(|| Self(s.to_string()))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lower-case, trim and collapse inner whitespace runs to single spaces.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Stable hash of a request.
///
/// Options are keyed by field name in sorted order, so two option sets that
/// compare equal always hash equal.
pub fn fingerprint(
    mode: Mode,
    user_text: &str,
    options: &PromptOptions,
    provider: Provider,
    model: &str,
) -> Fingerprint {
    let options: BTreeMap<String, Value> = serde_json::to_value(options)
        .and_then(serde_json::from_value)
        .unwrap_or_default();
    let options = serde_json::to_string(&options).unwrap_or_default();
    let text = normalize_text(user_text);

    let mut hasher = Sha256::new();
    for field in [
        FINGERPRINT_VERSION,
        mode.as_str(),
        text.as_str(),
        options.as_str(),
        provider.as_str(),
        model,
    ] {
        // Length prefix keeps field boundaries unambiguous.
        hasher.update((field.len() as u64).to_le_bytes());
        hasher.update(field.as_bytes());
    }
    Fingerprint(format!("{:x}", hasher.finalize()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub output: String,
    pub created_at: u64,
    pub provider: Provider,
    pub model: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub total_bytes: u64,
    pub oldest: Option<u64>,
    pub newest: Option<u64>,
}

/// Fingerprint-addressed storage for generated output.
///
/// `get` never fails: unreadable entries are misses. `put` never fails the
/// caller: a write that cannot complete is logged and dropped.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn get(&self, fingerprint: &Fingerprint) -> Option<CacheEntry>;

    async fn put(&self, entry: CacheEntry);

    /// Remove every entry, returning how many were deleted.
    async fn clear(&self) -> Result<usize, GenError>;
}

/// One JSON file per fingerprint under a directory.
///
/// Writes go to a temporary file in the same directory and are renamed into
/// place, so concurrent readers in other processes never see a partial entry.
pub struct DiskCache {
    dir: Option<PathBuf>,
    max_age_secs: Option<u64>,
    clock: Arc<dyn TimeProvider>,
}

impl DiskCache {
    pub fn new(dir: impl Into<PathBuf>, max_age_secs: Option<u64>, clock: Arc<dyn TimeProvider>) -> Self {
        let dir = dir.into();
        info!("Cache initialized at {:?}", dir);
        Self {
            dir: Some(dir),
            max_age_secs,
            clock,
        }
    }

    /// A cache that always misses and stores nothing.
    pub fn disabled(clock: Arc<dyn TimeProvider>) -> Self {
        debug!("Cache disabled");
        Self {
            dir: None,
            max_age_secs: None,
            clock,
        }
    }

    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats::default();
        for path in self.entry_paths() {
            let Ok(entry) = read_entry(&path) else {
                continue;
            };
            stats.entries += 1;
            stats.total_bytes += fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            stats.oldest = Some(stats.oldest.map_or(entry.created_at, |t| t.min(entry.created_at)));
            stats.newest = Some(stats.newest.map_or(entry.created_at, |t| t.max(entry.created_at)));
        }
        stats
    }

    /// Delete expired and unreadable entries, returning how many were removed.
    pub fn prune(&self) -> usize {
        let mut removed = 0;
        for path in self.entry_paths() {
            let stale = match read_entry(&path) {
                Ok(entry) => self.is_expired(&entry),
                Err(_) => true,
            };
            if stale && fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }
        if removed > 0 {
            info!("Pruned {} cache entries", removed);
        }
        removed
    }

    fn is_expired(&self, entry: &CacheEntry) -> bool {
        match self.max_age_secs {
            Some(max_age) => self.clock.now().saturating_sub(entry.created_at) > max_age,
            None => false,
        }
    }

    fn entry_path(dir: &Path, fingerprint: &Fingerprint) -> PathBuf {
        dir.join(format!("{}.json", fingerprint))
    }

    fn files(&self) -> Vec<PathBuf> {
        let Some(dir) = &self.dir else {
            return Vec::new();
        };
        let Ok(read_dir) = fs::read_dir(dir) else {
            return Vec::new();
        };
        read_dir.filter_map(|e| e.ok()).map(|e| e.path()).collect()
    }

    fn entry_paths(&self) -> Vec<PathBuf> {
        self.files()
            .into_iter()
            .filter(|p| {
                p.extension().is_some_and(|ext| ext == "json")
                    && p.file_stem()
                        .and_then(|s| s.to_str())
                        .and_then(Fingerprint::parse)
                        .is_some()
            })
            .collect()
    }

    /// Temp files left behind by a write that never reached `persist`.
    fn orphaned_temp_paths(&self) -> Vec<PathBuf> {
        self.files()
            .into_iter()
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(TEMP_PREFIX) && n.ends_with(TEMP_SUFFIX))
            })
            .collect()
    }

    fn write_atomic(dir: &Path, path: &Path, contents: &[u8]) -> Result<(), GenError> {
        let io_error = |source| GenError::CacheIo {
            path: path.to_path_buf(),
            source,
        };
        fs::create_dir_all(dir).map_err(io_error)?;
        let mut temp_file = Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(TEMP_SUFFIX)
            .tempfile_in(dir)
            .map_err(io_error)?;
        temp_file.write_all(contents).map_err(io_error)?;
        temp_file.as_file_mut().sync_all().map_err(io_error)?;
        temp_file.persist(path).map_err(|e| io_error(e.error))?;
        Ok(())
    }
}

/// Remove `path`, treating an already missing file as done.
fn remove_if_present(path: &Path) -> Result<bool, GenError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(GenError::CacheIo {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn read_entry(path: &Path) -> Result<CacheEntry, GenError> {
    let content = fs::read_to_string(path).map_err(|source| GenError::CacheIo {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|e| GenError::CacheIo {
        path: path.to_path_buf(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
    })
}

#[async_trait]
impl ContentStore for DiskCache {
    async fn get(&self, fingerprint: &Fingerprint) -> Option<CacheEntry> {
        let dir = self.dir.as_ref()?;
        let path = Self::entry_path(dir, fingerprint);
        if !path.exists() {
            return None;
        }

        let entry = match read_entry(&path) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Treating unreadable cache entry as a miss: {}", e);
                return None;
            }
        };
        if entry.fingerprint != *fingerprint {
            warn!("Cache entry at {:?} does not match its file name", path);
            return None;
        }
        if self.is_expired(&entry) {
            debug!("Cache entry {} has expired", fingerprint);
            return None;
        }

        debug!("Cache hit for {}", fingerprint);
        Some(entry)
    }

    async fn put(&self, entry: CacheEntry) {
        let Some(dir) = &self.dir else {
            return;
        };
        let path = Self::entry_path(dir, &entry.fingerprint);
        let content = match serde_json::to_vec_pretty(&entry) {
            Ok(content) => content,
            Err(e) => {
                warn!("Could not serialize cache entry {}: {}", entry.fingerprint, e);
                return;
            }
        };

        match Self::write_atomic(dir, &path, &content) {
            Ok(()) => info!("Stored cache entry {} from {}", entry.fingerprint, entry.provider),
            Err(e) => warn!("Failed to write cache entry: {}", e),
        }
    }

    async fn clear(&self) -> Result<usize, GenError> {
        let mut removed = 0;
        for path in self.entry_paths() {
            if remove_if_present(&path)? {
                removed += 1;
            }
        }
        for path in self.orphaned_temp_paths() {
            if remove_if_present(&path)? {
                debug!("Removed orphaned temp file {}", path.display());
            }
        }
        info!("Cache cleared ({} entries)", removed);
        Ok(removed)
    }
}
