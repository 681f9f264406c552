//! Content-addressed finding cache.
//!
//! Maps `(file-content-hash, ruleset-id)` to the findings the analyzer
//! produced for exactly those bytes under exactly that ruleset. Hits are
//! exact; there is no TTL and no eviction. Two workers racing on the same
//! miss may both consult the analyzer, but the analyzer is deterministic for
//! identical input, so the second write is an idempotent no-op.
//!
//! The hash is computed from the file bytes on disk in the worktree, never
//! from git's object id. This keeps keys valid across git object-format
//! quirks and line-ending filters, and makes renames free: same bytes, same
//! key, regardless of path or commit.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::analyzer::protocol::Finding;
use crate::core::errors::{MinerError, MinerResultExt, Result};
use crate::io::persist;

/// Number of raw hash bytes kept for a content hash (128 bits).
const CONTENT_HASH_BYTES: usize = 16;

/// Cache key: content hash of the file bytes plus the ruleset identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    /// 128-bit content hash of the file bytes, lowercase hex.
    pub content_hash: String,
    /// 128-bit content hash of the ruleset XML bytes, lowercase hex.
    pub ruleset_id: String,
}

impl CacheKey {
    /// Build a key from an already-computed content hash and ruleset id.
    pub fn new(content_hash: impl Into<String>, ruleset_id: impl Into<String>) -> Self {
        Self {
            content_hash: content_hash.into(),
            ruleset_id: ruleset_id.into(),
        }
    }
}

/// SHA-256 of `bytes`, truncated to 128 bits, lowercase hex.
pub fn content_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(CONTENT_HASH_BYTES * 2);
    for byte in &digest[..CONTENT_HASH_BYTES] {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Content hash of a file's bytes on disk.
pub fn hash_file(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_io_err(&format!("Failed to read file: {}", path.display()))?;
    Ok(content_hash(&bytes))
}

/// Thread-safe content-addressed map from [`CacheKey`] to findings.
///
/// Writes are serialized per key by the underlying concurrent map, and the
/// write-once discipline means a hit can never observe stale data.
#[derive(Debug, Default)]
pub struct FileHashCache {
    entries: DashMap<CacheKey, Arc<Vec<Finding>>>,
}

/// Serialized form of the cache for `cache.bin`.
#[derive(Serialize, Deserialize)]
struct PersistedCache {
    version: u32,
    entries: Vec<(CacheKey, Vec<Finding>)>,
}

const CACHE_FORMAT_VERSION: u32 = 1;

impl FileHashCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the findings for a key. `None` means the file must be
    /// analyzed.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<Vec<Finding>>> {
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Store findings for a key. The first write wins; later writes for the
    /// same key are dropped (values are byte-equal by construction).
    pub fn put(&self, key: CacheKey, findings: Vec<Finding>) {
        self.entries.entry(key).or_insert_with(|| Arc::new(findings));
    }

    /// Number of cached keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load a cache persisted by a previous run.
    ///
    /// A missing file yields an empty cache silently. An unreadable or
    /// undecodable file is discarded with a single warning and the run
    /// continues with an empty cache.
    pub fn load(path: &Path) -> Self {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No persisted cache at {}", path.display());
                return Self::new();
            }
            Err(e) => {
                warn!(
                    "Cache file {} unreadable ({e}); continuing with empty cache",
                    path.display()
                );
                return Self::new();
            }
        };

        let persisted: PersistedCache = match bincode::deserialize(&bytes) {
            Ok(persisted) => persisted,
            Err(e) => {
                warn!(
                    "Cache file {} corrupt ({e}); continuing with empty cache",
                    path.display()
                );
                return Self::new();
            }
        };

        if persisted.version != CACHE_FORMAT_VERSION {
            warn!(
                "Cache file {} has unsupported version {}; continuing with empty cache",
                path.display(),
                persisted.version
            );
            return Self::new();
        }

        let cache = Self::new();
        for (key, findings) in persisted.entries {
            cache.put(key, findings);
        }
        info!("Loaded {} cached file results from {}", cache.len(), path.display());
        cache
    }

    /// Persist the cache atomically. Entries are sorted by key so identical
    /// cache contents produce identical bytes.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut entries: Vec<(CacheKey, Vec<Finding>)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().as_ref().clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let persisted = PersistedCache {
            version: CACHE_FORMAT_VERSION,
            entries,
        };
        let bytes = bincode::serialize(&persisted)
            .map_err(|e| MinerError::serialization("cache serialization", e))?;

        persist::write_bytes_atomic(path, &bytes)?;
        debug!("Persisted {} cache entries to {}", self.len(), path.display());
        Ok(())
    }
}
