//! Keyed blob stores backing the media cache.
//!
//! Keys are absolute media URLs. A store only holds bytes and hands out a local
//! address the playback surface can load; deciding what to keep is the
//! [`CacheManager`](crate::CacheManager)'s job.

use std::collections::{HashMap, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{CacheError, Result};

/// Storage backend for cached media.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Whether a blob is stored under `url`.
    async fn contains(&self, url: &str) -> Result<bool>;

    /// Store `bytes` under `url`, replacing any previous blob.
    async fn put(&self, url: &str, bytes: Bytes) -> Result<()>;

    /// Every key currently stored.
    async fn keys(&self) -> Result<Vec<String>>;

    /// Remove the blob for `url`. Returns whether anything was removed.
    async fn delete(&self, url: &str) -> Result<bool>;

    /// The address the playback surface should load for a stored `url`.
    fn local_address(&self, url: &str) -> String;

    /// Remove leftovers of interrupted writes that [`keys`](CacheStore::keys)
    /// cannot see. Returns how many were removed.
    async fn prune_incomplete(&self) -> Result<usize> {
        Ok(0)
    }
}

/// Hex-encoded SHA-256 of a URL, used to name stored blobs.
pub fn url_digest(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

// ============================================================================
// In-memory store
// ============================================================================

/// Store that keeps blobs in process memory, optionally bounded by a byte quota.
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<String, Bytes>>,
    quota: Option<u64>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse writes that would push the total size past `bytes`.
    pub fn with_quota(bytes: u64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            quota: Some(bytes),
        }
    }

    /// Sum of all stored blob sizes.
    pub fn total_bytes(&self) -> u64 {
        self.entries
            .lock()
            .values()
            .map(|bytes| bytes.len() as u64)
            .sum()
    }

    /// Stored bytes for `url`.
    pub fn get(&self, url: &str) -> Option<Bytes> {
        self.entries.lock().get(url).cloned()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn contains(&self, url: &str) -> Result<bool> {
        Ok(self.entries.lock().contains_key(url))
    }

    async fn put(&self, url: &str, bytes: Bytes) -> Result<()> {
        let mut entries = self.entries.lock();
        if let Some(quota) = self.quota {
            let used: u64 = entries
                .iter()
                .filter(|(key, _)| key.as_str() != url)
                .map(|(_, blob)| blob.len() as u64)
                .sum();
            let available = quota.saturating_sub(used);
            let needed = bytes.len() as u64;
            if needed > available {
                return Err(CacheError::QuotaExceeded { needed, available });
            }
        }
        entries.insert(url.to_string(), bytes);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.lock().keys().cloned().collect())
    }

    async fn delete(&self, url: &str) -> Result<bool> {
        Ok(self.entries.lock().remove(url).is_some())
    }

    fn local_address(&self, url: &str) -> String {
        format!("memory://{}", url_digest(url))
    }
}

// ============================================================================
// Disk store
// ============================================================================

const KEY_SUFFIX: &str = "url";
const PARTIAL_SUFFIX: &str = "part";

/// Store that keeps one file per URL under a directory.
///
/// A `<digest>.url` sidecar recording the key is written first, then the blob
/// is written to `<digest>.part` and renamed to `<digest>`. Only complete
/// blob and sidecar pairs are listed by [`keys`](CacheStore::keys). Anything
/// else in the directory is debris from an interrupted write and is removed by
/// [`prune_incomplete`](CacheStore::prune_incomplete), which also runs on open.
pub struct DiskCacheStore {
    root: PathBuf,
}

impl DiskCacheStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        let store = Self { root };
        let pruned = store.prune_incomplete().await?;
        if pruned > 0 {
            info!(root = %store.root.display(), pruned, "Removed incomplete cache files");
        }
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, url: &str) -> PathBuf {
        self.root.join(url_digest(url))
    }

    fn sibling(&self, url: &str, suffix: &str) -> PathBuf {
        self.root.join(format!("{}.{}", url_digest(url), suffix))
    }
}

async fn remove_if_exists(path: &Path) -> Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl CacheStore for DiskCacheStore {
    async fn contains(&self, url: &str) -> Result<bool> {
        let blob = tokio::fs::try_exists(self.blob_path(url)).await?;
        let key = tokio::fs::try_exists(self.sibling(url, KEY_SUFFIX)).await?;
        Ok(blob && key)
    }

    async fn put(&self, url: &str, bytes: Bytes) -> Result<()> {
        let key_partial = self
            .root
            .join(format!("{}.{}.{}", url_digest(url), KEY_SUFFIX, PARTIAL_SUFFIX));
        tokio::fs::write(&key_partial, url.as_bytes()).await?;
        tokio::fs::rename(&key_partial, self.sibling(url, KEY_SUFFIX)).await?;

        let partial = self.sibling(url, PARTIAL_SUFFIX);
        tokio::fs::write(&partial, &bytes).await?;
        tokio::fs::rename(&partial, self.blob_path(url)).await?;

        debug!(url, bytes = bytes.len(), "Stored media on disk");
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.root).await?;

        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(KEY_SUFFIX) {
                continue;
            }
            let key = match tokio::fs::read_to_string(&path).await {
                Ok(key) => key,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable cache key");
                    continue;
                }
            };
            if tokio::fs::try_exists(self.blob_path(&key)).await? {
                keys.push(key);
            }
        }

        Ok(keys)
    }

    async fn delete(&self, url: &str) -> Result<bool> {
        let blob = remove_if_exists(&self.blob_path(url)).await?;
        let key = remove_if_exists(&self.sibling(url, KEY_SUFFIX)).await?;
        Ok(blob || key)
    }

    async fn prune_incomplete(&self) -> Result<usize> {
        let mut names = HashSet::new();
        let mut dir = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.insert(name.to_string());
            }
        }

        let mut removed = 0;
        for name in &names {
            // A blob is `<digest>`, its sidecar `<digest>.url`; each needs the other.
            let complete = match name.split_once('.') {
                None => names.contains(&format!("{}.{}", name, KEY_SUFFIX)),
                Some((digest, KEY_SUFFIX)) => names.contains(digest),
                Some(_) => false,
            };
            if complete {
                continue;
            }
            if remove_if_exists(&self.root.join(name)).await? {
                debug!(file = %name, "Removed incomplete cache file");
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn local_address(&self, url: &str) -> String {
        let path = self.blob_path(url);
        url::Url::from_file_path(&path)
            .map(|address| address.to_string())
            .unwrap_or_else(|()| format!("file://{}", path.display()))
    }
}
