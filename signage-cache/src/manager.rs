//! The media cache manager.
//!
//! Turns a [`Playlist`] into a [`MaterializedPlaylist`] whose items point at local
//! copies, and keeps the store limited to what the current playlist references.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use futures::stream::{self, StreamExt};
use signage_api::{MaterializedPlaylist, MediaItem, Playlist};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::error::{CacheError, Result};
use crate::fetch::MediaFetcher;
use crate::store::CacheStore;

/// How a URL ended up in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lookup {
    Hit,
    Downloaded,
}

type InFlight = Shared<BoxFuture<'static, std::result::Result<Lookup, Arc<CacheError>>>>;

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    downloads: AtomicU64,
    failures: AtomicU64,
    evicted: AtomicU64,
}

/// Snapshot of cache activity since the manager was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups satisfied by the store without a download
    pub hits: u64,
    /// Completed downloads
    pub downloads: u64,
    /// Lookups that fell back to the remote URL
    pub failures: u64,
    /// Entries removed by eviction
    pub evicted: u64,
}

/// Whether `url` needs to be cached. Only `http` and `https` addresses do.
pub fn is_remote(url: &str) -> bool {
    url::Url::parse(url)
        .map(|parsed| matches!(parsed.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Owns the cache store and every write to it.
pub struct CacheManager {
    store: Arc<dyn CacheStore>,
    fetcher: Arc<dyn MediaFetcher>,
    config: CacheConfig,
    in_flight: DashMap<String, InFlight>,
    // Materialization holds the read side, eviction the write side.
    gate: RwLock<()>,
    counters: Arc<Counters>,
}

impl CacheManager {
    pub fn new(
        store: Arc<dyn CacheStore>,
        fetcher: Arc<dyn MediaFetcher>,
        config: CacheConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            fetcher,
            config,
            in_flight: DashMap::new(),
            gate: RwLock::new(()),
            counters: Arc::new(Counters::default()),
        })
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::SeqCst),
            downloads: self.counters.downloads.load(Ordering::SeqCst),
            failures: self.counters.failures.load(Ordering::SeqCst),
            evicted: self.counters.evicted.load(Ordering::SeqCst),
        }
    }

    /// Make every item of `playlist` locally available.
    ///
    /// Items are processed concurrently up to `max_concurrent_downloads`, but the
    /// output keeps the input order. `on_progress(completed, total)` is called
    /// with `(0, total)` up front and after every item, failed ones included.
    /// An item that cannot be cached keeps its remote URL as `resolved_src`.
    pub async fn materialize<F>(&self, playlist: &Playlist, on_progress: F) -> MaterializedPlaylist
    where
        F: Fn(usize, usize) + Send + Sync,
    {
        let _gate = self.gate.read().await;

        let total = playlist.items.len();
        let completed = AtomicUsize::new(0);
        let completed = &completed;
        let on_progress = &on_progress;
        on_progress(0, total);

        let items = stream::iter(playlist.items.iter().cloned())
            .map(move |item| async move {
                let item = self.resolve_item(item).await;
                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                on_progress(done, total);
                item
            })
            .buffered(self.config.max_concurrent_downloads)
            .collect::<Vec<_>>()
            .await;

        info!(
            playlist = %playlist.id,
            items = total,
            "Materialized playlist"
        );

        MaterializedPlaylist {
            playlist_id: playlist.id.clone(),
            name: playlist.name.clone(),
            updated_at: playlist.updated_at,
            items,
        }
    }

    /// Delete every stored entry not referenced by `playlist`.
    ///
    /// Returns the number of entries removed.
    pub async fn evict_unused(&self, playlist: &MaterializedPlaylist) -> Result<usize> {
        let keep: HashSet<&str> = playlist
            .items
            .iter()
            .map(|item| item.url.as_str())
            .filter(|url| is_remote(url))
            .collect();
        self.evict_except(&keep).await
    }

    /// Delete every stored entry.
    pub async fn evict_all(&self) -> Result<usize> {
        self.evict_except(&HashSet::new()).await
    }

    async fn evict_except(&self, keep: &HashSet<&str>) -> Result<usize> {
        let _gate = self.gate.write().await;

        let mut removed = 0;
        for key in self.store.keys().await? {
            if keep.contains(key.as_str()) {
                continue;
            }
            match self.store.delete(&key).await {
                Ok(true) => {
                    debug!(url = %key, "Evicted cache entry");
                    removed += 1;
                }
                Ok(false) => {}
                Err(e) => warn!(url = %key, error = %e, "Failed to evict cache entry"),
            }
        }

        match self.store.prune_incomplete().await {
            Ok(0) => {}
            Ok(pruned) => debug!(pruned, "Removed incomplete cache entries"),
            Err(e) => warn!(error = %e, "Failed to prune incomplete cache entries"),
        }

        if removed > 0 {
            self.counters
                .evicted
                .fetch_add(removed as u64, Ordering::SeqCst);
            info!(removed, kept = keep.len(), "Evicted unused media");
        }
        Ok(removed)
    }

    async fn resolve_item(&self, mut item: MediaItem) -> MediaItem {
        if !is_remote(&item.url) {
            item.resolved_src = Some(item.url.clone());
            return item;
        }

        match self.ensure_cached(&item.url).await {
            Ok(()) => {
                item.resolved_src = Some(self.store.local_address(&item.url));
            }
            Err(e) => {
                warn!(url = %item.url, error = %e, "Caching failed, falling back to remote URL");
                item.resolved_src = Some(item.url.clone());
            }
        }
        item
    }

    /// Look the URL up in the store, downloading it on a miss. Concurrent calls
    /// for the same URL share one lookup.
    async fn ensure_cached(&self, url: &str) -> std::result::Result<(), Arc<CacheError>> {
        let lookup = self
            .in_flight
            .entry(url.to_string())
            .or_insert_with(|| self.start_lookup(url))
            .value()
            .clone();

        let outcome = lookup.clone().await;
        self.in_flight
            .remove_if(url, |_, pending| pending.ptr_eq(&lookup));
        outcome.map(|_| ())
    }

    fn start_lookup(&self, url: &str) -> InFlight {
        let url = url.to_string();
        let store = Arc::clone(&self.store);
        let fetcher = Arc::clone(&self.fetcher);
        let counters = Arc::clone(&self.counters);

        async move {
            let outcome: Result<Lookup> = async {
                if store.contains(&url).await? {
                    debug!(url = %url, "Cache hit");
                    return Ok(Lookup::Hit);
                }
                let body = fetcher.fetch(&url).await?;
                store.put(&url, body).await?;
                Ok::<_, CacheError>(Lookup::Downloaded)
            }
            .await;

            match outcome {
                Ok(Lookup::Hit) => counters.hits.fetch_add(1, Ordering::SeqCst),
                Ok(Lookup::Downloaded) => counters.downloads.fetch_add(1, Ordering::SeqCst),
                Err(_) => counters.failures.fetch_add(1, Ordering::SeqCst),
            };
            outcome.map_err(Arc::new)
        }
        .boxed()
        .shared()
    }
}
