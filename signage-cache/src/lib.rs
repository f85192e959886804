//! # signage-cache
//!
//! URL-keyed local media cache.
//!
//! [`CacheManager::materialize`] walks a playlist, serves each remote item from a
//! [`CacheStore`] or downloads it through a [`MediaFetcher`], and returns the
//! playlist with `resolved_src` filled in. Downloads for the same URL are
//! collapsed into one, and a failed item falls back to its remote URL instead of
//! failing the playlist. [`CacheManager::evict_unused`] then drops everything the
//! new playlist no longer references.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use signage_cache::{CacheConfig, CacheManager, DiskCacheStore, HttpFetcher};
//!
//! # async fn run(playlist: signage_api::Playlist) -> Result<(), signage_cache::CacheError> {
//! let config = CacheConfig::default();
//! let store = Arc::new(DiskCacheStore::open("/var/cache/signage").await?);
//! let fetcher = Arc::new(HttpFetcher::new(&config)?);
//! let cache = CacheManager::new(store, fetcher, config)?;
//!
//! let materialized = cache
//!     .materialize(&playlist, |done, total| println!("{}/{}", done, total))
//!     .await;
//! cache.evict_unused(&materialized).await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod fetch;
mod manager;
mod store;

pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use fetch::{HttpFetcher, MediaFetcher, StaticFetcher};
pub use manager::{is_remote, CacheManager, CacheStats};
pub use store::{url_digest, CacheStore, DiskCacheStore, MemoryCacheStore};
