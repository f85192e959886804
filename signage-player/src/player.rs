//! SignagePlayer - the assembled device
//!
//! Wires the backend, media cache, screen synchronizer and playback scheduler
//! together. The synchronizer's playlist watch is handed straight to the
//! scheduler, so the two never share any other state.

use std::sync::Arc;

use signage_api::{Backend, DeviceId, DeviceIdentity, MaterializedPlaylist, PostgrestBackend};
use signage_cache::{
    CacheManager, CacheStats, CacheStore, DiskCacheStore, HttpFetcher, MediaFetcher,
};
use signage_playback::{
    MediaSurface, PlaybackHandle, PlaybackScheduler, PlaybackSnapshot, SurfaceEvents,
};
use signage_sync::{ScreenSynchronizer, SyncHandle, SyncProgress, SyncStatus};
use tokio::sync::watch;
use tracing::info;

use crate::config::PlayerConfig;
use crate::error::Result;

type CodeGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// Builder for a [`SignagePlayer`]
///
/// Every collaborator has a production default derived from [`PlayerConfig`]:
/// the PostgREST backend, a disk cache under the cache directory, an HTTP
/// fetcher and a persisted device identity. Override any of them for tests or
/// other deployments.
pub struct SignagePlayerBuilder {
    config: PlayerConfig,
    device_id: Option<DeviceId>,
    backend: Option<Arc<dyn Backend>>,
    store: Option<Arc<dyn CacheStore>>,
    fetcher: Option<Arc<dyn MediaFetcher>>,
    code_generator: Option<CodeGenerator>,
}

impl SignagePlayerBuilder {
    pub fn new(config: PlayerConfig) -> Self {
        Self {
            config,
            device_id: None,
            backend: None,
            store: None,
            fetcher: None,
            code_generator: None,
        }
    }

    /// Use a fixed device id instead of the persisted identity.
    pub fn with_device_id(mut self, device_id: DeviceId) -> Self {
        self.device_id = Some(device_id);
        self
    }

    pub fn with_backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn MediaFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_code_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.code_generator = Some(Arc::new(generator));
        self
    }

    /// Start synchronizing and playing on `surface`.
    pub async fn start(self, surface: Arc<dyn MediaSurface>) -> Result<SignagePlayer> {
        let config = self.config;
        config.validate()?;

        let device_id = match self.device_id {
            Some(id) => id,
            None => {
                let path = config.resolved_identity_path()?;
                DeviceIdentity::load_or_create(&path)?.id().clone()
            }
        };

        let backend: Arc<dyn Backend> = match self.backend {
            Some(backend) => backend,
            None => Arc::new(PostgrestBackend::new(config.backend.clone())?),
        };
        let store: Arc<dyn CacheStore> = match self.store {
            Some(store) => store,
            None => Arc::new(DiskCacheStore::open(config.resolved_cache_dir()?).await?),
        };
        let fetcher: Arc<dyn MediaFetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpFetcher::new(&config.cache)?),
        };

        let cache = Arc::new(CacheManager::new(store, fetcher, config.cache.clone())?);

        let mut synchronizer =
            ScreenSynchronizer::new(device_id.clone(), backend, Arc::clone(&cache), config.sync);
        if let Some(generator) = self.code_generator {
            synchronizer = synchronizer.with_code_generator(move || generator());
        }
        let sync = synchronizer.start()?;

        let playback =
            PlaybackScheduler::new(surface, sync.watch_playlist(), config.playback).spawn()?;

        info!(device = %device_id, "Signage player started");

        Ok(SignagePlayer {
            device_id,
            cache,
            sync,
            playback,
        })
    }
}

/// A running player. Dropping it stops synchronization and playback.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use signage_player::{PlayerConfig, SignagePlayer};
/// use signage_playback::RecordingSurface;
///
/// # async fn run() -> signage_player::Result<()> {
/// let player = SignagePlayer::builder(PlayerConfig::from_env()?)
///     .start(Arc::new(RecordingSurface::new()))
///     .await?;
///
/// let mut status = player.watch_status();
/// while status.changed().await.is_ok() {
///     println!("{}", *status.borrow());
/// }
/// # Ok(())
/// # }
/// ```
pub struct SignagePlayer {
    device_id: DeviceId,
    cache: Arc<CacheManager>,
    sync: SyncHandle,
    playback: PlaybackHandle,
}

impl SignagePlayer {
    pub fn builder(config: PlayerConfig) -> SignagePlayerBuilder {
        SignagePlayerBuilder::new(config)
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    pub fn status(&self) -> SyncStatus {
        self.sync.status()
    }

    pub fn watch_status(&self) -> watch::Receiver<SyncStatus> {
        self.sync.watch_status()
    }

    /// The playlist being rotated, if any.
    pub fn playlist(&self) -> Option<Arc<MaterializedPlaylist>> {
        self.sync.playlist()
    }

    pub fn watch_playlist(&self) -> watch::Receiver<Option<Arc<MaterializedPlaylist>>> {
        self.sync.watch_playlist()
    }

    /// Download progress of the current playlist.
    pub fn progress(&self) -> Option<SyncProgress> {
        self.sync.progress()
    }

    pub fn watch_progress(&self) -> watch::Receiver<Option<SyncProgress>> {
        self.sync.watch_progress()
    }

    pub fn playback(&self) -> PlaybackSnapshot {
        self.playback.snapshot()
    }

    pub fn watch_playback(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.playback.watch_snapshot()
    }

    /// Sender for the surface's playback events.
    pub fn surface_events(&self) -> SurfaceEvents {
        self.playback.events()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Stop playback, then synchronization.
    pub async fn shutdown(self) -> Result<()> {
        self.playback.shutdown().await?;
        self.sync.shutdown().await?;
        info!(device = %self.device_id, "Signage player stopped");
        Ok(())
    }
}
