use std::sync::Arc;

use signage_api::{generate_pairing_code, Backend, DeviceId, MaterializedPlaylist};
use signage_cache::CacheManager;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::reconciler::{CodeGenerator, Outputs, Reconciler};
use crate::sources::SyncMessage;
use crate::status::{SyncProgress, SyncStatus};

/// Keeps this device's screen and playlist state in step with the backend.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use signage_api::{DeviceId, InMemoryBackend};
/// use signage_cache::{CacheConfig, CacheManager, MemoryCacheStore, StaticFetcher};
/// use signage_sync::{ScreenSynchronizer, SyncConfig};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = Arc::new(InMemoryBackend::new());
/// let cache = Arc::new(CacheManager::new(
///     Arc::new(MemoryCacheStore::new()),
///     Arc::new(StaticFetcher::new()),
///     CacheConfig::default(),
/// )?);
///
/// let handle = ScreenSynchronizer::new(DeviceId::new("D1"), backend, cache, SyncConfig::default())
///     .start()?;
/// let mut status = handle.watch_status();
/// status.changed().await?;
/// println!("{}", *status.borrow());
/// # Ok(())
/// # }
/// ```
pub struct ScreenSynchronizer {
    device_id: DeviceId,
    backend: Arc<dyn Backend>,
    cache: Arc<CacheManager>,
    config: SyncConfig,
    code_generator: CodeGenerator,
}

impl ScreenSynchronizer {
    pub fn new(
        device_id: DeviceId,
        backend: Arc<dyn Backend>,
        cache: Arc<CacheManager>,
        config: SyncConfig,
    ) -> Self {
        Self {
            device_id,
            backend,
            cache,
            config,
            code_generator: Arc::new(generate_pairing_code),
        }
    }

    /// Replace the pairing-code generator.
    pub fn with_code_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.code_generator = Arc::new(generator);
        self
    }

    /// Spawn the reconciliation task. Must be called inside a Tokio runtime.
    pub fn start(self) -> Result<SyncHandle> {
        self.config.validate()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(SyncStatus::default());
        let (playlist_tx, playlist_rx) = watch::channel(None);
        let (progress_tx, progress_rx) = watch::channel(None);

        let reconciler = Reconciler::new(
            self.device_id,
            self.backend,
            self.cache,
            self.config,
            self.code_generator,
            tx.clone(),
            Outputs {
                status: status_tx,
                playlist: playlist_tx,
                progress: Arc::new(progress_tx),
            },
        );
        let task = tokio::spawn(reconciler.run(rx));

        Ok(SyncHandle {
            commands: tx,
            status: status_rx,
            playlist: playlist_rx,
            progress: progress_rx,
            task: Some(task),
        })
    }
}

/// Handle to a running synchronizer. Dropping it stops synchronization.
pub struct SyncHandle {
    commands: mpsc::UnboundedSender<SyncMessage>,
    status: watch::Receiver<SyncStatus>,
    playlist: watch::Receiver<Option<Arc<MaterializedPlaylist>>>,
    progress: watch::Receiver<Option<SyncProgress>>,
    task: Option<JoinHandle<()>>,
}

impl SyncHandle {
    /// Current status.
    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<SyncStatus> {
        self.status.clone()
    }

    /// The playlist that should be playing, if any.
    pub fn playlist(&self) -> Option<Arc<MaterializedPlaylist>> {
        self.playlist.borrow().clone()
    }

    pub fn watch_playlist(&self) -> watch::Receiver<Option<Arc<MaterializedPlaylist>>> {
        self.playlist.clone()
    }

    /// Progress of the current resync, if one is running or just finished.
    pub fn progress(&self) -> Option<SyncProgress> {
        self.progress.borrow().clone()
    }

    pub fn watch_progress(&self) -> watch::Receiver<Option<SyncProgress>> {
        self.progress.clone()
    }

    /// Whether the reconciliation task is still running.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop the reconciler and every source task, waiting for it to exit.
    pub async fn shutdown(mut self) -> Result<()> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };

        // A reconciler that already halted has dropped its receiver.
        let _ = self.commands.send(SyncMessage::Shutdown);
        debug!("Synchronizer shutdown requested");

        task.await
            .map_err(|e| SyncError::Task(format!("Failed to await reconciler: {}", e)))
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
