//! The reconciliation task.
//!
//! Owns every piece of synchronizer state and is the only place it changes.
//! Update sources and resync tasks talk to it exclusively through
//! [`SyncMessage`]s, so snapshots are applied strictly in arrival order.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use signage_api::{
    Backend, BackendError, DeviceId, MaterializedPlaylist, Playlist, PlaylistId, Screen,
    ScreenPhase,
};
use signage_cache::CacheManager;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::config::SyncConfig;
use crate::sources::{self, MessageSender, SyncMessage};
use crate::status::{SyncProgress, SyncStatus};

/// Produces a fresh pairing code.
pub type CodeGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// What a resync task produced.
#[derive(Debug)]
pub enum ResyncOutcome {
    /// The playlist was fetched and materialized
    Ready(MaterializedPlaylist),
    /// The playlist row does not exist
    Missing(PlaylistId),
    /// The playlist could not be fetched
    Failed(PlaylistId, String),
}

/// Senders for everything the synchronizer publishes.
pub(crate) struct Outputs {
    pub status: watch::Sender<SyncStatus>,
    pub playlist: watch::Sender<Option<Arc<MaterializedPlaylist>>>,
    pub progress: Arc<watch::Sender<Option<SyncProgress>>>,
}

/// An in-flight resync. Dropping it cancels the task.
struct Resync {
    generation: u64,
    playlist_id: PlaylistId,
    task: JoinHandle<()>,
}

impl Drop for Resync {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Push and poll tasks scoped to one playlist. Dropping them stops both.
struct PlaylistSources {
    playlist_id: PlaylistId,
    _tasks: JoinSet<()>,
}

pub(crate) struct Reconciler {
    device_id: DeviceId,
    backend: Arc<dyn Backend>,
    cache: Arc<CacheManager>,
    config: SyncConfig,
    code_generator: CodeGenerator,

    tx: MessageSender,
    outputs: Outputs,

    /// Phase of the last applied snapshot; `None` forces the next one through
    previous: Option<ScreenPhase>,
    /// Playlist the device should be showing
    target: Option<PlaylistId>,
    /// Version of the playlist currently published
    committed: Option<(PlaylistId, DateTime<Utc>)>,
    resync: Option<Resync>,
    /// Current resync generation, shared with progress callbacks
    generation: Arc<AtomicU64>,
    playlist_sources: Option<PlaylistSources>,
}

impl Reconciler {
    pub(crate) fn new(
        device_id: DeviceId,
        backend: Arc<dyn Backend>,
        cache: Arc<CacheManager>,
        config: SyncConfig,
        code_generator: CodeGenerator,
        tx: MessageSender,
        outputs: Outputs,
    ) -> Self {
        Self {
            device_id,
            backend,
            cache,
            config,
            code_generator,
            tx,
            outputs,
            previous: None,
            target: None,
            committed: None,
            resync: None,
            generation: Arc::new(AtomicU64::new(0)),
            playlist_sources: None,
        }
    }

    /// Run until shut down, or until the backend schema turns out to be incompatible.
    pub(crate) async fn run(mut self, mut rx: mpsc::UnboundedReceiver<SyncMessage>) {
        let Some(screen) = self.startup(&mut rx).await else {
            return;
        };
        self.apply_screen_snapshot(&screen).await;

        // Screen-level sources live as long as this task.
        let mut screen_sources = JoinSet::new();
        screen_sources.spawn(sources::push_screen(
            Arc::clone(&self.backend),
            self.device_id.clone(),
            self.config.resubscribe_interval,
            self.tx.clone(),
        ));
        screen_sources.spawn(sources::heartbeat(
            Arc::clone(&self.backend),
            self.device_id.clone(),
            self.config.heartbeat_interval,
        ));
        screen_sources.spawn(sources::poll_screen(
            Arc::clone(&self.backend),
            self.device_id.clone(),
            self.config.screen_poll_interval,
            self.tx.clone(),
        ));

        info!(device = %self.device_id, "Synchronizer running");

        while let Some(message) = rx.recv().await {
            match message {
                SyncMessage::Screen {
                    screen: Some(screen),
                    origin,
                } => {
                    debug!(?origin, "Screen snapshot received");
                    self.apply_screen_snapshot(&screen).await;
                }
                SyncMessage::Screen {
                    screen: None,
                    origin,
                } => {
                    warn!(device = %self.device_id, ?origin, "Screen row removed, unpairing");
                    self.force_unpair().await;
                }
                SyncMessage::PlaylistPushed { playlist_id } => {
                    if self.target.as_ref() == Some(&playlist_id) {
                        info!(playlist = %playlist_id, "Playlist changed, resyncing");
                        self.start_resync(playlist_id);
                    }
                }
                SyncMessage::PlaylistDeleted { playlist_id } => {
                    if self.target.as_ref() == Some(&playlist_id) {
                        self.playlist_gone(&playlist_id).await;
                    }
                }
                SyncMessage::PlaylistPolled {
                    playlist_id,
                    playlist,
                } => self.apply_playlist_poll(playlist_id, playlist).await,
                SyncMessage::ResyncFinished {
                    generation,
                    outcome,
                } => self.finish_resync(generation, outcome).await,
                SyncMessage::Shutdown => break,
            }
        }

        info!(device = %self.device_id, "Synchronizer stopped");
    }

    // ------------------------------------------------------------------
    // Startup
    // ------------------------------------------------------------------

    /// Look up (or create) this device's screen row, retrying transient failures.
    ///
    /// Returns `None` after a schema mismatch or when shut down while retrying.
    async fn startup(&mut self, rx: &mut mpsc::UnboundedReceiver<SyncMessage>) -> Option<Screen> {
        loop {
            match self.lookup_or_register().await {
                Ok(screen) => return Some(screen),
                Err(e) if e.is_schema_mismatch() => {
                    error!(
                        device = %self.device_id,
                        error = %e,
                        "Backend schema mismatch, synchronization halted"
                    );
                    self.outputs.status.send_replace(SyncStatus::SchemaError {
                        message: e.to_string(),
                    });
                    return None;
                }
                Err(e) => {
                    warn!(
                        device = %self.device_id,
                        error = %e,
                        retry_in = ?self.config.startup_retry_interval,
                        "Initial screen lookup failed"
                    );
                    self.outputs.status.send_replace(SyncStatus::Loading {
                        last_error: Some(e.to_string()),
                    });
                    tokio::select! {
                        _ = tokio::time::sleep(self.config.startup_retry_interval) => {}
                        message = rx.recv() => {
                            if matches!(message, None | Some(SyncMessage::Shutdown)) {
                                return None;
                            }
                        }
                    }
                }
            }
        }
    }

    async fn lookup_or_register(&self) -> Result<Screen, BackendError> {
        if let Some(screen) = self.backend.fetch_screen(&self.device_id).await? {
            return Ok(screen);
        }

        let code = (self.code_generator)();
        info!(device = %self.device_id, code = %code, "No screen row, registering for pairing");
        let pending = Screen::pending(self.device_id.clone(), code, Utc::now());
        self.backend.upsert_screen(&pending).await?;
        Ok(pending)
    }

    // ------------------------------------------------------------------
    // Screen snapshots
    // ------------------------------------------------------------------

    async fn apply_screen_snapshot(&mut self, screen: &Screen) {
        let phase = screen.phase();

        if self.previous.as_ref() == Some(&phase) {
            // A previous resync may have failed without anything to show for it.
            if let Some(playlist_id) = phase.playlist_id() {
                if self.committed.is_none() && self.resync.is_none() {
                    info!(playlist = %playlist_id, "Retrying playlist sync");
                    self.start_resync(playlist_id.clone());
                    return;
                }
            }
            debug!(device = %self.device_id, "Screen unchanged");
            return;
        }

        match &phase {
            ScreenPhase::Active { playlist_id } => {
                info!(device = %self.device_id, playlist = ?playlist_id, "Screen active");
                self.outputs.status.send_replace(SyncStatus::Active {
                    playlist_id: playlist_id.clone(),
                });

                match playlist_id {
                    Some(id) => {
                        let idle = self.committed.is_none() && self.resync.is_none();
                        if self.target.as_ref() != Some(id) || idle {
                            self.start_resync(id.clone());
                        }
                    }
                    None => {
                        self.clear_playlist();
                        self.evict_all().await;
                    }
                }
            }
            ScreenPhase::Pairing { code } => {
                info!(device = %self.device_id, code = ?code, "Screen waiting for pairing");
                self.clear_playlist();
                self.outputs
                    .status
                    .send_replace(SyncStatus::Pairing { code: code.clone() });
            }
        }

        self.previous = Some(phase);
    }

    /// The row is gone: drop everything and register again under a new code.
    async fn force_unpair(&mut self) {
        self.clear_playlist();
        self.evict_all().await;
        self.previous = None;

        let code = (self.code_generator)();
        self.outputs.status.send_replace(SyncStatus::Pairing {
            code: Some(code.clone()),
        });

        let pending = Screen::pending(self.device_id.clone(), code.clone(), Utc::now());
        match self.backend.upsert_screen(&pending).await {
            Ok(_) => info!(device = %self.device_id, code = %code, "Re-registered for pairing"),
            Err(e) => warn!(device = %self.device_id, error = %e, "Failed to re-register screen"),
        }
    }

    // ------------------------------------------------------------------
    // Playlist
    // ------------------------------------------------------------------

    async fn apply_playlist_poll(&mut self, playlist_id: PlaylistId, playlist: Option<Playlist>) {
        if self.target.as_ref() != Some(&playlist_id) {
            return;
        }

        let Some(playlist) = playlist else {
            self.playlist_gone(&playlist_id).await;
            return;
        };

        if self.resync.is_some() {
            debug!(playlist = %playlist_id, "Resync in flight, skipping poll result");
            return;
        }

        let polled = (playlist.id.clone(), playlist.updated_at);
        if self.committed.as_ref() == Some(&polled) {
            debug!(playlist = %playlist_id, "Playlist unchanged");
            return;
        }

        info!(
            playlist = %playlist_id,
            updated_at = %playlist.updated_at,
            "Playlist updated, resyncing"
        );
        self.start_resync(playlist_id);
    }

    /// The assigned playlist no longer exists.
    async fn playlist_gone(&mut self, playlist_id: &PlaylistId) {
        if self.committed.is_none() && self.resync.is_none() {
            return;
        }
        warn!(playlist = %playlist_id, "Assigned playlist removed");
        self.cancel_resync();
        self.publish(None);
        self.evict_all().await;
    }

    fn start_resync(&mut self, playlist_id: PlaylistId) {
        self.cancel_resync();
        let generation = self.generation.load(Ordering::SeqCst);

        self.target = Some(playlist_id.clone());
        self.ensure_playlist_sources(&playlist_id);

        let backend = Arc::clone(&self.backend);
        let cache = Arc::clone(&self.cache);
        let current = Arc::clone(&self.generation);
        let progress = Arc::clone(&self.outputs.progress);
        let tx = self.tx.clone();
        let id = playlist_id.clone();

        let task = tokio::spawn(async move {
            let outcome = match backend.fetch_playlist(&id).await {
                Ok(Some(playlist)) => {
                    let report = |completed: usize, total: usize| {
                        if current.load(Ordering::SeqCst) == generation {
                            progress.send_replace(Some(SyncProgress {
                                generation,
                                playlist_id: id.clone(),
                                completed,
                                total,
                            }));
                        }
                    };
                    ResyncOutcome::Ready(cache.materialize(&playlist, report).await)
                }
                Ok(None) => ResyncOutcome::Missing(id.clone()),
                Err(e) => ResyncOutcome::Failed(id.clone(), e.to_string()),
            };
            let _ = tx.send(SyncMessage::ResyncFinished {
                generation,
                outcome,
            });
        });

        debug!(playlist = %playlist_id, generation, "Resync started");
        self.resync = Some(Resync {
            generation,
            playlist_id,
            task,
        });
    }

    async fn finish_resync(&mut self, generation: u64, outcome: ResyncOutcome) {
        let current = match &self.resync {
            Some(resync) if resync.generation == generation => resync.playlist_id.clone(),
            _ => {
                debug!(generation, "Discarding stale resync result");
                return;
            }
        };
        // The task has completed; nothing left to abort.
        self.resync = None;

        match outcome {
            ResyncOutcome::Ready(materialized) => {
                let version = (materialized.playlist_id.clone(), materialized.updated_at);
                info!(
                    playlist = %current,
                    items = materialized.len(),
                    "Playlist ready"
                );
                let materialized = Arc::new(materialized);
                self.committed = Some(version);
                self.outputs
                    .playlist
                    .send_replace(Some(Arc::clone(&materialized)));

                if let Err(e) = self.cache.evict_unused(&materialized).await {
                    warn!(error = %e, "Cache eviction failed");
                }
            }
            ResyncOutcome::Missing(playlist_id) => {
                warn!(playlist = %playlist_id, "Assigned playlist does not exist");
                self.publish(None);
                self.evict_all().await;
            }
            ResyncOutcome::Failed(playlist_id, message) => {
                warn!(
                    playlist = %playlist_id,
                    error = %message,
                    "Playlist sync failed, keeping current playlist"
                );
            }
        }
    }

    /// Abort any in-flight resync and invalidate its progress reports.
    fn cancel_resync(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(resync) = self.resync.take() {
            debug!(
                playlist = %resync.playlist_id,
                generation = resync.generation,
                "Resync superseded"
            );
        }
    }

    /// Stop everything playlist related and publish an empty playlist.
    fn clear_playlist(&mut self) {
        self.cancel_resync();
        self.target = None;
        self.playlist_sources = None;
        self.publish(None);
    }

    fn publish(&mut self, playlist: Option<Arc<MaterializedPlaylist>>) {
        if playlist.is_none() {
            self.committed = None;
            self.outputs.progress.send_replace(None);
        }
        self.outputs.playlist.send_if_modified(|current| {
            if current.is_none() && playlist.is_none() {
                return false;
            }
            *current = playlist;
            true
        });
    }

    fn ensure_playlist_sources(&mut self, playlist_id: &PlaylistId) {
        if let Some(existing) = &self.playlist_sources {
            if &existing.playlist_id == playlist_id {
                return;
            }
        }

        let mut tasks = JoinSet::new();
        tasks.spawn(sources::push_playlist(
            Arc::clone(&self.backend),
            playlist_id.clone(),
            self.config.resubscribe_interval,
            self.tx.clone(),
        ));
        tasks.spawn(sources::poll_playlist(
            Arc::clone(&self.backend),
            playlist_id.clone(),
            self.config.playlist_poll_interval,
            self.tx.clone(),
        ));

        debug!(playlist = %playlist_id, "Watching playlist");
        self.playlist_sources = Some(PlaylistSources {
            playlist_id: playlist_id.clone(),
            _tasks: tasks,
        });
    }

    async fn evict_all(&self) {
        match self.cache.evict_all().await {
            Ok(removed) => debug!(removed, "Cache cleared"),
            Err(e) => warn!(error = %e, "Failed to clear cache"),
        }
    }
}
