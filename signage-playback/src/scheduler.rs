//! Playlist rotation.
//!
//! One task owns the cursor. It reacts to three inputs: a new playlist on the
//! watch channel, a [`SurfaceEvent`] from the platform, and its own timer, which
//! is either an image's display deadline or a forced advance after a failure.

use std::sync::Arc;

use signage_api::{MaterializedPlaylist, MediaItem, MediaKind, PlaylistId};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::PlaybackConfig;
use crate::error::{PlaybackError, Result};
use crate::surface::{DisplayToken, MediaSurface, PreloadKind, SurfaceEvent};

/// Where playlists come from, usually the synchronizer's playlist watch.
pub type PlaylistReceiver = watch::Receiver<Option<Arc<MaterializedPlaylist>>>;

/// What the scheduler is doing right now
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackSnapshot {
    /// Playlist being rotated, if any
    pub playlist_id: Option<PlaylistId>,

    /// Index of the current item
    pub index: usize,

    /// Number of items in the playlist
    pub item_count: usize,

    /// Video is blocked until someone interacts with the device
    pub needs_interaction: bool,

    /// Token of the current display
    pub token: Option<DisplayToken>,
}

enum Command {
    Event(SurfaceEvent),
    Shutdown,
}

/// Cloneable sender a platform surface uses to report [`SurfaceEvent`]s.
#[derive(Clone)]
pub struct SurfaceEvents {
    tx: mpsc::UnboundedSender<Command>,
}

impl SurfaceEvents {
    /// Returns `false` once the scheduler has stopped.
    pub fn send(&self, event: SurfaceEvent) -> bool {
        self.tx.send(Command::Event(event)).is_ok()
    }
}

/// Rotates materialized playlists on a [`MediaSurface`].
pub struct PlaybackScheduler {
    surface: Arc<dyn MediaSurface>,
    playlist: PlaylistReceiver,
    config: PlaybackConfig,
}

impl PlaybackScheduler {
    pub fn new(
        surface: Arc<dyn MediaSurface>,
        playlist: PlaylistReceiver,
        config: PlaybackConfig,
    ) -> Self {
        Self {
            surface,
            playlist,
            config,
        }
    }

    /// Spawn the rotation task. Must be called inside a Tokio runtime.
    pub fn spawn(self) -> Result<PlaybackHandle> {
        self.config.validate()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(PlaybackSnapshot::default());

        let rotation = Rotation {
            surface: self.surface,
            config: self.config,
            snapshot: snapshot_tx,
            playlist: None,
            index: 0,
            last_token: DisplayToken::new(0),
            showing: None,
            deadline: None,
            needs_interaction: false,
        };
        let task = tokio::spawn(rotation.run(self.playlist, rx));

        Ok(PlaybackHandle {
            commands: tx,
            snapshot: snapshot_rx,
            task: Some(task),
        })
    }
}

/// Handle to a running scheduler. Dropping it stops playback.
pub struct PlaybackHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<PlaybackSnapshot>,
    task: Option<JoinHandle<()>>,
}

impl PlaybackHandle {
    /// Sender for the platform surface's events.
    pub fn events(&self) -> SurfaceEvents {
        SurfaceEvents {
            tx: self.commands.clone(),
        }
    }

    pub fn send_event(&self, event: SurfaceEvent) -> bool {
        self.commands.send(Command::Event(event)).is_ok()
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn watch_snapshot(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.snapshot.clone()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Clear the surface and stop the rotation task.
    pub async fn shutdown(mut self) -> Result<()> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        let _ = self.commands.send(Command::Shutdown);
        task.await
            .map_err(|e| PlaybackError::Task(format!("Failed to await scheduler: {}", e)))
    }
}

impl Drop for PlaybackHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ============================================================================
// Rotation task
// ============================================================================

struct Rotation {
    surface: Arc<dyn MediaSurface>,
    config: PlaybackConfig,
    snapshot: watch::Sender<PlaybackSnapshot>,

    playlist: Option<Arc<MaterializedPlaylist>>,
    index: usize,
    last_token: DisplayToken,
    /// Token of what is on screen; `None` while nothing is
    showing: Option<DisplayToken>,
    /// Next automatic advance: an image deadline or a forced advance
    deadline: Option<Instant>,
    needs_interaction: bool,
}

impl Rotation {
    async fn run(
        mut self,
        mut playlists: PlaylistReceiver,
        mut commands: mpsc::UnboundedReceiver<Command>,
    ) {
        let mut fullscreen_at = self
            .config
            .request_fullscreen
            .then(|| Instant::now() + self.config.fullscreen_delay);
        let mut watching = true;

        let initial = playlists.borrow_and_update().clone();
        self.load(initial).await;

        loop {
            tokio::select! {
                changed = playlists.changed(), if watching => match changed {
                    Ok(()) => {
                        let next = playlists.borrow_and_update().clone();
                        self.load(next).await;
                    }
                    Err(_) => {
                        debug!("Playlist source closed, keeping current rotation");
                        watching = false;
                    }
                },
                command = commands.recv() => match command {
                    Some(Command::Event(event)) => self.handle_event(event).await,
                    Some(Command::Shutdown) | None => break,
                },
                _ = sleep_until(self.deadline) => {
                    self.deadline = None;
                    self.advance().await;
                }
                _ = sleep_until(fullscreen_at) => {
                    fullscreen_at = None;
                    self.request_fullscreen().await;
                }
            }
        }

        self.surface.clear().await;
        debug!("Playback stopped");
    }

    /// Start over with a new playlist, or with nothing.
    async fn load(&mut self, playlist: Option<Arc<MaterializedPlaylist>>) {
        self.playlist = playlist.clone();
        self.index = 0;
        self.deadline = None;

        match playlist {
            Some(playlist) if !playlist.is_empty() => {
                info!(
                    playlist = %playlist.playlist_id,
                    items = playlist.len(),
                    "Starting rotation"
                );
                self.show_current().await;
            }
            other => {
                match other {
                    Some(playlist) => info!(playlist = %playlist.playlist_id, "Playlist is empty"),
                    None => info!("No playlist, clearing screen"),
                }
                self.showing = None;
                self.surface.clear().await;
                self.publish();
            }
        }
    }

    async fn show_current(&mut self) {
        let Some(playlist) = self.playlist.clone() else {
            return;
        };
        let Some(item) = playlist.items.get(self.index) else {
            return;
        };

        self.deadline = None;
        self.last_token = self.last_token.next();
        let token = self.last_token;
        self.showing = Some(token);

        let src = item.playable_src();
        let started = Instant::now();
        let shown = match item.kind {
            MediaKind::Image => self.surface.show_image(src, token).await,
            // Muted so that autoplay policies let it start on its own.
            MediaKind::Video => self.surface.play_video(src, token, true).await,
        };

        match shown {
            Ok(()) => {
                debug!(index = self.index, %token, item = item.label(), "Showing item");
                if item.kind == MediaKind::Image && playlist.len() > 1 {
                    let duration = item.display_duration(self.config.default_image_duration);
                    self.deadline = Some(started + duration);
                }
            }
            Err(e) => self.display_failed(&e),
        }

        if playlist.len() > 1 {
            let next = &playlist.items[(self.index + 1) % playlist.len()];
            let kind = match next.kind {
                MediaKind::Image => PreloadKind::Image,
                MediaKind::Video => PreloadKind::VideoMetadata,
            };
            self.surface.preload(next.playable_src(), kind).await;
        }

        self.publish();
    }

    async fn advance(&mut self) {
        let len = self.playlist.as_ref().map_or(0, |p| p.len());
        if len == 0 {
            return;
        }
        self.index = (self.index + 1) % len;
        self.show_current().await;
    }

    async fn handle_event(&mut self, event: SurfaceEvent) {
        if let SurfaceEvent::UserGesture = event {
            self.user_gesture().await;
            return;
        }
        if event.token() != self.showing {
            debug!(?event, "Ignoring event for an earlier display");
            return;
        }

        match event {
            SurfaceEvent::VideoEnded { token } => {
                if self.playlist.as_ref().is_some_and(|p| p.len() == 1) {
                    match self.surface.restart_video(token).await {
                        Ok(()) => debug!(%token, "Looping single video"),
                        Err(e) => self.display_failed(&e),
                    }
                } else {
                    self.advance().await;
                }
            }
            SurfaceEvent::MediaFailed { reason, .. } => {
                let src = self
                    .current_item()
                    .map(|item| item.playable_src().to_string())
                    .unwrap_or_default();
                self.display_failed(&PlaybackError::Media { src, reason });
            }
            SurfaceEvent::AutoplayRejected { .. } => {
                self.display_failed(&PlaybackError::AutoplayRejected);
            }
            SurfaceEvent::UserGesture => {}
        }
        self.publish();
    }

    /// Schedule a forced advance past the current item.
    fn display_failed(&mut self, error: &PlaybackError) {
        match error {
            PlaybackError::AutoplayRejected => {
                if !self.needs_interaction {
                    warn!("Autoplay blocked, waiting for a user gesture");
                }
                self.needs_interaction = true;
            }
            other => warn!(index = self.index, error = %other, "Item failed to play"),
        }
        self.deadline = Some(Instant::now() + self.config.failure_advance_delay);
    }

    async fn user_gesture(&mut self) {
        if self.needs_interaction {
            match self.surface.unmute_and_resume().await {
                Ok(()) => {
                    info!("Playback unlocked by user gesture");
                    // The resumed video now runs until it reports its end.
                    if self.current_item().is_some_and(|item| item.kind == MediaKind::Video) {
                        self.deadline = None;
                    }
                }
                Err(e) => warn!(error = %e, "Failed to resume playback"),
            }
            self.needs_interaction = false;
            self.publish();
        }
        if self.config.request_fullscreen {
            self.request_fullscreen().await;
        }
    }

    async fn request_fullscreen(&self) {
        match self.surface.request_fullscreen().await {
            Ok(()) => debug!("Fullscreen granted"),
            Err(e) => warn!(error = %e, "Fullscreen unavailable"),
        }
    }

    fn current_item(&self) -> Option<&MediaItem> {
        self.playlist.as_ref()?.items.get(self.index)
    }

    fn publish(&self) {
        let snapshot = PlaybackSnapshot {
            playlist_id: self.playlist.as_ref().map(|p| p.playlist_id.clone()),
            index: self.index,
            item_count: self.playlist.as_ref().map_or(0, |p| p.len()),
            needs_interaction: self.needs_interaction,
            token: self.showing,
        };
        self.snapshot.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            *current = snapshot;
            true
        });
    }
}

/// Sleep until `deadline`, or forever without one.
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
