//! In-process backend.
//!
//! Holds rows in memory and fans out row changes to live subscribers. Besides the
//! device-facing [`Backend`] methods it exposes operator-side helpers (assign a
//! screen, unpair it, edit a playlist) and fault injection, which is what the
//! integration tests and the headless demo drive.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::channel::mpsc;
use futures::StreamExt;
use parking_lot::Mutex;

use crate::backend::{Backend, ChangeStream, RowChange};
use crate::error::{BackendError, Result};
use crate::model::{DeviceId, Playlist, PlaylistId, Screen};

#[derive(Default)]
struct Inner {
    screens: HashMap<DeviceId, Screen>,
    playlists: HashMap<PlaylistId, Playlist>,
    screen_subscribers: Vec<(DeviceId, mpsc::UnboundedSender<RowChange<Screen>>)>,
    playlist_subscribers: Vec<(PlaylistId, mpsc::UnboundedSender<RowChange<Playlist>>)>,
    push_muted: bool,
    offline: bool,
    schema_mismatch: bool,
    subscriptions_unavailable: bool,
}

impl Inner {
    fn notify_screen(&mut self, id: &DeviceId, change: RowChange<Screen>) {
        if self.push_muted {
            return;
        }
        self.screen_subscribers
            .retain(|(sub_id, tx)| sub_id != id || tx.unbounded_send(change.clone()).is_ok());
    }

    fn notify_playlist(&mut self, id: &PlaylistId, change: RowChange<Playlist>) {
        if self.push_muted {
            return;
        }
        self.playlist_subscribers
            .retain(|(sub_id, tx)| sub_id != id || tx.unbounded_send(change.clone()).is_ok());
    }

    fn check_online(&self) -> Result<()> {
        if self.offline {
            Err(BackendError::Network("backend unreachable".to_string()))
        } else {
            Ok(())
        }
    }

    fn check_schema(&self) -> Result<()> {
        if self.schema_mismatch {
            Err(BackendError::SchemaMismatch(
                "relation \"screens\" does not exist".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

/// Thread-safe in-memory implementation of [`Backend`].
#[derive(Default)]
pub struct InMemoryBackend {
    inner: Mutex<Inner>,
    screen_fetches: AtomicUsize,
    screen_upserts: AtomicUsize,
    pings: AtomicUsize,
    playlist_fetches: AtomicUsize,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Operator-side helpers
    // ------------------------------------------------------------------

    /// Seed a screen row without notifying subscribers.
    pub fn insert_screen(&self, screen: Screen) {
        self.inner.lock().screens.insert(screen.id.clone(), screen);
    }

    /// Current screen row, as the operator dashboard would see it.
    pub fn screen(&self, id: &DeviceId) -> Option<Screen> {
        self.inner.lock().screens.get(id).cloned()
    }

    /// Mutate an existing screen row and push the update.
    ///
    /// Returns `false` if the row does not exist.
    pub fn update_screen(&self, id: &DeviceId, update: impl FnOnce(&mut Screen)) -> bool {
        let mut inner = self.inner.lock();
        let Some(screen) = inner.screens.get_mut(id) else {
            return false;
        };
        update(screen);
        let snapshot = screen.clone();
        inner.notify_screen(id, RowChange::Updated(snapshot));
        true
    }

    /// Pair a screen with an operator and assign a playlist.
    pub fn assign(&self, id: &DeviceId, operator: &str, playlist_id: Option<PlaylistId>) -> bool {
        self.update_screen(id, |screen| {
            screen.assigned_to = Some(operator.to_string());
            screen.pairing_code = None;
            screen.playlist_id = playlist_id;
        })
    }

    /// Delete a screen row (forced unpair) and push the delete.
    pub fn delete_screen(&self, id: &DeviceId) -> bool {
        let mut inner = self.inner.lock();
        let removed = inner.screens.remove(id).is_some();
        if removed {
            inner.notify_screen(id, RowChange::Deleted);
        }
        removed
    }

    /// Insert or replace a playlist row and push the update.
    pub fn put_playlist(&self, playlist: Playlist) {
        let mut inner = self.inner.lock();
        let id = playlist.id.clone();
        inner.playlists.insert(id.clone(), playlist.clone());
        inner.notify_playlist(&id, RowChange::Updated(playlist));
    }

    /// Delete a playlist row and push the delete.
    pub fn delete_playlist(&self, id: &PlaylistId) -> bool {
        let mut inner = self.inner.lock();
        let removed = inner.playlists.remove(id).is_some();
        if removed {
            inner.notify_playlist(id, RowChange::Deleted);
        }
        removed
    }

    // ------------------------------------------------------------------
    // Fault injection
    // ------------------------------------------------------------------

    /// Silently drop every push notification while muted. Rows still change.
    pub fn mute_push(&self, muted: bool) {
        self.inner.lock().push_muted = muted;
    }

    /// Fail every device-facing call with a network error.
    pub fn set_offline(&self, offline: bool) {
        self.inner.lock().offline = offline;
    }

    /// Fail screen reads and writes with a schema mismatch.
    pub fn set_schema_mismatch(&self, mismatch: bool) {
        self.inner.lock().schema_mismatch = mismatch;
    }

    /// Refuse new live subscriptions.
    pub fn set_subscriptions_unavailable(&self, unavailable: bool) {
        self.inner.lock().subscriptions_unavailable = unavailable;
    }

    /// Close every open subscription stream, as a dropped connection would.
    pub fn drop_subscriptions(&self) {
        let mut inner = self.inner.lock();
        inner.screen_subscribers.clear();
        inner.playlist_subscribers.clear();
    }

    // ------------------------------------------------------------------
    // Counters
    // ------------------------------------------------------------------

    pub fn screen_fetch_count(&self) -> usize {
        self.screen_fetches.load(Ordering::SeqCst)
    }

    pub fn screen_upsert_count(&self) -> usize {
        self.screen_upserts.load(Ordering::SeqCst)
    }

    pub fn ping_count(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    pub fn playlist_fetch_count(&self) -> usize {
        self.playlist_fetches.load(Ordering::SeqCst)
    }

    pub fn screen_subscriber_count(&self) -> usize {
        self.inner
            .lock()
            .screen_subscribers
            .iter()
            .filter(|(_, tx)| !tx.is_closed())
            .count()
    }

    pub fn playlist_subscriber_count(&self) -> usize {
        self.inner
            .lock()
            .playlist_subscribers
            .iter()
            .filter(|(_, tx)| !tx.is_closed())
            .count()
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn fetch_screen(&self, id: &DeviceId) -> Result<Option<Screen>> {
        self.screen_fetches.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.lock();
        inner.check_online()?;
        inner.check_schema()?;
        Ok(inner.screens.get(id).cloned())
    }

    async fn upsert_screen(&self, screen: &Screen) -> Result<Screen> {
        self.screen_upserts.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock();
        inner.check_online()?;
        inner.check_schema()?;
        let existed = inner
            .screens
            .insert(screen.id.clone(), screen.clone())
            .is_some();
        if existed {
            inner.notify_screen(&screen.id, RowChange::Updated(screen.clone()));
        }
        Ok(screen.clone())
    }

    async fn touch_screen(&self, id: &DeviceId, at: DateTime<Utc>) -> Result<()> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock();
        inner.check_online()?;
        let snapshot = match inner.screens.get_mut(id) {
            Some(screen) => {
                screen.last_ping = Some(at);
                screen.clone()
            }
            // Updating a missing row matches zero rows; not an error.
            None => return Ok(()),
        };
        inner.notify_screen(id, RowChange::Updated(snapshot));
        Ok(())
    }

    async fn fetch_playlist(&self, id: &PlaylistId) -> Result<Option<Playlist>> {
        self.playlist_fetches.fetch_add(1, Ordering::SeqCst);
        let inner = self.inner.lock();
        inner.check_online()?;
        Ok(inner.playlists.get(id).cloned())
    }

    async fn subscribe_screen(&self, id: &DeviceId) -> Result<ChangeStream<Screen>> {
        let mut inner = self.inner.lock();
        inner.check_online()?;
        if inner.subscriptions_unavailable {
            return Err(BackendError::SubscriptionUnavailable(
                "realtime disabled".to_string(),
            ));
        }
        let (tx, rx) = mpsc::unbounded();
        inner.screen_subscribers.push((id.clone(), tx));
        Ok(rx.boxed())
    }

    async fn subscribe_playlist(&self, id: &PlaylistId) -> Result<ChangeStream<Playlist>> {
        let mut inner = self.inner.lock();
        inner.check_online()?;
        if inner.subscriptions_unavailable {
            return Err(BackendError::SubscriptionUnavailable(
                "realtime disabled".to_string(),
            ));
        }
        let (tx, rx) = mpsc::unbounded();
        inner.playlist_subscribers.push((id.clone(), tx));
        Ok(rx.boxed())
    }
}
