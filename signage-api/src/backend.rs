//! The backend collaborator interface.
//!
//! The player never talks to a concrete backend directly. Row reads, writes and
//! live subscriptions all go through [`Backend`], which keeps the synchronizer
//! testable against [`InMemoryBackend`](crate::InMemoryBackend) and lets the HTTP
//! implementation stay a thin adapter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;

use crate::error::Result;
use crate::model::{DeviceId, Playlist, PlaylistId, Screen};

/// A change delivered by a live subscription for a single row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowChange<T> {
    /// The row was written; carries the new row
    Updated(T),
    /// The row was deleted
    Deleted,
}

/// Stream of live row changes. Dropping it unsubscribes.
pub type ChangeStream<T> = BoxStream<'static, RowChange<T>>;

/// Row-level access to the `screens` and `playlists` collections.
///
/// Push delivery is best-effort: implementations may drop events, close streams at
/// any time, or refuse to subscribe at all with
/// [`BackendError::SubscriptionUnavailable`](crate::BackendError::SubscriptionUnavailable).
/// Callers must back push with polling.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Read the screen row for `id`, `None` if it does not exist.
    async fn fetch_screen(&self, id: &DeviceId) -> Result<Option<Screen>>;

    /// Insert or replace a screen row, returning the stored row.
    async fn upsert_screen(&self, screen: &Screen) -> Result<Screen>;

    /// Update only the `last_ping` column of a screen row.
    async fn touch_screen(&self, id: &DeviceId, at: DateTime<Utc>) -> Result<()>;

    /// Read the playlist row for `id`, `None` if it does not exist.
    async fn fetch_playlist(&self, id: &PlaylistId) -> Result<Option<Playlist>>;

    /// Subscribe to update/delete events of one screen row.
    async fn subscribe_screen(&self, id: &DeviceId) -> Result<ChangeStream<Screen>>;

    /// Subscribe to update events of one playlist row.
    async fn subscribe_playlist(&self, id: &PlaylistId) -> Result<ChangeStream<Playlist>>;
}
