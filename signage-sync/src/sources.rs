//! Update sources.
//!
//! Every source is an independent task that turns backend activity into
//! [`SyncMessage`]s for the reconciler. None of them touches synchronizer state
//! directly.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use signage_api::{Backend, BackendError, DeviceId, Playlist, PlaylistId, RowChange, Screen};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Where a screen snapshot came from. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Push,
    Poll,
}

/// Messages consumed by the reconciler.
#[derive(Debug)]
pub enum SyncMessage {
    /// A screen row snapshot; `None` means the row is gone
    Screen {
        screen: Option<Screen>,
        origin: Origin,
    },
    /// The live channel reported a write to the playlist
    PlaylistPushed { playlist_id: PlaylistId },
    /// The live channel reported the playlist as deleted
    PlaylistDeleted { playlist_id: PlaylistId },
    /// Result of a playlist poll
    PlaylistPolled {
        playlist_id: PlaylistId,
        playlist: Option<Playlist>,
    },
    /// A resync task finished
    ResyncFinished {
        generation: u64,
        outcome: crate::reconciler::ResyncOutcome,
    },
    /// Stop reconciling and exit
    Shutdown,
}

pub type MessageSender = mpsc::UnboundedSender<SyncMessage>;

/// An interval whose first tick is one full period away.
fn periodic(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Write `last_ping` every period. Failures are logged and otherwise ignored.
pub async fn heartbeat(backend: Arc<dyn Backend>, device_id: DeviceId, period: Duration) {
    let mut ticks = periodic(period);
    loop {
        ticks.tick().await;
        match backend.touch_screen(&device_id, Utc::now()).await {
            Ok(()) => debug!(device = %device_id, "Heartbeat sent"),
            Err(e) => warn!(device = %device_id, error = %e, "Heartbeat failed"),
        }
    }
}

/// Re-fetch the screen row every period and forward the snapshot.
pub async fn poll_screen(
    backend: Arc<dyn Backend>,
    device_id: DeviceId,
    period: Duration,
    tx: MessageSender,
) {
    let mut ticks = periodic(period);
    loop {
        ticks.tick().await;
        match backend.fetch_screen(&device_id).await {
            Ok(screen) => {
                if tx
                    .send(SyncMessage::Screen {
                        screen,
                        origin: Origin::Poll,
                    })
                    .is_err()
                {
                    break;
                }
            }
            Err(e) => warn!(device = %device_id, error = %e, "Screen poll failed"),
        }
    }
}

/// Re-fetch the playlist row every period and forward it.
pub async fn poll_playlist(
    backend: Arc<dyn Backend>,
    playlist_id: PlaylistId,
    period: Duration,
    tx: MessageSender,
) {
    let mut ticks = periodic(period);
    loop {
        ticks.tick().await;
        match backend.fetch_playlist(&playlist_id).await {
            Ok(playlist) => {
                let message = SyncMessage::PlaylistPolled {
                    playlist_id: playlist_id.clone(),
                    playlist,
                };
                if tx.send(message).is_err() {
                    break;
                }
            }
            Err(e) => warn!(playlist = %playlist_id, error = %e, "Playlist poll failed"),
        }
    }
}

/// Outcome of trying to keep one live channel open.
enum Subscription {
    /// The stream ended or failed; try again later
    Retry,
    /// The backend has no live channel; polling is all there is
    Unavailable,
    /// The reconciler is gone
    Closed,
}

/// Forward live screen updates, re-subscribing after the channel drops.
pub async fn push_screen(
    backend: Arc<dyn Backend>,
    device_id: DeviceId,
    resubscribe: Duration,
    tx: MessageSender,
) {
    loop {
        let outcome = match backend.subscribe_screen(&device_id).await {
            Ok(mut changes) => {
                debug!(device = %device_id, "Screen subscription open");
                loop {
                    let Some(change) = changes.next().await else {
                        break Subscription::Retry;
                    };
                    let screen = match change {
                        RowChange::Updated(screen) => Some(screen),
                        RowChange::Deleted => None,
                    };
                    let message = SyncMessage::Screen {
                        screen,
                        origin: Origin::Push,
                    };
                    if tx.send(message).is_err() {
                        break Subscription::Closed;
                    }
                }
            }
            Err(e) => classify_subscribe_error(e),
        };

        match outcome {
            Subscription::Retry => {
                warn!(device = %device_id, "Screen subscription lost, will resubscribe");
                tokio::time::sleep(resubscribe).await;
            }
            Subscription::Unavailable => {
                info!(device = %device_id, "Live screen updates unavailable, polling only");
                return;
            }
            Subscription::Closed => return,
        }
    }
}

/// Forward live playlist updates, re-subscribing after the channel drops.
pub async fn push_playlist(
    backend: Arc<dyn Backend>,
    playlist_id: PlaylistId,
    resubscribe: Duration,
    tx: MessageSender,
) {
    loop {
        let outcome = match backend.subscribe_playlist(&playlist_id).await {
            Ok(mut changes) => loop {
                let Some(change) = changes.next().await else {
                    break Subscription::Retry;
                };
                let message = match change {
                    RowChange::Updated(_) => SyncMessage::PlaylistPushed {
                        playlist_id: playlist_id.clone(),
                    },
                    RowChange::Deleted => SyncMessage::PlaylistDeleted {
                        playlist_id: playlist_id.clone(),
                    },
                };
                if tx.send(message).is_err() {
                    break Subscription::Closed;
                }
            },
            Err(e) => classify_subscribe_error(e),
        };

        match outcome {
            Subscription::Retry => {
                debug!(playlist = %playlist_id, "Playlist subscription lost");
                tokio::time::sleep(resubscribe).await;
            }
            Subscription::Unavailable => {
                debug!(playlist = %playlist_id, "Live playlist updates unavailable, polling only");
                return;
            }
            Subscription::Closed => return,
        }
    }
}

fn classify_subscribe_error(error: BackendError) -> Subscription {
    match error {
        BackendError::SubscriptionUnavailable(_) => Subscription::Unavailable,
        other => {
            warn!(error = %other, "Subscribe failed");
            Subscription::Retry
        }
    }
}
