//! Headless walk-through of a device's life: register, pair, play, unpair.
//!
//! Everything runs in-process: the backend is an `InMemoryBackend` playing the
//! operator's part, media comes from a `StaticFetcher`, and the "screen" prints
//! what it would show.
//!
//! Run with: cargo run -p signage-player --example headless_demo

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use signage_api::{DeviceId, InMemoryBackend, MediaItem, Playlist, PlaylistId};
use signage_cache::{MemoryCacheStore, StaticFetcher};
use signage_playback::{
    DisplayToken, MediaSurface, PlaybackConfig, PreloadKind, Result as PlaybackResult,
    SurfaceEvent, SurfaceEvents,
};
use signage_player::{logging, PlayerConfig, PlayerError, SignagePlayer};
use signage_sync::SyncStatus;

/// Prints every request and pretends each video lasts three seconds.
#[derive(Default)]
struct ConsoleSurface {
    events: parking_lot::Mutex<Option<SurfaceEvents>>,
}

impl ConsoleSurface {
    fn attach(&self, events: SurfaceEvents) {
        *self.events.lock() = Some(events);
    }

    fn end_video_later(&self, token: DisplayToken) {
        if let Some(events) = self.events.lock().clone() {
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(3)).await;
                events.send(SurfaceEvent::VideoEnded { token });
            });
        }
    }
}

#[async_trait]
impl MediaSurface for ConsoleSurface {
    async fn show_image(&self, src: &str, token: DisplayToken) -> PlaybackResult<()> {
        println!("   [screen {}] image {}", token, src);
        Ok(())
    }

    async fn play_video(&self, src: &str, token: DisplayToken, muted: bool) -> PlaybackResult<()> {
        println!("   [screen {}] video {} (muted: {})", token, src, muted);
        self.end_video_later(token);
        Ok(())
    }

    async fn restart_video(&self, token: DisplayToken) -> PlaybackResult<()> {
        println!("   [screen {}] video restarted", token);
        self.end_video_later(token);
        Ok(())
    }

    async fn preload(&self, src: &str, kind: PreloadKind) {
        println!("   [screen] preload {:?} {}", kind, src);
    }

    async fn clear(&self) {
        println!("   [screen] cleared");
    }

    async fn unmute_and_resume(&self) -> PlaybackResult<()> {
        Ok(())
    }

    async fn request_fullscreen(&self) -> PlaybackResult<()> {
        println!("   [screen] fullscreen");
        Ok(())
    }
}

async fn wait_for_status(
    player: &SignagePlayer,
    predicate: impl Fn(&SyncStatus) -> bool,
) -> SyncStatus {
    let mut status = player.watch_status();
    loop {
        {
            let current = status.borrow_and_update();
            if predicate(&current) {
                return current.clone();
            }
        }
        if status.changed().await.is_err() {
            return player.status();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), PlayerError> {
    logging::init_logging_from_env()?;

    println!("Signage player - headless demo");
    println!("==============================");

    let backend = Arc::new(InMemoryBackend::new());
    backend.put_playlist(Playlist {
        id: PlaylistId::new("lobby"),
        name: Some("Lobby loop".to_string()),
        updated_at: Utc::now(),
        items: vec![
            MediaItem::image("https://cdn.example.com/welcome.jpg", 4),
            MediaItem::video("https://cdn.example.com/promo.mp4"),
            MediaItem::image("https://cdn.example.com/menu.png", 4),
        ],
    });

    let fetcher = Arc::new(StaticFetcher::new());
    fetcher.insert("https://cdn.example.com/welcome.jpg", &b"jpeg"[..]);
    fetcher.insert_with_latency(
        "https://cdn.example.com/promo.mp4",
        &b"mp4"[..],
        Duration::from_millis(500),
    );
    fetcher.insert("https://cdn.example.com/menu.png", &b"png"[..]);

    let surface = Arc::new(ConsoleSurface::default());
    let device = DeviceId::new("demo-device");

    let player = SignagePlayer::builder(
        PlayerConfig::default().with_playback(PlaybackConfig::windowed()),
    )
    .with_device_id(device.clone())
    .with_backend(backend.clone())
    .with_store(Arc::new(MemoryCacheStore::new()))
    .with_fetcher(fetcher)
    .start(surface.clone())
    .await?;
    surface.attach(player.surface_events());

    // 1. The device registers itself and waits to be claimed.
    let status = wait_for_status(&player, |s| s.pairing_code().is_some()).await;
    println!("\n1. Registered: {}", status);
    tokio::time::sleep(Duration::from_millis(100)).await;

    // 2. An operator enters the code and assigns a playlist.
    println!("\n2. Operator assigns the lobby playlist");
    backend.assign(&device, "operator-1", Some(PlaylistId::new("lobby")));
    let mut playlist = player.watch_playlist();
    while playlist.borrow_and_update().is_none() {
        if playlist.changed().await.is_err() {
            break;
        }
    }
    if let Some(progress) = player.progress() {
        println!(
            "   Downloaded {}/{} items ({}%)",
            progress.completed,
            progress.total,
            progress.percent()
        );
    }

    // 3. Let it rotate for a while.
    println!("\n3. Playing");
    tokio::time::sleep(Duration::from_secs(12)).await;
    let snapshot = player.playback();
    println!(
        "   Item {} of {} in {:?}",
        snapshot.index + 1,
        snapshot.item_count,
        snapshot.playlist_id
    );
    println!("   Cache: {:?}", player.cache_stats());

    // 4. The operator removes the screen; the device starts over.
    println!("\n4. Operator deletes the screen");
    backend.delete_screen(&device);
    let status = wait_for_status(&player, |s| s.pairing_code().is_some()).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    println!("   Back to {}", status);

    player.shutdown().await?;
    println!("\nDone");
    Ok(())
}
