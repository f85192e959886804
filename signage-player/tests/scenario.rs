//! A device's life from registration to unpairing, through the assembled player.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use signage_api::{
    DeviceId, DeviceIdentity, InMemoryBackend, MediaItem, Playlist, PlaylistId, ScreenStatus,
};
use signage_cache::{MemoryCacheStore, StaticFetcher};
use signage_playback::{PlaybackConfig, RecordingSurface, SurfaceCall, SurfaceEvent};
use signage_player::{PlayerConfig, SignagePlayer};
use signage_sync::SyncStatus;
use tokio::sync::watch;

const IMG_A: &str = "https://cdn.example.com/a.jpg";
const VID_C: &str = "https://cdn.example.com/c.mp4";

fn lobby_playlist() -> Playlist {
    Playlist {
        id: PlaylistId::new("PL1"),
        name: Some("Lobby".to_string()),
        updated_at: Utc::now(),
        items: vec![MediaItem::image(IMG_A, 2), MediaItem::video(VID_C)],
    }
}

fn fixture_fetcher() -> Arc<StaticFetcher> {
    let fetcher = Arc::new(StaticFetcher::new());
    fetcher.insert(IMG_A, &b"image-a"[..]);
    fetcher.insert(VID_C, &b"video-c"[..]);
    fetcher
}

fn codes() -> impl Fn() -> String + Send + Sync + 'static {
    let issued = std::sync::atomic::AtomicUsize::new(0);
    move || {
        let n = issued.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
        format!("C{}", n)
    }
}

async fn wait_for<T: Clone>(mut rx: watch::Receiver<T>, predicate: impl Fn(&T) -> bool) -> T {
    let wait = async {
        loop {
            {
                let value = rx.borrow_and_update();
                if predicate(&*value) {
                    return value.clone();
                }
            }
            rx.changed().await.expect("sender alive");
        }
    };
    tokio::time::timeout(Duration::from_secs(600), wait)
        .await
        .expect("condition reached in time")
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

async fn start_player(
    backend: Arc<InMemoryBackend>,
    surface: Arc<RecordingSurface>,
) -> SignagePlayer {
    SignagePlayer::builder(PlayerConfig::default().with_playback(PlaybackConfig::windowed()))
        .with_device_id(DeviceId::new("D1"))
        .with_backend(backend)
        .with_store(Arc::new(MemoryCacheStore::new()))
        .with_fetcher(fixture_fetcher())
        .with_code_generator(codes())
        .start(surface)
        .await
        .expect("player starts")
}

#[tokio::test(start_paused = true)]
async fn test_register_pair_and_play() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.put_playlist(lobby_playlist());
    let surface = Arc::new(RecordingSurface::new());
    let player = start_player(backend.clone(), surface.clone()).await;

    // Unknown device: registers under a fresh code.
    let status = wait_for(player.watch_status(), |s| s.pairing_code().is_some()).await;
    assert_eq!(status, SyncStatus::Pairing { code: Some("C1".to_string()) });
    let row = backend.screen(&DeviceId::new("D1")).expect("row created");
    assert_eq!(row.status, ScreenStatus::Pending);
    assert_eq!(row.pairing_code.as_deref(), Some("C1"));
    settle().await;
    assert!(surface.displayed().is_empty());

    // Operator claims it and assigns PL1.
    backend.assign(&DeviceId::new("D1"), "op1", Some(PlaylistId::new("PL1")));
    wait_for(player.watch_status(), SyncStatus::is_active).await;
    let playback = wait_for(player.watch_playback(), |p| p.item_count == 2).await;
    assert_eq!(playback.playlist_id, Some(PlaylistId::new("PL1")));
    assert_eq!(playback.index, 0);

    let playlist = player.playlist().expect("materialized");
    assert!(playlist
        .items
        .iter()
        .all(|item| item.resolved_src.as_deref().is_some_and(|src| src.starts_with("memory://"))));
    assert_eq!(surface.displayed(), vec![playlist.items[0].playable_src()]);

    // Rotation: image for 2s, then the video until it ends.
    tokio::time::sleep(Duration::from_millis(2001)).await;
    assert_eq!(player.playback().index, 1);

    let token = surface.current_token().expect("video on screen");
    assert!(player.surface_events().send(SurfaceEvent::VideoEnded { token }));
    settle().await;
    assert_eq!(player.playback().index, 0);
    assert_eq!(player.cache_stats().downloads, 2);

    player.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_unpair_clears_screen_and_cache() {
    let backend = Arc::new(InMemoryBackend::new());
    backend.put_playlist(lobby_playlist());
    let surface = Arc::new(RecordingSurface::new());
    let player = start_player(backend.clone(), surface.clone()).await;
    wait_for(player.watch_status(), |s| s.pairing_code().is_some()).await;
    settle().await;

    backend.assign(&DeviceId::new("D1"), "op1", Some(PlaylistId::new("PL1")));
    wait_for(player.watch_playback(), |p| p.item_count == 2).await;

    backend.delete_screen(&DeviceId::new("D1"));
    let status = wait_for(player.watch_status(), |s| s.pairing_code() == Some("C2")).await;
    assert!(!status.is_active());

    let playback = wait_for(player.watch_playback(), |p| p.playlist_id.is_none()).await;
    assert_eq!(playback.token, None);
    assert_eq!(surface.calls().last(), Some(&SurfaceCall::Clear));
    assert!(player.playlist().is_none());
    settle().await;
    assert_eq!(player.cache_stats().evicted, 2);
}

#[tokio::test]
async fn test_default_collaborators_use_configured_paths() {
    let dir = tempfile::tempdir().unwrap();
    let identity_path = dir.path().join("identity").join("device_id");
    let cache_dir = dir.path().join("media");

    let backend = Arc::new(InMemoryBackend::new());
    let player = SignagePlayer::builder(
        PlayerConfig::default()
            .with_playback(PlaybackConfig::windowed())
            .with_identity_path(&identity_path)
            .with_cache_dir(&cache_dir),
    )
    .with_backend(backend.clone())
    .with_fetcher(fixture_fetcher())
    .start(Arc::new(RecordingSurface::new()))
    .await
    .unwrap();

    let persisted = DeviceIdentity::load_or_create(&identity_path).unwrap();
    assert_eq!(persisted.id(), player.device_id());
    assert!(cache_dir.is_dir());

    let status = wait_for(player.watch_status(), |s| s.pairing_code().is_some()).await;
    let code = status.pairing_code().unwrap().to_string();
    assert_eq!(code.len(), 6);
    assert!(backend.screen(player.device_id()).is_some());

    player.shutdown().await.unwrap();
}
