//! Shared harness for synchronizer integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use signage_api::{
    DeviceId, InMemoryBackend, MaterializedPlaylist, MediaItem, Playlist, PlaylistId, Screen,
    ScreenStatus,
};
use signage_cache::{CacheConfig, CacheManager, MemoryCacheStore, StaticFetcher};
use signage_sync::{ScreenSynchronizer, SyncConfig, SyncHandle, SyncStatus};
use tokio::sync::watch;

pub const IMG_A: &str = "https://cdn.example.com/a.jpg";
pub const IMG_B: &str = "https://cdn.example.com/b.jpg";
pub const VID_C: &str = "https://cdn.example.com/c.mp4";
pub const SLOW: &str = "https://cdn.example.com/slow.mp4";

pub fn device() -> DeviceId {
    DeviceId::new("D1")
}

pub fn at(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 9, minute, 0).unwrap()
}

pub fn playlist(id: &str, updated_at: DateTime<Utc>, items: Vec<MediaItem>) -> Playlist {
    Playlist {
        id: PlaylistId::new(id),
        name: Some(id.to_string()),
        updated_at,
        items,
    }
}

pub fn online_screen(playlist_id: Option<&str>) -> Screen {
    Screen {
        id: device(),
        name: Some("Lobby".to_string()),
        status: ScreenStatus::Online,
        pairing_code: None,
        assigned_to: Some("op1".to_string()),
        playlist_id: playlist_id.map(PlaylistId::new),
        last_ping: None,
    }
}

/// Pairing codes `CODE01`, `CODE02`, ... in call order.
pub fn sequential_codes() -> impl Fn() -> String + Send + Sync + 'static {
    let issued = AtomicUsize::new(0);
    move || format!("CODE{:02}", issued.fetch_add(1, Ordering::SeqCst) + 1)
}

pub fn fixture_fetcher() -> Arc<StaticFetcher> {
    let fetcher = Arc::new(StaticFetcher::new());
    fetcher.insert(IMG_A, &b"image-a"[..]);
    fetcher.insert(IMG_B, &b"image-b"[..]);
    fetcher.insert(VID_C, &b"video-c"[..]);
    fetcher.insert_with_latency(SLOW, &b"slow"[..], Duration::from_secs(10));
    fetcher
}

/// Route reconciler logs to the test output. Filter with `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct Harness {
    pub backend: Arc<InMemoryBackend>,
    pub fetcher: Arc<StaticFetcher>,
    pub store: Arc<MemoryCacheStore>,
    pub cache: Arc<CacheManager>,
    pub handle: SyncHandle,
}

impl Harness {
    pub fn start(backend: Arc<InMemoryBackend>) -> Self {
        Self::start_with(backend, fixture_fetcher())
    }

    pub fn start_with(backend: Arc<InMemoryBackend>, fetcher: Arc<StaticFetcher>) -> Self {
        init_tracing();
        let store = Arc::new(MemoryCacheStore::new());
        let cache = Arc::new(
            CacheManager::new(store.clone(), fetcher.clone(), CacheConfig::default())
                .expect("valid cache config"),
        );
        let handle = ScreenSynchronizer::new(
            device(),
            backend.clone(),
            cache.clone(),
            SyncConfig::default(),
        )
        .with_code_generator(sequential_codes())
        .start()
        .expect("valid sync config");

        Self {
            backend,
            fetcher,
            store,
            cache,
            handle,
        }
    }

    pub async fn wait_for_status(&self, predicate: impl Fn(&SyncStatus) -> bool) -> SyncStatus {
        wait_until(self.handle.watch_status(), Duration::from_secs(600), predicate).await
    }

    pub async fn wait_for_playlist(
        &self,
        predicate: impl Fn(&Option<Arc<MaterializedPlaylist>>) -> bool,
    ) -> Option<Arc<MaterializedPlaylist>> {
        wait_until(self.handle.watch_playlist(), Duration::from_secs(600), predicate).await
    }

    pub async fn wait_for_playlist_id(&self, id: &str) -> Arc<MaterializedPlaylist> {
        let id = PlaylistId::new(id);
        self.wait_for_playlist(|p| p.as_ref().is_some_and(|p| p.playlist_id == id))
            .await
            .expect("playlist published")
    }

    pub async fn store_keys(&self) -> Vec<String> {
        use signage_cache::CacheStore;
        let mut keys = self.store.keys().await.expect("memory store keys");
        keys.sort();
        keys
    }
}

/// Wait until the watched value satisfies `predicate`, panicking after `limit`.
pub async fn wait_until<T: Clone>(
    mut rx: watch::Receiver<T>,
    limit: Duration,
    predicate: impl Fn(&T) -> bool,
) -> T {
    let wait = async {
        loop {
            {
                let value = rx.borrow_and_update();
                if predicate(&*value) {
                    return value.clone();
                }
            }
            if rx.changed().await.is_err() {
                let value = rx.borrow().clone();
                assert!(predicate(&value), "sender dropped before condition held");
                return value;
            }
        }
    };
    tokio::time::timeout(limit, wait)
        .await
        .expect("condition not reached in time")
}

/// Let every runnable task go idle. Under paused time this only moves the clock
/// by a millisecond, well short of any source interval.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

pub fn sorted(urls: &[&str]) -> Vec<String> {
    let mut urls: Vec<String> = urls.iter().map(|u| u.to_string()).collect();
    urls.sort();
    urls
}
