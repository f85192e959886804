//! Shared fixtures for cache integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use signage_api::{MediaItem, Playlist, PlaylistId};
use signage_cache::{CacheConfig, CacheManager, MemoryCacheStore, StaticFetcher};

pub const IMG_A: &str = "https://cdn.example.com/a.jpg";
pub const IMG_B: &str = "https://cdn.example.com/b.jpg";
pub const VID_C: &str = "https://cdn.example.com/c.mp4";
pub const IMG_D: &str = "https://cdn.example.com/d.jpg";

pub fn playlist(id: &str, items: Vec<MediaItem>) -> Playlist {
    Playlist {
        id: PlaylistId::new(id),
        name: Some(format!("{} loop", id)),
        updated_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        items,
    }
}

/// Fetcher serving every fixture URL.
pub fn fetcher() -> Arc<StaticFetcher> {
    let fetcher = Arc::new(StaticFetcher::new());
    fetcher.insert(IMG_A, &b"image-a"[..]);
    fetcher.insert(IMG_B, &b"image-b"[..]);
    fetcher.insert(VID_C, &b"video-c"[..]);
    fetcher.insert(IMG_D, &b"image-d"[..]);
    fetcher
}

pub struct Harness {
    pub store: Arc<MemoryCacheStore>,
    pub fetcher: Arc<StaticFetcher>,
    pub manager: CacheManager,
}

pub fn harness_with(store: MemoryCacheStore, fetcher: Arc<StaticFetcher>) -> Harness {
    let store = Arc::new(store);
    let manager = CacheManager::new(store.clone(), fetcher.clone(), CacheConfig::default())
        .expect("valid config");
    Harness {
        store,
        fetcher,
        manager,
    }
}

pub fn harness() -> Harness {
    harness_with(MemoryCacheStore::new(), fetcher())
}

/// Progress callback that records every report.
pub fn progress_recorder() -> (
    Arc<Mutex<Vec<(usize, usize)>>>,
    impl Fn(usize, usize) + Send + Sync,
) {
    let reports = Arc::new(Mutex::new(Vec::new()));
    let sink = reports.clone();
    (reports, move |done, total| {
        sink.lock().unwrap().push((done, total))
    })
}

pub fn sorted(mut keys: Vec<String>) -> Vec<String> {
    keys.sort();
    keys
}
