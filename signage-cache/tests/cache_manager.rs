//! Materialization and eviction behaviour of the cache manager

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use signage_api::MediaItem;
use signage_cache::{CacheConfig, CacheManager, CacheStore, MemoryCacheStore, StaticFetcher};

#[tokio::test]
async fn test_materialize_resolves_every_remote_item() {
    let h = harness();
    let p = playlist(
        "PL1",
        vec![
            MediaItem::image(IMG_A, 5),
            MediaItem::video(VID_C),
            MediaItem::image(IMG_B, 5),
        ],
    );

    let materialized = h.manager.materialize(&p, |_, _| {}).await;

    assert_eq!(materialized.playlist_id, p.id);
    assert_eq!(materialized.updated_at, p.updated_at);
    assert_eq!(materialized.len(), 3);
    for (item, original) in materialized.items.iter().zip(&p.items) {
        assert_eq!(item.url, original.url);
        assert_eq!(
            item.resolved_src.as_deref(),
            Some(h.store.local_address(&original.url).as_str())
        );
    }
    assert_eq!(h.manager.stats().downloads, 3);
}

#[tokio::test]
async fn test_second_materialize_is_idempotent() {
    let h = harness();
    let p = playlist(
        "PL1",
        vec![MediaItem::image(IMG_A, 5), MediaItem::video(VID_C)],
    );

    let first = h.manager.materialize(&p, |_, _| {}).await;
    let evicted = h.manager.evict_unused(&first).await.unwrap();
    assert_eq!(evicted, 0);
    let keys_before = sorted(h.store.keys().await.unwrap());
    let fetches_before = h.fetcher.total_fetches();

    let second = h.manager.materialize(&p, |_, _| {}).await;
    let evicted = h.manager.evict_unused(&second).await.unwrap();

    assert_eq!(h.fetcher.total_fetches(), fetches_before);
    assert_eq!(evicted, 0);
    assert_eq!(sorted(h.store.keys().await.unwrap()), keys_before);
    assert_eq!(first, second);

    let stats = h.manager.stats();
    assert_eq!(stats.downloads, 2);
    assert_eq!(stats.hits, 2);
}

#[tokio::test]
async fn test_evict_unused_keeps_exactly_current_urls() {
    let h = harness();
    let old = playlist(
        "PL1",
        vec![MediaItem::image(IMG_A, 5), MediaItem::image(IMG_B, 5)],
    );
    let new = playlist(
        "PL2",
        vec![
            MediaItem::image(IMG_B, 5),
            MediaItem::video(VID_C),
            MediaItem::image("blob:https://app.example.com/local", 5),
        ],
    );

    h.manager.materialize(&old, |_, _| {}).await;
    let materialized = h.manager.materialize(&new, |_, _| {}).await;
    let evicted = h.manager.evict_unused(&materialized).await.unwrap();

    assert_eq!(evicted, 1);
    assert_eq!(
        sorted(h.store.keys().await.unwrap()),
        vec![IMG_B.to_string(), VID_C.to_string()]
    );
    assert_eq!(h.manager.stats().evicted, 1);
}

#[tokio::test]
async fn test_evict_all_empties_store() {
    let h = harness();
    let p = playlist(
        "PL1",
        vec![MediaItem::image(IMG_A, 5), MediaItem::image(IMG_B, 5)],
    );
    h.manager.materialize(&p, |_, _| {}).await;

    assert_eq!(h.manager.evict_all().await.unwrap(), 2);
    assert!(h.store.keys().await.unwrap().is_empty());
    assert_eq!(h.manager.evict_all().await.unwrap(), 0);
}

#[tokio::test]
async fn test_failing_item_falls_back_and_progress_completes() {
    let h = harness();
    let missing = "https://cdn.example.com/missing.jpg";
    let p = playlist(
        "PL1",
        vec![
            MediaItem::image(IMG_A, 5),
            MediaItem::image(missing, 5),
            MediaItem::image(IMG_B, 5),
        ],
    );
    let (reports, on_progress) = progress_recorder();

    let materialized = h.manager.materialize(&p, on_progress).await;

    assert_eq!(materialized.items[1].resolved_src.as_deref(), Some(missing));
    assert_ne!(materialized.items[0].resolved_src.as_deref(), Some(IMG_A));

    let reports = reports.lock().unwrap().clone();
    assert_eq!(reports.first(), Some(&(0, 3)));
    assert_eq!(reports.last(), Some(&(3, 3)));
    assert_eq!(reports.len(), 4);
    assert!(reports.windows(2).all(|w| w[0].0 < w[1].0));

    assert_eq!(h.manager.stats().failures, 1);
    assert!(!h.store.contains(missing).await.unwrap());
}

#[tokio::test]
async fn test_empty_playlist_reports_complete_immediately() {
    let h = harness();
    let (reports, on_progress) = progress_recorder();

    let materialized = h.manager.materialize(&playlist("PL1", vec![]), on_progress).await;

    assert!(materialized.is_empty());
    assert_eq!(*reports.lock().unwrap(), vec![(0, 0)]);
    assert_eq!(h.fetcher.total_fetches(), 0);
}

#[tokio::test]
async fn test_non_remote_addresses_pass_through() {
    let h = harness();
    let addresses = [
        "blob:https://app.example.com/8c1f",
        "file:///media/local.jpg",
        "data:image/png;base64,iVBORw0KGgo=",
        "",
    ];
    let p = playlist(
        "PL1",
        addresses.iter().map(|a| MediaItem::image(*a, 5)).collect(),
    );

    let materialized = h.manager.materialize(&p, |_, _| {}).await;

    for (item, address) in materialized.items.iter().zip(addresses) {
        assert_eq!(item.resolved_src.as_deref(), Some(address));
    }
    assert_eq!(h.fetcher.total_fetches(), 0);
    assert!(h.store.keys().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_quota_exceeded_falls_back_to_remote() {
    let h = harness_with(MemoryCacheStore::with_quota(10), fetcher());
    let p = playlist(
        "PL1",
        vec![MediaItem::image(IMG_A, 5), MediaItem::image(IMG_B, 5)],
    );

    let materialized = h.manager.materialize(&p, |_, _| {}).await;

    let remote_fallbacks = materialized
        .items
        .iter()
        .filter(|item| item.resolved_src.as_deref() == Some(item.url.as_str()))
        .count();
    assert_eq!(remote_fallbacks, 1);
    assert_eq!(h.manager.stats().failures, 1);
    assert_eq!(h.store.keys().await.unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_materializations_share_downloads() {
    let fetcher = Arc::new(StaticFetcher::new());
    fetcher.insert_with_latency(IMG_A, &b"a"[..], Duration::from_secs(2));
    fetcher.insert_with_latency(VID_C, &b"c"[..], Duration::from_secs(4));
    let h = harness_with(MemoryCacheStore::new(), fetcher);

    let p1 = playlist("PL1", vec![MediaItem::image(IMG_A, 5), MediaItem::video(VID_C)]);
    let p2 = playlist("PL2", vec![MediaItem::video(VID_C), MediaItem::image(IMG_A, 5)]);

    let (m1, m2) = tokio::join!(
        h.manager.materialize(&p1, |_, _| {}),
        h.manager.materialize(&p2, |_, _| {}),
    );

    assert_eq!(h.fetcher.fetch_count(IMG_A), 1);
    assert_eq!(h.fetcher.fetch_count(VID_C), 1);
    assert_eq!(m1.items[0].resolved_src, m2.items[1].resolved_src);
    assert_eq!(h.manager.stats().downloads, 2);
}

#[tokio::test(start_paused = true)]
async fn test_output_order_matches_input_despite_latency() {
    let fetcher = Arc::new(StaticFetcher::new());
    fetcher.insert_with_latency(IMG_A, &b"a"[..], Duration::from_secs(5));
    fetcher.insert_with_latency(IMG_B, &b"b"[..], Duration::from_secs(1));
    fetcher.insert_with_latency(VID_C, &b"c"[..], Duration::from_secs(3));
    let h = harness_with(MemoryCacheStore::new(), fetcher);

    let p = playlist(
        "PL1",
        vec![
            MediaItem::image(IMG_A, 5),
            MediaItem::image(IMG_B, 5),
            MediaItem::video(VID_C),
        ],
    );
    let materialized = h.manager.materialize(&p, |_, _| {}).await;

    let urls: Vec<&str> = materialized.items.iter().map(|i| i.url.as_str()).collect();
    assert_eq!(urls, vec![IMG_A, IMG_B, VID_C]);
}

#[tokio::test(start_paused = true)]
async fn test_download_concurrency_is_bounded() {
    let fetcher = Arc::new(StaticFetcher::new());
    for url in [IMG_A, IMG_B, VID_C, IMG_D] {
        fetcher.insert_with_latency(url, &b"x"[..], Duration::from_secs(1));
    }
    let store = Arc::new(MemoryCacheStore::new());
    let manager = CacheManager::new(
        store,
        fetcher,
        CacheConfig::default().with_max_concurrent_downloads(2),
    )
    .unwrap();
    let p = playlist(
        "PL1",
        [IMG_A, IMG_B, VID_C, IMG_D]
            .iter()
            .map(|u| MediaItem::image(*u, 5))
            .collect(),
    );

    let start = tokio::time::Instant::now();
    manager.materialize(&p, |_, _| {}).await;

    // Four one-second downloads, two at a time.
    assert!(start.elapsed() >= Duration::from_secs(2));
    assert!(start.elapsed() < Duration::from_secs(4));
}

#[test]
fn test_zero_concurrency_is_rejected() {
    let result = CacheManager::new(
        Arc::new(MemoryCacheStore::new()),
        Arc::new(StaticFetcher::new()),
        CacheConfig::default().with_max_concurrent_downloads(0),
    );
    assert!(result.is_err());
}
