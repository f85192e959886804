//! Media fetchers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tracing::debug;

use crate::config::CacheConfig;
use crate::error::{CacheError, Result};

/// Source of media bytes for a remote URL.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Download the full body of `url`. Non-success statuses are errors.
    async fn fetch(&self, url: &str) -> Result<Bytes>;
}

/// [`MediaFetcher`] over HTTP(S).
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(config: &CacheConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.download_timeout)
            .build()
            .map_err(|e| {
                CacheError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;
        Ok(Self { client })
    }

    /// Use an existing client, e.g. one shared with the backend.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MediaFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        let fetch_error = |e: reqwest::Error| CacheError::Fetch {
            url: url.to_string(),
            message: e.to_string(),
        };

        let response = self.client.get(url).send().await.map_err(fetch_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(CacheError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await.map_err(fetch_error)?;
        debug!(url, bytes = body.len(), "Downloaded media");
        Ok(body)
    }
}

struct StaticEntry {
    body: Bytes,
    latency: Duration,
}

/// In-process [`MediaFetcher`] serving registered bodies.
///
/// Unregistered URLs answer 404. Each entry may carry an artificial latency,
/// which makes download ordering and overlap observable under paused time.
#[derive(Default)]
pub struct StaticFetcher {
    entries: Mutex<HashMap<String, StaticEntry>>,
    fetches: Mutex<HashMap<String, usize>>,
    total: AtomicUsize,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: impl Into<String>, body: impl Into<Bytes>) {
        self.insert_with_latency(url, body, Duration::ZERO);
    }

    pub fn insert_with_latency(
        &self,
        url: impl Into<String>,
        body: impl Into<Bytes>,
        latency: Duration,
    ) {
        self.entries.lock().insert(
            url.into(),
            StaticEntry {
                body: body.into(),
                latency,
            },
        );
    }

    pub fn remove(&self, url: &str) {
        self.entries.lock().remove(url);
    }

    /// Number of fetches issued for `url`, successful or not.
    pub fn fetch_count(&self, url: &str) -> usize {
        self.fetches.lock().get(url).copied().unwrap_or(0)
    }

    /// Number of fetches issued for any URL.
    pub fn total_fetches(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        self.total.fetch_add(1, Ordering::SeqCst);
        *self.fetches.lock().entry(url.to_string()).or_insert(0) += 1;

        let entry = self
            .entries
            .lock()
            .get(url)
            .map(|entry| (entry.body.clone(), entry.latency));

        let Some((body, latency)) = entry else {
            return Err(CacheError::HttpStatus {
                url: url.to_string(),
                status: 404,
            });
        };

        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        Ok(body)
    }
}
