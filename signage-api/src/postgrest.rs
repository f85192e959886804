//! HTTP backend speaking the PostgREST dialect.
//!
//! Rows live under `/rest/v1/<table>`, filtered with `?id=eq.<id>`.
//!
//! This backend has no push support. Both subscribe calls report
//! [`BackendError::SubscriptionUnavailable`], so a device running on it sees
//! assignment and playlist changes only on the next screen or playlist poll
//! (60 s by default). Only [`InMemoryBackend`](crate::InMemoryBackend) delivers
//! live row changes.
//!
//! TODO: subscribe to `screens` and `playlists` updates over the service's
//! realtime websocket.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::backend::{Backend, ChangeStream};
use crate::config::BackendConfig;
use crate::error::{BackendError, Result};
use crate::model::{DeviceId, Playlist, PlaylistId, Screen};

const SCREENS: &str = "screens";
const PLAYLISTS: &str = "playlists";

/// Error codes that mean the tables or columns this player expects are missing.
const SCHEMA_ERROR_CODES: &[&str] = &["42703", "42P01", "PGRST204", "PGRST205"];

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// [`Backend`] over HTTP.
pub struct PostgrestBackend {
    client: reqwest::Client,
    config: BackendConfig,
}

impl PostgrestBackend {
    pub fn new(config: BackendConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                BackendError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.config.url.trim_end_matches('/'), table)
    }

    fn request(&self, method: reqwest::Method, table: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.table_url(table))
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
    }

    async fn fetch_one<T: DeserializeOwned>(&self, table: &str, id: &str) -> Result<Option<T>> {
        let response = self
            .request(reqwest::Method::GET, table)
            .query(&[("id", format!("eq.{}", id)), ("select", "*".to_string())])
            .send()
            .await?;

        let mut rows: Vec<T> = decode(response).await?;
        debug!(table, id, rows = rows.len(), "Fetched rows");
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.swap_remove(0))
        })
    }
}

/// Turn a response into rows, mapping error bodies onto [`BackendError`].
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }

    let body = response.text().await.unwrap_or_default();
    Err(classify_error(status.as_u16(), &body))
}

fn classify_error(status: u16, body: &str) -> BackendError {
    let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();
    let (code, message) = match parsed {
        Some(ErrorBody { code, message }) => (code, message.unwrap_or_else(|| body.to_string())),
        None => (None, body.to_string()),
    };

    match code {
        Some(code) if SCHEMA_ERROR_CODES.contains(&code.as_str()) => {
            BackendError::SchemaMismatch(format!("{} ({})", message, code))
        }
        _ => BackendError::Status { status, message },
    }
}

#[async_trait]
impl Backend for PostgrestBackend {
    async fn fetch_screen(&self, id: &DeviceId) -> Result<Option<Screen>> {
        self.fetch_one(SCREENS, id.as_str()).await
    }

    async fn upsert_screen(&self, screen: &Screen) -> Result<Screen> {
        let response = self
            .request(reqwest::Method::POST, SCREENS)
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&[screen])
            .send()
            .await?;

        let mut rows: Vec<Screen> = decode(response).await?;
        if rows.is_empty() {
            return Err(BackendError::Decode(
                "Upsert returned no representation".to_string(),
            ));
        }
        Ok(rows.swap_remove(0))
    }

    async fn touch_screen(&self, id: &DeviceId, at: DateTime<Utc>) -> Result<()> {
        let response = self
            .request(reqwest::Method::PATCH, SCREENS)
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=minimal")
            .json(&serde_json::json!({ "last_ping": at }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(classify_error(status.as_u16(), &body))
        }
    }

    async fn fetch_playlist(&self, id: &PlaylistId) -> Result<Option<Playlist>> {
        self.fetch_one(PLAYLISTS, id.as_str()).await
    }

    async fn subscribe_screen(&self, id: &DeviceId) -> Result<ChangeStream<Screen>> {
        warn!(screen = %id, "Live screen updates unavailable over REST; relying on polling");
        Err(BackendError::SubscriptionUnavailable(
            "REST backend has no realtime channel".to_string(),
        ))
    }

    async fn subscribe_playlist(&self, id: &PlaylistId) -> Result<ChangeStream<Playlist>> {
        debug!(playlist = %id, "Live playlist updates unavailable over REST");
        Err(BackendError::SubscriptionUnavailable(
            "REST backend has no realtime channel".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("42703", true)]
    #[case("42P01", true)]
    #[case("PGRST204", true)]
    #[case("PGRST205", true)]
    #[case("PGRST116", false)]
    #[case("23505", false)]
    fn test_classify_error_codes(#[case] code: &str, #[case] schema: bool) {
        let body = format!(r#"{{"code":"{}","message":"boom","details":null,"hint":null}}"#, code);
        let error = classify_error(400, &body);
        assert_eq!(error.is_schema_mismatch(), schema);
    }

    #[test]
    fn test_classify_plain_text_error() {
        let error = classify_error(502, "Bad Gateway");
        match error {
            BackendError::Status { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "Bad Gateway");
            }
            other => panic!("Expected status error, got {:?}", other),
        }
    }

    #[test]
    fn test_table_url_trims_trailing_slash() {
        let backend =
            PostgrestBackend::new(BackendConfig::new("https://project.example.co/", "k")).unwrap();
        assert_eq!(
            backend.table_url(SCREENS),
            "https://project.example.co/rest/v1/screens"
        );
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        assert!(PostgrestBackend::new(BackendConfig::new("nope", "k")).is_err());
    }
}
