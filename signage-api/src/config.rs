//! Configuration for the HTTP backend

use std::time::Duration;

use crate::error::{BackendError, Result};

/// Environment variable holding the backend base URL
pub const BACKEND_URL_ENV: &str = "SIGNAGE_BACKEND_URL";

/// Environment variable holding the backend API key
pub const BACKEND_KEY_ENV: &str = "SIGNAGE_BACKEND_KEY";

/// Connection settings for [`PostgrestBackend`](crate::PostgrestBackend)
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL of the project, e.g. `https://xyz.example.co`
    pub url: String,

    /// Anonymous API key; sent as both `apikey` and bearer token
    pub api_key: String,

    /// Per-request timeout applied by the HTTP client
    pub request_timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:54321".to_string(),
            api_key: String::new(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl BackendConfig {
    /// Build a configuration for the given project URL and key
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// Read `SIGNAGE_BACKEND_URL` and `SIGNAGE_BACKEND_KEY`
    pub fn from_env() -> Result<Self> {
        let url = std::env::var(BACKEND_URL_ENV).map_err(|_| {
            BackendError::Configuration(format!("{} is not set", BACKEND_URL_ENV))
        })?;
        let api_key = std::env::var(BACKEND_KEY_ENV).unwrap_or_default();

        let config = Self::new(url, api_key);
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let parsed = url::Url::parse(&self.url)
            .map_err(|e| BackendError::Configuration(format!("Invalid backend URL: {}", e)))?;

        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(BackendError::Configuration(format!(
                "Backend URL must be http or https, got {}",
                parsed.scheme()
            )));
        }

        if self.request_timeout.is_zero() {
            return Err(BackendError::Configuration(
                "Request timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
