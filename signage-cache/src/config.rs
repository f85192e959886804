//! Cache manager configuration

use std::time::Duration;

use crate::error::{CacheError, Result};

/// Settings for [`CacheManager`](crate::CacheManager) and [`HttpFetcher`](crate::HttpFetcher)
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of playlist items processed concurrently
    pub max_concurrent_downloads: usize,

    /// Timeout for a single media download
    pub download_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: 3,
            download_timeout: Duration::from_secs(120),
        }
    }
}

impl CacheConfig {
    /// One download at a time, for links that choke on parallel transfers
    pub fn sequential() -> Self {
        Self {
            max_concurrent_downloads: 1,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_downloads == 0 {
            return Err(CacheError::Configuration(
                "Max concurrent downloads must be greater than 0".to_string(),
            ));
        }

        if self.download_timeout.is_zero() {
            return Err(CacheError::Configuration(
                "Download timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn with_max_concurrent_downloads(mut self, max: usize) -> Self {
        self.max_concurrent_downloads = max;
        self
    }

    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.max_concurrent_downloads, 3);
        assert!(config.validate().is_ok());
        assert_eq!(CacheConfig::sequential().max_concurrent_downloads, 1);
    }

    #[test]
    fn test_config_validation() {
        let config = CacheConfig::default().with_max_concurrent_downloads(0);
        assert!(config.validate().is_err());

        let config = CacheConfig::default().with_download_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }
}
