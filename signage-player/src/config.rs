//! Player configuration
//!
//! Aggregates the per-crate configurations and adds the two local paths the
//! player owns: the device identity file and the media cache directory.

use std::path::PathBuf;

use signage_api::{BackendConfig, DeviceIdentity};
use signage_cache::CacheConfig;
use signage_playback::PlaybackConfig;
use signage_sync::SyncConfig;

use crate::error::{PlayerError, Result};

/// Environment variable overriding the media cache directory
pub const CACHE_DIR_ENV: &str = "SIGNAGE_CACHE_DIR";

/// Environment variable overriding the device identity file
pub const IDENTITY_PATH_ENV: &str = "SIGNAGE_IDENTITY_PATH";

/// Everything needed to start a [`SignagePlayer`](crate::SignagePlayer)
#[derive(Debug, Clone, Default)]
pub struct PlayerConfig {
    pub backend: BackendConfig,
    pub sync: SyncConfig,
    pub cache: CacheConfig,
    pub playback: PlaybackConfig,

    /// Media cache directory; defaults to `<cache dir>/signage-player/media`
    pub cache_dir: Option<PathBuf>,

    /// Device identity file; defaults to `<data dir>/signage-player/device_id`
    pub identity_path: Option<PathBuf>,
}

impl PlayerConfig {
    /// Read the backend settings and path overrides from the environment.
    ///
    /// `SIGNAGE_BACKEND_URL` is required; everything else is optional.
    pub fn from_env() -> Result<Self> {
        let backend = BackendConfig::from_env()?;
        let mut config = Self {
            backend,
            ..Default::default()
        };

        if let Some(dir) = std::env::var_os(CACHE_DIR_ENV) {
            config.cache_dir = Some(PathBuf::from(dir));
        }
        if let Some(path) = std::env::var_os(IDENTITY_PATH_ENV) {
            config.identity_path = Some(PathBuf::from(path));
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.backend.validate()?;
        self.sync.validate()?;
        self.cache.validate()?;
        self.playback.validate()?;

        for (name, path) in [
            ("Cache directory", &self.cache_dir),
            ("Identity path", &self.identity_path),
        ] {
            if path.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
                return Err(PlayerError::Configuration(format!(
                    "{} must not be empty",
                    name
                )));
            }
        }

        Ok(())
    }

    /// The configured cache directory, or the platform default.
    pub fn resolved_cache_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.cache_dir {
            return Ok(dir.clone());
        }
        dirs::cache_dir()
            .map(|dir| dir.join("signage-player").join("media"))
            .ok_or_else(|| {
                PlayerError::Configuration("No platform cache directory available".to_string())
            })
    }

    /// The configured identity file, or the platform default.
    pub fn resolved_identity_path(&self) -> Result<PathBuf> {
        match &self.identity_path {
            Some(path) => Ok(path.clone()),
            None => Ok(DeviceIdentity::default_path()?),
        }
    }

    pub fn with_backend(mut self, backend: BackendConfig) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_sync(mut self, sync: SyncConfig) -> Self {
        self.sync = sync;
        self
    }

    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_playback(mut self, playback: PlaybackConfig) -> Self {
        self.playback = playback;
        self
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn with_identity_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.identity_path = Some(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_config_is_valid() {
        assert!(PlayerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_nested_errors_are_reported() {
        let config = PlayerConfig::default()
            .with_sync(SyncConfig::default().with_heartbeat_interval(Duration::ZERO));
        assert!(matches!(config.validate(), Err(PlayerError::Sync(_))));

        let config = PlayerConfig::default().with_backend(BackendConfig::new("ftp://x", ""));
        assert!(matches!(config.validate(), Err(PlayerError::Backend(_))));
    }

    #[test]
    fn test_empty_paths_rejected() {
        let config = PlayerConfig::default().with_cache_dir("");
        assert!(matches!(
            config.validate(),
            Err(PlayerError::Configuration(_))
        ));
    }

    #[test]
    fn test_explicit_paths_win() {
        let config = PlayerConfig::default()
            .with_cache_dir("/var/lib/signage/media")
            .with_identity_path("/var/lib/signage/device_id");

        assert_eq!(
            config.resolved_cache_dir().unwrap(),
            PathBuf::from("/var/lib/signage/media")
        );
        assert_eq!(
            config.resolved_identity_path().unwrap(),
            PathBuf::from("/var/lib/signage/device_id")
        );
    }
}
