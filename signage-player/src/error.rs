use thiserror::Error;

use crate::logging::LoggingError;

#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("Backend error: {0}")]
    Backend(#[from] signage_api::BackendError),

    #[error("Device identity error: {0}")]
    Identity(#[from] signage_api::IdentityError),

    #[error("Cache error: {0}")]
    Cache(#[from] signage_cache::CacheError),

    #[error("Synchronizer error: {0}")]
    Sync(#[from] signage_sync::SyncError),

    #[error("Playback error: {0}")]
    Playback(#[from] signage_playback::PlaybackError),

    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, PlayerError>;
