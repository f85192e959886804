use thiserror::Error;

/// Errors raised while fetching or storing media
#[derive(Debug, Error)]
pub enum CacheError {
    /// The download itself failed (connection, timeout, truncated body)
    #[error("Failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    /// The origin answered with a non-success status
    #[error("Fetching {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    /// The store has no room for the blob
    #[error("Cache quota exceeded: need {needed} bytes, {available} available")]
    QuotaExceeded { needed: u64, available: u64 },

    /// The store rejected the operation
    #[error("Store error: {0}")]
    Store(String),

    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, CacheError>;
