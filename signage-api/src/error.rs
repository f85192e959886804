use thiserror::Error;

/// Errors returned by a [`Backend`](crate::Backend) implementation
///
/// The synchronizer only distinguishes two classes: schema mismatches, which are
/// fatal to synchronization, and everything else, which is treated as transient.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Network communication error (connection refused, DNS, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// The backend answered with a non-success status
    #[error("Backend returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// The backend schema does not match what the player expects
    ///
    /// Missing tables or columns. Requires operator intervention.
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A row could not be decoded into the expected shape
    #[error("Decode error: {0}")]
    Decode(String),

    /// Live subscriptions are not offered by this backend
    #[error("Live subscription unavailable: {0}")]
    SubscriptionUnavailable(String),

    /// Invalid backend configuration
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl BackendError {
    /// Whether this error signals an unrecoverable schema incompatibility
    pub fn is_schema_mismatch(&self) -> bool {
        matches!(self, BackendError::SchemaMismatch(_))
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            BackendError::Decode(error.to_string())
        } else {
            BackendError::Network(error.to_string())
        }
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(error: serde_json::Error) -> Self {
        BackendError::Decode(error.to_string())
    }
}

/// Result type for backend operations
pub type Result<T> = std::result::Result<T, BackendError>;
