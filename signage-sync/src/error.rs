use thiserror::Error;

/// Errors surfaced by the synchronizer's public API
///
/// Failures inside the reconciliation loop are never returned here; they are
/// logged and reflected in [`SyncStatus`](crate::SyncStatus).
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The reconciliation task panicked or was cancelled
    #[error("Synchronizer task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_error_display() {
        let error = SyncError::Configuration("Heartbeat interval must be greater than 0".into());
        assert_eq!(
            error.to_string(),
            "Configuration error: Heartbeat interval must be greater than 0"
        );
    }
}
