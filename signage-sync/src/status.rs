//! Observable synchronizer state.

use signage_api::PlaylistId;

/// Where the synchronizer currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    /// Initial lookup not yet completed. Carries the last startup failure, if any.
    Loading { last_error: Option<String> },
    /// Waiting for an operator to enter the pairing code.
    Pairing { code: Option<String> },
    /// Paired. `playlist_id` is the assigned playlist, if any.
    Active { playlist_id: Option<PlaylistId> },
    /// The backend schema is incompatible. Synchronization has stopped.
    SchemaError { message: String },
}

impl SyncStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, SyncStatus::Active { .. })
    }

    pub fn pairing_code(&self) -> Option<&str> {
        match self {
            SyncStatus::Pairing { code } => code.as_deref(),
            _ => None,
        }
    }
}

impl Default for SyncStatus {
    fn default() -> Self {
        SyncStatus::Loading { last_error: None }
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStatus::Loading { last_error: None } => write!(f, "loading"),
            SyncStatus::Loading {
                last_error: Some(error),
            } => write!(f, "loading (last error: {})", error),
            SyncStatus::Pairing { code: Some(code) } => write!(f, "pairing ({})", code),
            SyncStatus::Pairing { code: None } => write!(f, "pairing"),
            SyncStatus::Active {
                playlist_id: Some(id),
            } => write!(f, "active ({})", id),
            SyncStatus::Active { playlist_id: None } => write!(f, "active (no playlist)"),
            SyncStatus::SchemaError { message } => write!(f, "schema error: {}", message),
        }
    }
}

/// Download progress of one resync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncProgress {
    /// Resync this report belongs to
    pub generation: u64,
    pub playlist_id: PlaylistId,
    pub completed: usize,
    pub total: usize,
}

impl SyncProgress {
    /// Completion in whole percent. An empty playlist is immediately complete.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.completed.min(self.total) * 100) / self.total) as u8
    }

    pub fn is_complete(&self) -> bool {
        self.completed >= self.total
    }
}
