use thiserror::Error;

/// Failures reported by a [`MediaSurface`](crate::MediaSurface)
///
/// None of these leave the scheduler; each one is localized to the item being
/// displayed and recovered by advancing past it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlaybackError {
    /// The platform refused to start playback without a user gesture
    #[error("Autoplay rejected")]
    AutoplayRejected,

    /// The media could not be loaded or decoded
    #[error("Failed to load {src}: {reason}")]
    Media { src: String, reason: String },

    /// Fullscreen was denied
    #[error("Fullscreen request denied: {0}")]
    Fullscreen(String),

    #[error("Surface error: {0}")]
    Surface(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The scheduler task panicked or was cancelled
    #[error("Scheduler task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, PlaybackError>;
