//! Scheduler timing configuration

use std::time::Duration;

use crate::error::{PlaybackError, Result};

/// Timing and permission behaviour of the playback scheduler
#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    /// Display time for images without a positive `duration`
    pub default_image_duration: Duration,

    /// Delay before moving past an item that failed to display
    pub failure_advance_delay: Duration,

    /// Delay before the first fullscreen request
    pub fullscreen_delay: Duration,

    /// Whether to ask the surface for fullscreen at all
    pub request_fullscreen: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            default_image_duration: Duration::from_secs(10),
            failure_advance_delay: Duration::from_secs(1),
            fullscreen_delay: Duration::from_secs(1),
            request_fullscreen: true,
        }
    }
}

impl PlaybackConfig {
    /// Windowed playback, for development machines
    pub fn windowed() -> Self {
        Self {
            request_fullscreen: false,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_image_duration.is_zero() {
            return Err(PlaybackError::Configuration(
                "Default image duration must be greater than 0".to_string(),
            ));
        }
        if self.failure_advance_delay.is_zero() {
            return Err(PlaybackError::Configuration(
                "Failure advance delay must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_default_image_duration(mut self, duration: Duration) -> Self {
        self.default_image_duration = duration;
        self
    }

    pub fn with_failure_advance_delay(mut self, delay: Duration) -> Self {
        self.failure_advance_delay = delay;
        self
    }

    pub fn with_fullscreen_delay(mut self, delay: Duration) -> Self {
        self.fullscreen_delay = delay;
        self
    }

    pub fn with_request_fullscreen(mut self, request: bool) -> Self {
        self.request_fullscreen = request;
        self
    }
}
