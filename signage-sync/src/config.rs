//! Synchronizer timing configuration

use std::time::Duration;

use crate::error::{Result, SyncError};

/// Intervals driving the synchronizer's update sources
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// How often `last_ping` is written
    pub heartbeat_interval: Duration,

    /// How often the screen row is re-fetched as a push fallback
    pub screen_poll_interval: Duration,

    /// How often the assigned playlist's `updated_at` is checked
    pub playlist_poll_interval: Duration,

    /// Delay between attempts of a failed initial lookup
    pub startup_retry_interval: Duration,

    /// Delay before re-subscribing after a live channel closed or failed
    pub resubscribe_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(30),
            screen_poll_interval: Duration::from_secs(60),
            playlist_poll_interval: Duration::from_secs(60),
            startup_retry_interval: Duration::from_secs(5),
            resubscribe_interval: Duration::from_secs(60),
        }
    }
}

impl SyncConfig {
    /// Short intervals for backends without a live channel
    pub fn fast_polling() -> Self {
        Self {
            screen_poll_interval: Duration::from_secs(10),
            playlist_poll_interval: Duration::from_secs(10),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        let intervals = [
            ("Heartbeat interval", self.heartbeat_interval),
            ("Screen poll interval", self.screen_poll_interval),
            ("Playlist poll interval", self.playlist_poll_interval),
            ("Startup retry interval", self.startup_retry_interval),
            ("Resubscribe interval", self.resubscribe_interval),
        ];

        for (name, interval) in intervals {
            if interval.is_zero() {
                return Err(SyncError::Configuration(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }

        Ok(())
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_screen_poll_interval(mut self, interval: Duration) -> Self {
        self.screen_poll_interval = interval;
        self
    }

    pub fn with_playlist_poll_interval(mut self, interval: Duration) -> Self {
        self.playlist_poll_interval = interval;
        self
    }

    pub fn with_startup_retry_interval(mut self, interval: Duration) -> Self {
        self.startup_retry_interval = interval;
        self
    }

    pub fn with_resubscribe_interval(mut self, interval: Duration) -> Self {
        self.resubscribe_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_intervals() {
        let config = SyncConfig::default();
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config.screen_poll_interval, Duration::from_secs(60));
        assert_eq!(config.playlist_poll_interval, Duration::from_secs(60));
        assert_eq!(config.startup_retry_interval, Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_fast_polling_preset() {
        let config = SyncConfig::fast_polling();
        assert_eq!(config.screen_poll_interval, Duration::from_secs(10));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = SyncConfig::default().with_screen_poll_interval(Duration::ZERO);
        match config.validate() {
            Err(SyncError::Configuration(message)) => {
                assert!(message.contains("Screen poll interval"))
            }
            other => panic!("Expected configuration error, got {:?}", other),
        }
    }
}
