//! The platform side of playback.

use std::fmt;

use async_trait::async_trait;

use crate::error::Result;

/// Identifies one display of one item.
///
/// Every call that puts something on screen carries a fresh token, and every
/// [`SurfaceEvent`] about that media carries it back. Events whose token is not
/// the current one are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DisplayToken(u64);

impl DisplayToken {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }

    pub(crate) fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for DisplayToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How much of an upcoming item to load ahead of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreloadKind {
    /// Decode the whole image
    Image,
    /// Fetch only the video's metadata
    VideoMetadata,
}

/// Something the surface observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// The video shown under `token` played to the end
    VideoEnded { token: DisplayToken },
    /// The media shown under `token` failed after it started loading
    MediaFailed { token: DisplayToken, reason: String },
    /// The platform blocked playback of the video shown under `token`
    AutoplayRejected { token: DisplayToken },
    /// A click, tap or key press anywhere
    UserGesture,
}

impl SurfaceEvent {
    pub fn token(&self) -> Option<DisplayToken> {
        match self {
            SurfaceEvent::VideoEnded { token }
            | SurfaceEvent::MediaFailed { token, .. }
            | SurfaceEvent::AutoplayRejected { token } => Some(*token),
            SurfaceEvent::UserGesture => None,
        }
    }
}

/// A place media can be shown: a browser page, a compositor window, a framebuffer.
///
/// Methods return once the surface has accepted the request. Failures detected
/// synchronously are returned; failures detected later are reported as
/// [`SurfaceEvent`]s.
#[async_trait]
pub trait MediaSurface: Send + Sync + 'static {
    /// Replace whatever is on screen with the image at `src`.
    async fn show_image(&self, src: &str, token: DisplayToken) -> Result<()>;

    /// Replace whatever is on screen with the video at `src`, playing from zero.
    async fn play_video(&self, src: &str, token: DisplayToken, muted: bool) -> Result<()>;

    /// Seek the current video back to zero and play it again, without reloading.
    async fn restart_video(&self, token: DisplayToken) -> Result<()>;

    /// Warm up `src` so that showing it next is instant. Best effort.
    async fn preload(&self, src: &str, kind: PreloadKind);

    /// Show nothing.
    async fn clear(&self);

    /// Unmute and resume every video that was blocked waiting for a gesture.
    async fn unmute_and_resume(&self) -> Result<()>;

    async fn request_fullscreen(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_advance() {
        let token = DisplayToken::new(41);
        assert_eq!(token.next().value(), 42);
        assert!(token < token.next());
        assert_eq!(token.to_string(), "#41");
    }

    #[test]
    fn test_event_token() {
        let token = DisplayToken::new(3);
        assert_eq!(SurfaceEvent::VideoEnded { token }.token(), Some(token));
        assert_eq!(SurfaceEvent::UserGesture.token(), None);
    }
}
