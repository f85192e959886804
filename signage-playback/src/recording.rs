//! In-process media surface.
//!
//! Records every call in order and lets a test decide which sources fail,
//! whether autoplay is blocked and whether fullscreen is granted.

use std::collections::HashSet;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{PlaybackError, Result};
use crate::surface::{DisplayToken, MediaSurface, PreloadKind};

/// One call made on a [`RecordingSurface`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceCall {
    ShowImage {
        src: String,
        token: DisplayToken,
    },
    PlayVideo {
        src: String,
        token: DisplayToken,
        muted: bool,
    },
    RestartVideo {
        token: DisplayToken,
    },
    Preload {
        src: String,
        kind: PreloadKind,
    },
    Clear,
    UnmuteAndResume,
    RequestFullscreen,
}

#[derive(Default)]
struct Inner {
    calls: Vec<SurfaceCall>,
    failing: HashSet<String>,
    autoplay_blocked: bool,
    fullscreen_denied: bool,
}

/// A [`MediaSurface`] that only records what it was asked to do.
#[derive(Default)]
pub struct RecordingSurface {
    inner: Mutex<Inner>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every display of `src` fail to load.
    pub fn fail_src(&self, src: impl Into<String>) {
        self.inner.lock().failing.insert(src.into());
    }

    /// Block video playback until `unmute_and_resume` is called.
    pub fn block_autoplay(&self, blocked: bool) {
        self.inner.lock().autoplay_blocked = blocked;
    }

    pub fn deny_fullscreen(&self, denied: bool) {
        self.inner.lock().fullscreen_denied = denied;
    }

    /// Every call so far, oldest first.
    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.inner.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    /// Sources put on screen, in order. Restarts are not included.
    pub fn displayed(&self) -> Vec<String> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                SurfaceCall::ShowImage { src, .. } | SurfaceCall::PlayVideo { src, .. } => {
                    Some(src.clone())
                }
                _ => None,
            })
            .collect()
    }

    /// Token of the most recent display.
    pub fn current_token(&self) -> Option<DisplayToken> {
        self.inner.lock().calls.iter().rev().find_map(|call| match call {
            SurfaceCall::ShowImage { token, .. } | SurfaceCall::PlayVideo { token, .. } => {
                Some(*token)
            }
            _ => None,
        })
    }

    pub fn count(&self, predicate: impl Fn(&SurfaceCall) -> bool) -> usize {
        self.inner.lock().calls.iter().filter(|call| predicate(call)).count()
    }

    fn record(&self, call: SurfaceCall) {
        self.inner.lock().calls.push(call);
    }

    fn check_src(&self, src: &str) -> Result<()> {
        if self.inner.lock().failing.contains(src) {
            return Err(PlaybackError::Media {
                src: src.to_string(),
                reason: "404 Not Found".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MediaSurface for RecordingSurface {
    async fn show_image(&self, src: &str, token: DisplayToken) -> Result<()> {
        self.record(SurfaceCall::ShowImage {
            src: src.to_string(),
            token,
        });
        self.check_src(src)
    }

    async fn play_video(&self, src: &str, token: DisplayToken, muted: bool) -> Result<()> {
        self.record(SurfaceCall::PlayVideo {
            src: src.to_string(),
            token,
            muted,
        });
        self.check_src(src)?;
        if self.inner.lock().autoplay_blocked {
            return Err(PlaybackError::AutoplayRejected);
        }
        Ok(())
    }

    async fn restart_video(&self, token: DisplayToken) -> Result<()> {
        self.record(SurfaceCall::RestartVideo { token });
        Ok(())
    }

    async fn preload(&self, src: &str, kind: PreloadKind) {
        self.record(SurfaceCall::Preload {
            src: src.to_string(),
            kind,
        });
    }

    async fn clear(&self) {
        self.record(SurfaceCall::Clear);
    }

    async fn unmute_and_resume(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(SurfaceCall::UnmuteAndResume);
        // A gesture unlocks autoplay for the rest of the session.
        inner.autoplay_blocked = false;
        Ok(())
    }

    async fn request_fullscreen(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(SurfaceCall::RequestFullscreen);
        if inner.fullscreen_denied {
            return Err(PlaybackError::Fullscreen(
                "not triggered by user activation".to_string(),
            ));
        }
        Ok(())
    }
}
