//! # signage-playback
//!
//! Unattended rotation of a materialized playlist.
//!
//! The scheduler never touches the network or the cache. It reads each item's
//! resolved address and drives a [`MediaSurface`], which is whatever actually puts
//! pixels on screen. Images advance on a timer, videos advance when the surface
//! reports they ended, and anything that fails to play is skipped after a short
//! delay so the screen never stalls on one bad item.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use signage_playback::{PlaybackConfig, PlaybackScheduler, RecordingSurface};
//! use tokio::sync::watch;
//!
//! # async fn run() -> signage_playback::Result<()> {
//! let (_playlists, rx) = watch::channel(None);
//! let handle = PlaybackScheduler::new(Arc::new(RecordingSurface::new()), rx, PlaybackConfig::default())
//!     .spawn()?;
//! println!("{:?}", handle.snapshot());
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod recording;
mod scheduler;
mod surface;

pub use config::PlaybackConfig;
pub use error::{PlaybackError, Result};
pub use recording::{RecordingSurface, SurfaceCall};
pub use scheduler::{PlaybackHandle, PlaybackScheduler, PlaybackSnapshot, PlaylistReceiver, SurfaceEvents};
pub use surface::{DisplayToken, MediaSurface, PreloadKind, SurfaceEvent};
