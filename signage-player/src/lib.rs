//! # signage-player
//!
//! An unattended digital signage player.
//!
//! A device registers itself with the backend, shows a pairing code until an
//! operator claims it, downloads its assigned playlist so playback survives
//! network loss, and loops through the media indefinitely.
//!
//! ```text
//! Backend ──► ScreenSynchronizer ──► CacheManager
//!                    │
//!                    └─ playlist watch ──► PlaybackScheduler ──► MediaSurface
//! ```
//!
//! The crates underneath are usable on their own:
//!
//! - [`signage_api`]: data model, backend trait, in-memory and PostgREST backends
//! - [`signage_cache`]: URL-keyed media cache
//! - [`signage_sync`]: push + poll reconciliation of screen and playlist state
//! - [`signage_playback`]: playlist rotation over a media surface

mod config;
mod error;
pub mod logging;
mod player;

pub use config::{PlayerConfig, CACHE_DIR_ENV, IDENTITY_PATH_ENV};
pub use error::{PlayerError, Result};
pub use player::{SignagePlayer, SignagePlayerBuilder};

pub use signage_api;
pub use signage_cache;
pub use signage_playback;
pub use signage_sync;
