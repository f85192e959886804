//! # signage-sync
//!
//! Keeps a signage device's view of its screen row and assigned playlist
//! consistent with the backend.
//!
//! ## Architecture
//!
//! ```text
//!  screen push ─┐
//!  screen poll ─┤
//! playlist push ┼──► mpsc ──► Reconciler ──► watch: status / playlist / progress
//! playlist poll ┤                │
//!  resync tasks ┘                └──► CacheManager (materialize, evict)
//!
//!    heartbeat ───► backend (write-only)
//! ```
//!
//! Every source is its own task and only ever sends messages; the reconciler is
//! the single consumer and applies them in arrival order. Resyncs carry a
//! generation number. Starting a new one aborts the previous task, and a result
//! whose generation is no longer current is dropped, so a slow download can never
//! overwrite a newer assignment.

mod config;
mod error;
mod reconciler;
mod sources;
mod status;
mod synchronizer;

pub use config::SyncConfig;
pub use error::{Result, SyncError};
pub use reconciler::CodeGenerator;
pub use status::{SyncProgress, SyncStatus};
pub use synchronizer::{ScreenSynchronizer, SyncHandle};
