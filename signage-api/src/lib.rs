//! # signage-api
//!
//! Shared data model and backend access for the signage player.
//!
//! * [`Screen`], [`Playlist`] and [`MediaItem`] mirror the backend rows.
//! * [`Backend`] is the row-level interface the synchronizer talks to.
//! * [`InMemoryBackend`] implements it in-process, with operator-side helpers and
//!   fault injection for tests and demos.
//! * [`PostgrestBackend`] implements it over HTTP against a PostgREST-style API.
//! * [`DeviceIdentity`] persists the device id; [`generate_pairing_code`] produces
//!   the code shown while waiting to be paired.
//!
//! ```rust
//! use chrono::Utc;
//! use signage_api::{DeviceId, Screen, ScreenPhase};
//!
//! let screen = Screen::pending(DeviceId::new("D1"), "K7MQ2X", Utc::now());
//! assert_eq!(
//!     screen.phase(),
//!     ScreenPhase::Pairing { code: Some("K7MQ2X".to_string()) }
//! );
//! ```

mod backend;
mod config;
mod error;
mod identity;
mod memory;
mod model;
mod postgrest;

pub use backend::{Backend, ChangeStream, RowChange};
pub use config::{BackendConfig, BACKEND_KEY_ENV, BACKEND_URL_ENV};
pub use error::{BackendError, Result};
pub use identity::{
    generate_pairing_code, DeviceIdentity, IdentityError, PAIRING_CODE_ALPHABET,
    PAIRING_CODE_LEN,
};
pub use memory::InMemoryBackend;
pub use model::*;
pub use postgrest::PostgrestBackend;
