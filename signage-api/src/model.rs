//! Core data model shared by every signage crate.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

/// Stable identifier of this device; doubles as the screen row id.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(pub String);

impl DeviceId {
    /// Create a new device ID from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the device ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for DeviceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for DeviceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a backend playlist row.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaylistId(pub String);

impl PlaylistId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PlaylistId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for PlaylistId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Backend-side lifecycle status of a screen row.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScreenStatus {
    Pending,
    Online,
    /// Any status this player does not know about; classified like `Pending`.
    #[serde(other)]
    Unknown,
}

/// A screen row as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Screen {
    pub id: DeviceId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub status: ScreenStatus,
    #[serde(default)]
    pub pairing_code: Option<String>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default, rename = "current_playlist_id", alias = "playlist_id")]
    pub playlist_id: Option<PlaylistId>,
    #[serde(default)]
    pub last_ping: Option<DateTime<Utc>>,
}

impl Screen {
    /// A fresh, unpaired screen row announcing `pairing_code`.
    pub fn pending(id: DeviceId, pairing_code: impl Into<String>, now: DateTime<Utc>) -> Self {
        let pairing_code = pairing_code.into();
        Self {
            id,
            name: Some(format!("TV-{}", pairing_code)),
            status: ScreenStatus::Pending,
            pairing_code: Some(pairing_code),
            assigned_to: None,
            playlist_id: None,
            last_ping: Some(now),
        }
    }

    /// Classify this snapshot.
    ///
    /// A screen is active when it is `online`, or when it has been assigned to an
    /// operator and its pairing code has been consumed. Everything else is pairing.
    pub fn phase(&self) -> ScreenPhase {
        let active = self.status == ScreenStatus::Online
            || (self.assigned_to.is_some() && self.pairing_code.is_none());

        if active {
            ScreenPhase::Active {
                playlist_id: self.playlist_id.clone(),
            }
        } else {
            ScreenPhase::Pairing {
                code: self.pairing_code.clone(),
            }
        }
    }
}

/// Pairing classification of a screen snapshot.
///
/// Everything downstream of reconciliation matches on this instead of looking at
/// raw screen fields.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ScreenPhase {
    /// Paired with an operator; may or may not have a playlist assigned
    Active { playlist_id: Option<PlaylistId> },
    /// Waiting for an operator to enter `code`
    Pairing { code: Option<String> },
}

impl ScreenPhase {
    pub fn is_active(&self) -> bool {
        matches!(self, ScreenPhase::Active { .. })
    }

    /// The assigned playlist, if active and assigned.
    pub fn playlist_id(&self) -> Option<&PlaylistId> {
        match self {
            ScreenPhase::Active { playlist_id } => playlist_id.as_ref(),
            ScreenPhase::Pairing { .. } => None,
        }
    }
}

/// Kind of a playlist entry.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

/// One entry of a playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    /// Display time in seconds; only meaningful for images.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Locally resolved playable address. Never sent to the backend.
    #[serde(skip)]
    pub resolved_src: Option<String>,
}

impl MediaItem {
    pub fn image(url: impl Into<String>, duration_secs: u32) -> Self {
        Self {
            url: url.into(),
            kind: MediaKind::Image,
            duration: Some(f64::from(duration_secs)),
            title: None,
            resolved_src: None,
        }
    }

    pub fn video(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: MediaKind::Video,
            duration: None,
            title: None,
            resolved_src: None,
        }
    }

    /// How long an image stays on screen. Missing, zero, negative or
    /// non-finite durations fall back to `default`.
    pub fn display_duration(&self, default: Duration) -> Duration {
        match self.duration {
            Some(secs) if secs.is_finite() && secs > 0.0 => match Duration::try_from_secs_f64(secs) {
                Ok(duration) if !duration.is_zero() => duration,
                _ => default,
            },
            _ => default,
        }
    }

    /// The address the playback surface should load.
    pub fn playable_src(&self) -> &str {
        self.resolved_src.as_deref().unwrap_or(&self.url)
    }

    /// Short label for log lines.
    pub fn label(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.url)
    }
}

/// A playlist row as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: PlaylistId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "lenient_items")]
    pub items: Vec<MediaItem>,
}

/// Decode playlist items one by one, dropping those that cannot be played.
fn lenient_items<'de, D>(deserializer: D) -> std::result::Result<Vec<MediaItem>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?.unwrap_or_default();
    let items = raw
        .into_iter()
        .enumerate()
        .filter_map(|(position, value)| match serde_json::from_value::<MediaItem>(value) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(position, error = %e, "Skipping malformed playlist item");
                None
            }
        })
        .collect();
    Ok(items)
}

/// A playlist whose items have been made locally available.
///
/// Produced by the cache manager, consumed read-only by the playback scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterializedPlaylist {
    pub playlist_id: PlaylistId,
    pub name: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<MediaItem>,
}

impl MaterializedPlaylist {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
