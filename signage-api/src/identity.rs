//! Local device identity and pairing codes.

use std::fs;
use std::path::{Path, PathBuf};

use rand::Rng;
use thiserror::Error;
use tracing::info;

use crate::model::DeviceId;

/// Pairing-code alphabet. `0`, `O`, `1` and `I` are left out so codes read back
/// unambiguously from a TV across the room.
pub const PAIRING_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of a pairing code.
pub const PAIRING_CODE_LEN: usize = 6;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Identity file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No platform data directory available")]
    NoDataDir,

    #[error("Identity file {path} is empty")]
    Empty { path: PathBuf },
}

/// The persisted identity of this device.
#[derive(Debug, Clone)]
pub struct DeviceIdentity {
    id: DeviceId,
    path: PathBuf,
}

impl DeviceIdentity {
    /// `<data dir>/signage-player/device_id`
    pub fn default_path() -> Result<PathBuf, IdentityError> {
        dirs::data_dir()
            .map(|dir| dir.join("signage-player").join("device_id"))
            .ok_or(IdentityError::NoDataDir)
    }

    /// Read the identifier stored at `path`, creating and persisting a new UUIDv4
    /// if the file does not exist yet.
    pub fn load_or_create(path: impl AsRef<Path>) -> Result<Self, IdentityError> {
        let path = path.as_ref().to_path_buf();

        if path.exists() {
            let contents = fs::read_to_string(&path)?;
            let id = contents.trim();
            if id.is_empty() {
                return Err(IdentityError::Empty { path });
            }
            return Ok(Self {
                id: DeviceId::new(id),
                path,
            });
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let id = uuid::Uuid::new_v4().to_string();
        fs::write(&path, &id)?;
        info!(device = %id, path = %path.display(), "Created new device identity");

        Ok(Self {
            id: DeviceId::new(id),
            path,
        })
    }

    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Generate a fresh 6-character pairing code.
pub fn generate_pairing_code() -> String {
    let mut rng = rand::thread_rng();
    (0..PAIRING_CODE_LEN)
        .map(|_| {
            let index = rng.gen_range(0..PAIRING_CODE_ALPHABET.len());
            char::from(PAIRING_CODE_ALPHABET[index])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_or_create_persists_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("device_id");

        let first = DeviceIdentity::load_or_create(&path).unwrap();
        assert!(path.exists());
        assert!(uuid::Uuid::parse_str(first.id().as_str()).is_ok());

        let second = DeviceIdentity::load_or_create(&path).unwrap();
        assert_eq!(first.id(), second.id());
    }

    #[test]
    fn test_existing_id_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device_id");
        fs::write(&path, "D1\n").unwrap();

        let identity = DeviceIdentity::load_or_create(&path).unwrap();
        assert_eq!(identity.id().as_str(), "D1");
    }

    #[test]
    fn test_empty_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device_id");
        fs::write(&path, "  \n").unwrap();

        assert!(matches!(
            DeviceIdentity::load_or_create(&path),
            Err(IdentityError::Empty { .. })
        ));
    }

    #[test]
    fn test_pairing_code_shape() {
        let code = generate_pairing_code();
        assert_eq!(code.len(), PAIRING_CODE_LEN);
        assert!(code.bytes().all(|b| PAIRING_CODE_ALPHABET.contains(&b)));
    }
}
