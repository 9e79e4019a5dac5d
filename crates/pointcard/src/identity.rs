//! Device identity management
//!
//! Each installation carries a random UUID that tags every scan and every
//! synced batch. It is an attribution label only, never a credential. The ID
//! is created on first run and survives restarts; a device reset replaces it
//! and the old value is discarded.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Opaque per-installation identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    /// Generate a fresh random identity
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an identifier read back from local storage
    pub(crate) fn from_stored(value: String) -> Self {
        Self(value)
    }

    /// The identifier as sent on the wire
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Load or create a persistent device identity
///
/// If an identity file exists at the given path, it is loaded.
/// Otherwise, a new identity is generated and saved.
pub async fn load_or_create_identity(path: &Path) -> Result<DeviceId> {
    if path.exists() {
        load_identity(path).await
    } else {
        let device_id = stage_identity(path, DeviceId::generate()).await?.commit().await?;
        info!(
            device_id = %device_id,
            path = %path.display(),
            "Generated new device identity"
        );
        Ok(device_id)
    }
}

/// An identity written next to the identity file but not yet in effect
///
/// [`StagedIdentity::commit`] renames it over the current file.
#[derive(Debug)]
pub(crate) struct StagedIdentity {
    device_id: DeviceId,
    temp_path: PathBuf,
    path: PathBuf,
}

impl StagedIdentity {
    /// Make the staged identity the stored one
    ///
    /// On failure the temp file is removed and the stored identity is
    /// unchanged.
    pub(crate) async fn commit(self) -> Result<DeviceId> {
        if let Err(e) = fs::rename(&self.temp_path, &self.path).await {
            let _ = fs::remove_file(&self.temp_path).await;
            return Err(Error::identity(format!("failed to persist identity file: {e}")));
        }
        Ok(self.device_id)
    }
}

/// Write `device_id` to a temp file beside `path`
pub(crate) async fn stage_identity(path: &Path, device_id: DeviceId) -> Result<StagedIdentity> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::identity(format!("failed to create directory: {e}")))?;
    }

    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, device_id.as_str())
        .await
        .map_err(|e| Error::identity(format!("failed to write identity file: {e}")))?;

    Ok(StagedIdentity {
        device_id,
        temp_path,
        path: path.to_path_buf(),
    })
}

async fn load_identity(path: &Path) -> Result<DeviceId> {
    debug!(path = %path.display(), "Loading device identity");

    let text = fs::read_to_string(path)
        .await
        .map_err(|e| Error::identity(format!("failed to read identity file: {e}")))?;

    let uuid = Uuid::parse_str(text.trim())
        .map_err(|_| Error::identity("invalid identity file (expected a UUID)"))?;

    let device_id = DeviceId(uuid.to_string());
    info!(device_id = %device_id, "Loaded existing device identity");
    Ok(device_id)
}
