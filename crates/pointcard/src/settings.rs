//! Operator settings and their persistent store
//!
//! [`Settings`] is the resolved operator configuration: where to upload, which
//! store the terminal belongs to, and how many points a scan grants. All three
//! fields are validated together; a partially filled form is never saved.
//!
//! [`SettingsStore`] persists them as JSON using an atomic temp-file-then-rename
//! write, and keeps the current value in memory for the rest of the terminal.

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Resolved operator settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Aggregation endpoint receiving sync batches
    pub endpoint_url: String,
    /// Store this terminal belongs to
    pub store_id: String,
    /// Points granted per scan
    pub point_value: u32,
}

impl Settings {
    /// Build validated settings
    pub fn new(
        endpoint_url: impl Into<String>,
        store_id: impl Into<String>,
        point_value: u32,
    ) -> Result<Self> {
        let settings = Self {
            endpoint_url: endpoint_url.into().trim().to_string(),
            store_id: store_id.into().trim().to_string(),
            point_value,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Build settings from raw form text, as typed by the operator
    pub fn parse(endpoint_url: &str, store_id: &str, point_value: &str) -> Result<Self> {
        let point_value = point_value
            .trim()
            .parse::<u32>()
            .map_err(|_| Error::config(format!("point value must be a positive integer, got {point_value:?}")))?;
        Self::new(endpoint_url, store_id, point_value)
    }

    /// Check all three fields
    pub fn validate(&self) -> Result<()> {
        if self.endpoint_url.is_empty() {
            return Err(Error::config("endpoint URL is required"));
        }
        let url = Url::parse(&self.endpoint_url)
            .map_err(|e| Error::config(format!("invalid endpoint URL: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "endpoint URL must use http or https, got {}",
                url.scheme()
            )));
        }
        if self.store_id.is_empty() {
            return Err(Error::config("store ID is required"));
        }
        if self.point_value == 0 {
            return Err(Error::config("point value must be greater than zero"));
        }
        Ok(())
    }
}

/// Persistent settings with an in-memory copy
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    current: RwLock<Option<Settings>>,
}

impl SettingsStore {
    /// Load settings from `path`, if present
    ///
    /// A missing file means "not configured yet". A file that no longer
    /// parses or validates is logged and also treated as not configured.
    pub async fn load(path: &Path) -> Result<Self> {
        let current = match tokio::fs::read(path).await {
            Ok(bytes) => match serde_json::from_slice::<Settings>(&bytes) {
                Ok(settings) if settings.validate().is_ok() => {
                    debug!(path = %path.display(), store_id = %settings.store_id, "Loaded settings");
                    Some(settings)
                }
                Ok(_) | Err(_) => {
                    warn!(path = %path.display(), "Settings file is invalid, ignoring it");
                    None
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No settings saved yet");
                None
            }
            Err(e) => return Err(Error::storage(format!("failed to read settings: {e}"))),
        };

        Ok(Self {
            path: path.to_path_buf(),
            current: RwLock::new(current),
        })
    }

    /// Current settings, if saved
    pub fn get(&self) -> Option<Settings> {
        self.current.read().clone()
    }

    /// Current settings, or [`Error::ConfigIncomplete`]
    pub fn require(&self) -> Result<Settings> {
        self.get().ok_or(Error::ConfigIncomplete)
    }

    /// Validate, persist, then publish new settings
    ///
    /// On any failure the previously saved settings stay in effect.
    pub async fn save(&self, settings: Settings) -> Result<()> {
        settings.validate()?;

        let bytes = serde_json::to_vec_pretty(&settings)
            .map_err(|e| Error::storage(format!("failed to encode settings: {e}")))?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::storage(format!("failed to create settings directory: {e}")))?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, &bytes)
            .await
            .map_err(|e| Error::storage(format!("failed to write settings: {e}")))?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| Error::storage(format!("failed to persist settings: {e}")))?;

        info!(
            endpoint = %settings.endpoint_url,
            store_id = %settings.store_id,
            point_value = settings.point_value,
            "Settings saved"
        );
        *self.current.write() = Some(settings);
        Ok(())
    }

    /// Forget saved settings
    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(Error::storage(format!("failed to remove settings: {e}"))),
        }
        *self.current.write() = None;
        info!("Settings cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> Settings {
        Settings::new("https://points.example.com/exec", "store-7", 10).unwrap()
    }

    #[test]
    fn test_settings_trimmed() {
        let settings = Settings::new("  https://x.example/exec ", " s1 ", 3).unwrap();
        assert_eq!(settings.endpoint_url, "https://x.example/exec");
        assert_eq!(settings.store_id, "s1");
    }

    #[test]
    fn test_settings_rejects_missing_fields() {
        assert!(Settings::new("", "s1", 1).is_err());
        assert!(Settings::new("https://x.example", "  ", 1).is_err());
        assert!(Settings::new("https://x.example", "s1", 0).is_err());
        assert!(Settings::new("not a url", "s1", 1).is_err());
        assert!(Settings::new("ftp://x.example", "s1", 1).is_err());
    }

    #[test]
    fn test_settings_parse_form_text() {
        let settings = Settings::parse("https://x.example", "s1", " 25 ").unwrap();
        assert_eq!(settings.point_value, 25);

        assert!(Settings::parse("https://x.example", "s1", "").is_err());
        assert!(Settings::parse("https://x.example", "s1", "-5").is_err());
        assert!(Settings::parse("https://x.example", "s1", "ten").is_err());
        assert!(Settings::parse("https://x.example", "s1", "0").is_err());
    }

    #[test]
    fn test_settings_wire_names() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["endpointUrl"], "https://points.example.com/exec");
        assert_eq!(json["storeId"], "store-7");
        assert_eq!(json["pointValue"], 10);
    }

    #[tokio::test]
    async fn test_store_roundtrip_across_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");

        let store = SettingsStore::load(&path).await.unwrap();
        assert!(store.get().is_none());
        assert!(matches!(store.require(), Err(Error::ConfigIncomplete)));

        store.save(sample()).await.unwrap();
        assert_eq!(store.get(), Some(sample()));

        let reloaded = SettingsStore::load(&path).await.unwrap();
        assert_eq!(reloaded.get(), Some(sample()));
    }

    #[tokio::test]
    async fn test_invalid_save_keeps_previous() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        let store = SettingsStore::load(&path).await.unwrap();
        store.save(sample()).await.unwrap();

        let bad = Settings {
            endpoint_url: String::new(),
            store_id: "s".into(),
            point_value: 1,
        };
        assert!(store.save(bad).await.is_err());
        assert_eq!(store.get(), Some(sample()));
        assert_eq!(SettingsStore::load(&path).await.unwrap().get(), Some(sample()));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();

        let store = SettingsStore::load(&path).await.unwrap();
        assert!(store.get().is_none());
    }

    #[tokio::test]
    async fn test_clear() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.json");
        let store = SettingsStore::load(&path).await.unwrap();
        store.save(sample()).await.unwrap();

        store.clear().await.unwrap();
        assert!(store.get().is_none());
        assert!(!path.exists());

        // Clearing twice is fine
        store.clear().await.unwrap();
    }
}
