//! Configuration for the pointcard terminal.
//!
//! [`Config`] holds the process-level knobs: where local state lives and how
//! often and how patiently the terminal talks to the network. The
//! operator-facing endpoint/store/point settings live in
//! [`crate::settings`], because they are edited and persisted at runtime.
//!
//! # Example
//!
//! ```rust
//! use pointcard::Config;
//!
//! let config = Config::new("/var/lib/pointcard")
//!     .with_sync_interval(120)
//!     .with_request_timeout(10);
//! assert_eq!(config.sync_interval_secs, 120);
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{DEFAULT_PROBE_TIMEOUT_MS, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SYNC_INTERVAL_SECS};

/// Configuration for a pointcard terminal.
///
/// # Storage Layout
///
/// ```text
/// {storage_path}/
/// ├── device_id        # UUID identifying this installation
/// ├── settings.json    # endpoint URL, store ID, point value
/// └── queue.db         # SQLite: pending scans + last sync time
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding all local state. Created if missing.
    pub storage_path: PathBuf,

    /// Auto-sync interval in seconds. Default is 60.
    pub sync_interval_secs: u64,

    /// Timeout for one sync request, in seconds. Default is 30.
    pub request_timeout_secs: u64,

    /// Timeout for the auto-sync reachability probe, in milliseconds.
    pub probe_timeout_ms: u64,
}

impl Config {
    /// Create a new configuration with the given storage path
    #[must_use]
    pub fn new(storage_path: impl Into<PathBuf>) -> Self {
        Self {
            storage_path: storage_path.into(),
            sync_interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
        }
    }

    /// Set the auto-sync interval
    #[must_use]
    pub const fn with_sync_interval(mut self, secs: u64) -> Self {
        self.sync_interval_secs = secs;
        self
    }

    /// Set the sync request timeout
    #[must_use]
    pub const fn with_request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Set the reachability probe timeout
    #[must_use]
    pub const fn with_probe_timeout_ms(mut self, millis: u64) -> Self {
        self.probe_timeout_ms = millis;
        self
    }

    /// Auto-sync interval as a [`Duration`]
    #[must_use]
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs.max(1))
    }

    /// Request timeout as a [`Duration`]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Probe timeout as a [`Duration`]
    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Get the default storage path
    #[must_use]
    pub fn default_storage_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pointcard")
    }

    /// Path to the device identity file
    #[must_use]
    pub fn identity_path(&self) -> PathBuf {
        self.storage_path.join("device_id")
    }

    /// Path to the operator settings file
    #[must_use]
    pub fn settings_path(&self) -> PathBuf {
        self.storage_path.join("settings.json")
    }

    /// Path to the queue database
    #[must_use]
    pub fn queue_path(&self) -> PathBuf {
        self.storage_path.join("queue.db")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Self::default_storage_path())
    }
}
