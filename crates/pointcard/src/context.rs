//! Shared application context
//!
//! Everything process-wide lives in one [`AppContext`]: the configuration, the
//! operator settings, the device identity and the queue. Components receive an
//! `Arc<AppContext>` explicitly instead of reaching for globals.
//!
//! # Lifecycle
//!
//! 1. [`AppContext::load`] creates the storage directory, loads or creates
//!    the device identity, loads saved settings and opens the queue.
//! 2. Settings change only through [`SettingsStore::save`] /
//!    [`SettingsStore::clear`].
//! 3. The identity changes only through [`AppContext::reset`], which also
//!    wipes the settings and the queue. Scans are recorded under a shared
//!    lock that the reset takes exclusively, so no scan lands half-way
//!    through a reset.

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::RwLock as TokioRwLock;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::identity::{load_or_create_identity, stage_identity, DeviceId};
use crate::queue::{QueueStore, QueuedScan};
use crate::scan::{validate, ScanSource};
use crate::settings::{Settings, SettingsStore};

/// Process-wide state shared by scanning, syncing and reset
#[derive(Debug)]
pub struct AppContext {
    config: Config,
    settings: SettingsStore,
    device_id: RwLock<DeviceId>,
    queue: QueueStore,
    /// Shared by scan recording, exclusive during a reset
    reset_lock: TokioRwLock<()>,
}

impl AppContext {
    /// Load all persisted state under `config.storage_path`
    pub async fn load(config: Config) -> Result<Self> {
        tokio::fs::create_dir_all(&config.storage_path)
            .await
            .map_err(|e| Error::init(format!("failed to create storage directory: {e}")))?;

        let device_id = load_or_create_identity(&config.identity_path()).await?;
        let settings = SettingsStore::load(&config.settings_path()).await?;
        let queue = QueueStore::open(&config.queue_path())?;

        info!(
            device_id = %device_id,
            configured = settings.get().is_some(),
            storage = %config.storage_path.display(),
            "Application context loaded"
        );

        Ok(Self {
            config,
            settings,
            device_id: RwLock::new(device_id),
            queue,
            reset_lock: TokioRwLock::new(()),
        })
    }

    /// Process configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Settings store
    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    /// Current settings, or [`Error::ConfigIncomplete`]
    pub fn require_settings(&self) -> Result<Settings> {
        self.settings.require()
    }

    /// Current device identity
    pub fn device_id(&self) -> DeviceId {
        self.device_id.read().clone()
    }

    /// Durable queue
    pub fn queue(&self) -> &QueueStore {
        &self.queue
    }

    /// Validate raw scan text and queue it
    ///
    /// Requires complete settings. Invalid input returns
    /// [`Error::InvalidFormat`] and leaves the queue untouched; a storage
    /// failure means the scan was not recorded and must be taken again.
    pub async fn record_scan(&self, raw: &str, source: ScanSource) -> Result<QueuedScan> {
        let _shared = self.reset_lock.read().await;
        self.require_settings()?;

        let entry = match validate(raw, &self.device_id(), Utc::now()) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(source = %source, input = %raw.trim(), "Rejected scan input");
                return Err(e);
            }
        };

        let queued = self.queue.append(entry).await?;
        info!(
            source = %source,
            member_id = %queued.entry.member_id,
            seq = queued.seq,
            "Scan accepted and queued"
        );
        Ok(queued)
    }

    /// Wipe settings, queue and sync state, and replace the device identity
    ///
    /// Either every step takes effect or the terminal is left as it was:
    /// the new identity is staged and committed first, settings are cleared
    /// next, and the queue wipe (one transaction) goes last. A failure rolls
    /// the earlier steps back. Returns the new identity.
    pub async fn reset(&self) -> Result<DeviceId> {
        let _exclusive = self.reset_lock.write().await;

        let identity_path = self.config.identity_path();
        let old_id = self.device_id();
        let old_settings = self.settings.get();

        let new_id = stage_identity(&identity_path, DeviceId::generate())
            .await?
            .commit()
            .await?;

        if let Err(e) = self.settings.clear().await {
            self.restore_identity(&old_id).await;
            return Err(e);
        }

        if let Err(e) = self.queue.reset().await {
            if let Some(settings) = old_settings {
                if let Err(restore) = self.settings.save(settings).await {
                    error!(error = %restore, "Failed to restore settings after aborted reset");
                }
            }
            self.restore_identity(&old_id).await;
            return Err(e);
        }

        *self.device_id.write() = new_id.clone();
        info!(device_id = %new_id, "Device identity regenerated");
        Ok(new_id)
    }

    async fn restore_identity(&self, old_id: &DeviceId) {
        let restored = match stage_identity(&self.config.identity_path(), old_id.clone()).await {
            Ok(staged) => staged.commit().await,
            Err(e) => Err(e),
        };
        if let Err(e) = restored {
            error!(error = %e, device_id = %old_id, "Failed to restore identity after aborted reset");
        }
    }
}
