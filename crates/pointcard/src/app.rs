//! Operator-facing facade
//!
//! [`PointCard`] wires the context, the synchronizer and the auto-sync loop
//! together and exposes one method per operator action: save settings, start
//! and stop scanning, manual entry, trigger sync, reset the device.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex as TokioMutex;
use tracing::{info, warn};

use crate::capture::{CaptureSource, ScanSession};
use crate::config::Config;
use crate::context::AppContext;
use crate::error::{Error, Result};
use crate::identity::DeviceId;
use crate::queue::QueuedScan;
use crate::scan::ScanSource;
use crate::settings::Settings;
use crate::sync::scheduler::AutoSync;
use crate::sync::{SyncOutcome, SyncReport, Synchronizer};

/// Snapshot of the terminal for status display
#[derive(Debug, Clone)]
pub struct TerminalStatus {
    /// Current device identity
    pub device_id: DeviceId,
    /// Saved settings, if any
    pub settings: Option<Settings>,
    /// Scans waiting for upload
    pub queued: usize,
    /// Last confirmed sync
    pub last_sync: Option<DateTime<Utc>>,
    /// Most recent sync attempt in this process
    pub last_outcome: Option<SyncReport>,
    /// Whether a sync is in flight
    pub syncing: bool,
    /// Whether the auto-sync loop is running
    pub auto_sync: bool,
}

/// A loyalty point terminal
#[derive(Debug)]
pub struct PointCard {
    ctx: Arc<AppContext>,
    synchronizer: Arc<Synchronizer>,
    auto_sync: TokioMutex<Option<AutoSync>>,
}

impl PointCard {
    /// Load persisted state and prepare the synchronizer
    ///
    /// Auto-sync is not started; call [`PointCard::start_auto_sync`].
    pub async fn init(config: Config) -> Result<Self> {
        let ctx = Arc::new(AppContext::load(config).await?);
        let synchronizer = Arc::new(Synchronizer::new(Arc::clone(&ctx))?);

        Ok(Self {
            ctx,
            synchronizer,
            auto_sync: TokioMutex::new(None),
        })
    }

    /// Shared application context
    pub fn context(&self) -> &Arc<AppContext> {
        &self.ctx
    }

    /// The synchronizer backing manual and automatic sync
    pub fn synchronizer(&self) -> &Arc<Synchronizer> {
        &self.synchronizer
    }

    /// Current device identity
    pub fn device_id(&self) -> DeviceId {
        self.ctx.device_id()
    }

    /// Saved settings, if any
    pub fn settings(&self) -> Option<Settings> {
        self.ctx.settings().get()
    }

    /// Validate and persist operator settings
    pub async fn save_settings(&self, settings: Settings) -> Result<()> {
        self.ctx.settings().save(settings).await
    }

    /// Validate and queue one scan
    pub async fn record_scan(&self, raw: &str, source: ScanSource) -> Result<QueuedScan> {
        self.ctx.record_scan(raw, source).await
    }

    /// Queue a member ID typed by the operator
    pub async fn manual_entry(&self, raw: &str) -> Result<QueuedScan> {
        self.record_scan(raw, ScanSource::Manual).await
    }

    /// Start a scan session on `source`
    ///
    /// Refused with [`Error::ConfigIncomplete`] until settings are saved.
    pub fn start_scan<S: CaptureSource>(&self, source: S) -> Result<ScanSession> {
        self.ctx.require_settings()?;

        let events = source.open().map_err(|e| match e {
            Error::CaptureUnavailable(_) => e,
            other => Error::capture(other.to_string()),
        })?;

        Ok(ScanSession::start(Arc::clone(&self.ctx), events))
    }

    /// Trigger a sync now
    pub async fn sync_now(&self) -> SyncOutcome {
        self.synchronizer.sync().await
    }

    /// Start the background auto-sync loop; no-op when already running
    pub async fn start_auto_sync(&self) {
        let mut slot = self.auto_sync.lock().await;
        if slot.as_ref().is_some_and(AutoSync::is_running) {
            return;
        }

        let config = self.ctx.config();
        *slot = Some(AutoSync::spawn(
            Arc::clone(&self.synchronizer),
            config.sync_interval(),
            config.probe_timeout(),
        ));
    }

    /// Stop the background auto-sync loop
    pub async fn stop_auto_sync(&self) {
        let auto = self.auto_sync.lock().await.take();
        if let Some(auto) = auto {
            auto.shutdown().await;
        }
    }

    /// Gather a status snapshot
    pub async fn status(&self) -> Result<TerminalStatus> {
        let queue = self.ctx.queue();
        let auto_sync = self
            .auto_sync
            .lock()
            .await
            .as_ref()
            .is_some_and(AutoSync::is_running);

        Ok(TerminalStatus {
            device_id: self.ctx.device_id(),
            settings: self.ctx.settings().get(),
            queued: queue.count().await?,
            last_sync: queue.last_sync().await?,
            last_outcome: self.synchronizer.last_report(),
            syncing: self.synchronizer.is_running(),
            auto_sync,
        })
    }

    /// Wipe all local state and start over as a new device
    ///
    /// Waits for an in-flight sync and for scans being recorded, then clears
    /// settings, the queue and the last-sync time, and regenerates the device
    /// identity. Queued scans that were never synced are lost. On error
    /// nothing has changed. Returns the new identity.
    pub async fn reset_device(&self) -> Result<DeviceId> {
        let _guard = self.synchronizer.exclusive().await;

        let discarded = self.ctx.queue().count().await.unwrap_or(0);
        if discarded > 0 {
            warn!(discarded, "Device reset discards unsynced scans");
        }

        let device_id = self.ctx.reset().await?;
        self.synchronizer.clear_last_report();

        info!(device_id = %device_id, "Device reset");
        Ok(device_id)
    }

    /// Stop background work
    pub async fn shutdown(&self) {
        self.stop_auto_sync().await;
        info!("Terminal shut down");
    }
}
