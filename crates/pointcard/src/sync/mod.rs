//! Queue synchronization
//!
//! The [`Synchronizer`] uploads the whole queue as one batch and removes it
//! only after the endpoint confirms it. The [`scheduler`] module drives it
//! opportunistically in the background.
//!
//! # Delivery
//!
//! Delivery is at-least-once. If the endpoint stores a batch but the answer
//! never reaches the terminal, the batch is sent again on the next attempt and
//! the endpoint sees duplicates. Batches carry no idempotency key; the
//! endpoint is expected to tolerate repeats.

pub mod payload;
pub mod scheduler;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::{Mutex as TokioMutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::context::AppContext;
use crate::error::{Error, Result};
use crate::identity::DeviceId;

pub use payload::{notify_url, NotifyRequest, SyncRecord, SyncRequest, SyncResponse};

/// Result of one sync attempt
#[derive(Debug, Clone)]
pub enum SyncOutcome {
    /// The queue was empty; nothing was sent
    NoOp,
    /// Another sync was in flight; this trigger did nothing
    AlreadyRunning,
    /// The endpoint accepted the batch and it was removed locally
    Success {
        /// Number of scans uploaded
        synced: usize,
        /// Message returned by the endpoint
        message: String,
    },
    /// Nothing was removed from the queue
    Failed(Error),
}

impl SyncOutcome {
    /// Whether a batch was confirmed
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Whether the attempt failed
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoOp => f.write_str("nothing to sync"),
            Self::AlreadyRunning => f.write_str("sync already in progress"),
            Self::Success { synced, message } => {
                write!(f, "synced {synced} scan(s): {message}")
            }
            Self::Failed(e) => write!(f, "sync failed: {e} (scans kept on this device)"),
        }
    }
}

/// A finished sync attempt, for status display
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// When the attempt finished
    pub at: DateTime<Utc>,
    /// What happened
    pub outcome: SyncOutcome,
}

/// Uploads the queue to the configured endpoint
#[derive(Debug)]
pub struct Synchronizer {
    ctx: Arc<AppContext>,
    client: reqwest::Client,
    /// Held for the duration of a sync; makes sync single-flight
    in_flight: TokioMutex<()>,
    last_report: RwLock<Option<SyncReport>>,
}

impl Synchronizer {
    /// Create a synchronizer using the context's request timeout
    pub fn new(ctx: Arc<AppContext>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(ctx.config().request_timeout())
            .build()
            .map_err(|e| Error::init(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            ctx,
            client,
            in_flight: TokioMutex::new(()),
            last_report: RwLock::new(None),
        })
    }

    /// The shared application context
    pub fn context(&self) -> &Arc<AppContext> {
        &self.ctx
    }

    /// Whether a sync is currently in flight
    pub fn is_running(&self) -> bool {
        self.in_flight.try_lock().is_err()
    }

    /// The most recent finished attempt
    pub fn last_report(&self) -> Option<SyncReport> {
        self.last_report.read().clone()
    }

    /// Wait for any in-flight sync and block new ones while the guard lives
    pub(crate) async fn exclusive(&self) -> MutexGuard<'_, ()> {
        self.in_flight.lock().await
    }

    pub(crate) fn clear_last_report(&self) {
        *self.last_report.write() = None;
    }

    /// Upload the queue once
    ///
    /// Never panics and never drops queued scans on failure: any outcome
    /// other than [`SyncOutcome::Success`] leaves the queue exactly as it was.
    pub async fn sync(&self) -> SyncOutcome {
        let Ok(_guard) = self.in_flight.try_lock() else {
            debug!("Sync requested while another sync is running");
            return SyncOutcome::AlreadyRunning;
        };

        let outcome = match self.run().await {
            Ok(outcome) => outcome,
            Err(e) => SyncOutcome::Failed(e),
        };

        match &outcome {
            SyncOutcome::Success { synced, .. } => info!(synced, "Sync completed"),
            SyncOutcome::Failed(e) => warn!(error = %e, "Sync failed, queue kept"),
            other => debug!(outcome = %other, "Sync finished"),
        }

        *self.last_report.write() = Some(SyncReport {
            at: Utc::now(),
            outcome: outcome.clone(),
        });
        outcome
    }

    async fn run(&self) -> Result<SyncOutcome> {
        let batch = self.ctx.queue().read_all().await?;
        let Some(through_seq) = batch.last().map(|queued| queued.seq) else {
            return Ok(SyncOutcome::NoOp);
        };

        let settings = self.ctx.require_settings()?;

        let device_id = self.ctx.device_id();
        let request = SyncRequest::new(&settings, &device_id, &batch);

        info!(
            count = batch.len(),
            endpoint = %settings.endpoint_url,
            "Uploading scan batch"
        );

        let response = self
            .client
            .post(&settings.endpoint_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::transport(format!("failed to reach endpoint: {e}")))?;

        let http_status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::transport(format!("failed to read response: {e}")))?;

        let Ok(answer) = serde_json::from_str::<SyncResponse>(&body) else {
            return Err(Error::rejected(format!(
                "server returned {http_status} with an unreadable body"
            )));
        };

        let message = answer
            .message
            .clone()
            .unwrap_or_else(|| "unknown error".to_string());

        if !http_status.is_success() {
            return Err(Error::rejected(format!("server returned {http_status}: {message}")));
        }
        if !answer.is_accepted() {
            let status = answer
                .status
                .map_or_else(|| "missing".to_string(), |s| s.to_string());
            return Err(Error::rejected(format!("status {status}: {message}")));
        }

        self.ctx.queue().commit_batch(through_seq, Utc::now()).await?;
        self.spawn_notify(&settings.endpoint_url, &device_id);

        Ok(SyncOutcome::Success {
            synced: batch.len(),
            message: answer.message.unwrap_or_default(),
        })
    }

    /// Tell the endpoint this device just synced, without waiting
    ///
    /// The result of the sync is already final; a failed notice is only
    /// logged.
    fn spawn_notify(&self, endpoint_url: &str, device_id: &DeviceId) -> JoinHandle<()> {
        let client = self.client.clone();
        let url = notify_url(endpoint_url);
        let body = NotifyRequest::last_sync(device_id);

        tokio::spawn(async move {
            match client.post(&url).json(&body).send().await {
                Ok(resp) if resp.status().is_success() => {
                    debug!(url = %url, "Last-sync notification delivered");
                }
                Ok(resp) => {
                    warn!(url = %url, status = %resp.status(), "Last-sync notification rejected");
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Last-sync notification failed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::scan::ScanSource;
    use crate::settings::Settings;
    use tempfile::TempDir;

    async fn context(dir: &TempDir) -> Arc<AppContext> {
        Arc::new(AppContext::load(Config::new(dir.path())).await.unwrap())
    }

    #[tokio::test]
    async fn test_unconfigured_empty_queue_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let sync = Synchronizer::new(context(&temp_dir).await).unwrap();

        let outcome = sync.sync().await;
        assert!(matches!(outcome, SyncOutcome::NoOp));
        assert_eq!(outcome.to_string(), "nothing to sync");
    }

    #[tokio::test]
    async fn test_unconfigured_sync_with_scans_fails_without_network() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context(&temp_dir).await;
        ctx.settings()
            .save(Settings::new("http://127.0.0.1:9/exec", "s1", 1).unwrap())
            .await
            .unwrap();
        ctx.record_scan("12345678901234", ScanSource::Manual).await.unwrap();
        ctx.settings().clear().await.unwrap();

        let sync = Synchronizer::new(Arc::clone(&ctx)).unwrap();
        let outcome = sync.sync().await;

        assert!(matches!(outcome, SyncOutcome::Failed(Error::ConfigIncomplete)));
        assert!(sync.last_report().is_some());
        assert_eq!(ctx.queue().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_queue_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context(&temp_dir).await;
        // Port 9 on localhost: nothing listens, but an empty queue never connects.
        ctx.settings()
            .save(Settings::new("http://127.0.0.1:9/exec", "s1", 1).unwrap())
            .await
            .unwrap();

        let sync = Synchronizer::new(ctx).unwrap();
        assert!(matches!(sync.sync().await, SyncOutcome::NoOp));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_keeps_queue() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = context(&temp_dir).await;
        ctx.settings()
            .save(Settings::new("http://127.0.0.1:9/exec", "s1", 1).unwrap())
            .await
            .unwrap();
        ctx.record_scan("12345678901234", ScanSource::Manual).await.unwrap();

        let sync = Synchronizer::new(Arc::clone(&ctx)).unwrap();
        let outcome = sync.sync().await;

        assert!(matches!(outcome, SyncOutcome::Failed(Error::Transport(_))));
        assert!(outcome.to_string().contains("scans kept"));
        assert_eq!(ctx.queue().count().await.unwrap(), 1);
        assert!(ctx.queue().last_sync().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_exclusive_blocks_sync() {
        let temp_dir = TempDir::new().unwrap();
        let sync = Synchronizer::new(context(&temp_dir).await).unwrap();

        let guard = sync.exclusive().await;
        assert!(sync.is_running());
        assert!(matches!(sync.sync().await, SyncOutcome::AlreadyRunning));
        drop(guard);
        assert!(!sync.is_running());
    }

    #[test]
    fn test_outcome_text() {
        let success = SyncOutcome::Success {
            synced: 3,
            message: "ok".into(),
        };
        assert_eq!(success.to_string(), "synced 3 scan(s): ok");
        assert_eq!(SyncOutcome::NoOp.to_string(), "nothing to sync");
        assert!(SyncOutcome::Failed(Error::transport("timed out"))
            .to_string()
            .contains("timed out"));
    }
}
