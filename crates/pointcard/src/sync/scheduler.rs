//! Background auto-sync
//!
//! Every interval the scheduler checks for queued scans and a reachable
//! endpoint, and runs the [`Synchronizer`] when both hold. A skipped or
//! failed tick changes nothing: there is no backoff and no persisted
//! schedule, the next tick simply tries again.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{SyncOutcome, Synchronizer};

/// Handle to a running auto-sync loop
///
/// Dropping the handle also stops the loop.
#[derive(Debug)]
pub struct AutoSync {
    handle: Option<JoinHandle<()>>,
    shutdown_tx: watch::Sender<bool>,
}

impl AutoSync {
    /// Start the loop
    pub fn spawn(sync: Arc<Synchronizer>, interval: Duration, probe_timeout: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            info!(interval_secs = interval.as_secs_f64(), "Auto-sync loop started");

            loop {
                tokio::select! {
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            info!("Auto-sync loop received shutdown signal");
                            break;
                        }
                    }
                    _ = tokio::time::sleep(interval) => {
                        if let Some(outcome) = tick(&sync, probe_timeout).await {
                            debug!(outcome = %outcome, "Auto-sync tick finished");
                        }
                    }
                }
            }

            info!("Auto-sync loop stopped");
        });

        Self {
            handle: Some(handle),
            shutdown_tx,
        }
    }

    /// Whether the loop task is still alive
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the loop, letting an in-flight sync finish
    pub async fn shutdown(mut self) {
        if self.shutdown_tx.send(true).is_err() {
            debug!("Auto-sync loop already stopped");
        }

        if let Some(handle) = self.handle.take() {
            let abort = handle.abort_handle();
            match tokio::time::timeout(Duration::from_secs(5), handle).await {
                Ok(Ok(())) => debug!("Auto-sync loop stopped gracefully"),
                Ok(Err(e)) => warn!("Auto-sync task panicked: {e}"),
                Err(_) => {
                    warn!("Auto-sync loop did not stop within timeout, aborting");
                    abort.abort();
                }
            }
        }
    }
}

/// One scheduler tick
///
/// Returns `None` when the tick was skipped: nothing queued, no settings, or
/// the endpoint is unreachable.
pub async fn tick(sync: &Synchronizer, probe_timeout: Duration) -> Option<SyncOutcome> {
    let ctx = sync.context();

    let queued = match ctx.queue().count().await {
        Ok(0) => {
            debug!("Auto-sync skipped: queue is empty");
            return None;
        }
        Ok(n) => n,
        Err(e) => {
            warn!(error = %e, "Auto-sync skipped: queue unreadable");
            return None;
        }
    };

    let Some(settings) = ctx.settings().get() else {
        debug!("Auto-sync skipped: settings incomplete");
        return None;
    };

    if !endpoint_reachable(&settings.endpoint_url, probe_timeout).await {
        debug!(queued, endpoint = %settings.endpoint_url, "Auto-sync skipped: endpoint unreachable");
        return None;
    }

    info!(queued, "Online with queued scans, attempting auto-sync");
    Some(sync.sync().await)
}

/// Whether a TCP connection to the endpoint's host and port succeeds in time
pub async fn endpoint_reachable(endpoint_url: &str, timeout: Duration) -> bool {
    let Ok(url) = Url::parse(endpoint_url) else {
        return false;
    };
    let (Some(host), Some(port)) = (url.host_str(), url.port_or_known_default()) else {
        return false;
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');

    matches!(
        tokio::time::timeout(timeout, TcpStream::connect((host, port))).await,
        Ok(Ok(_))
    )
}
