//! Capture events and scan sessions
//!
//! A capture component (camera + QR decoder, a keyboard-wedge scanner, a
//! test harness) only has to emit [`CaptureEvent`]s on a channel. A
//! [`ScanSession`] consumes them, runs each decoded text through validation
//! and the queue, and reports the result of every event back on a second
//! channel for the UI.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::context::AppContext;
use crate::error::{Error, Result};
use crate::queue::QueuedScan;
use crate::scan::ScanSource;

/// Reports buffered between the session task and the UI
const REPORT_BUFFER: usize = 32;

/// Something the capture component observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// A code was decoded
    Decoded(String),
    /// A frame contained no code
    NotFound,
    /// The decoder hit an error; capture continues
    Error(String),
}

/// A source of capture events
///
/// `open` acquires the underlying device. Failing to open it yields
/// [`Error::CaptureUnavailable`]; the operator can retry or fall back to
/// manual entry.
pub trait CaptureSource: Send + 'static {
    /// Start capturing
    fn open(self) -> Result<mpsc::Receiver<CaptureEvent>>;
}

impl CaptureSource for mpsc::Receiver<CaptureEvent> {
    fn open(self) -> Result<mpsc::Receiver<CaptureEvent>> {
        Ok(self)
    }
}

/// What happened to one capture event
#[derive(Debug, Clone)]
pub enum ScanReport {
    /// Validated and durably queued
    Accepted(QueuedScan),
    /// Not a member ID; nothing queued
    Rejected {
        /// The decoded text
        raw: String,
        /// Why it was rejected
        error: Error,
    },
    /// Valid input that could not be recorded
    Failed(Error),
    /// The decoder reported an error
    CaptureError(String),
}

impl fmt::Display for ScanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted(queued) => {
                write!(f, "point added: {} (queued offline)", queued.entry.member_id)
            }
            Self::Rejected { raw, .. } => write!(f, "invalid QR code: {}", raw.trim()),
            Self::Failed(e) => write!(f, "scan not saved: {e}"),
            Self::CaptureError(msg) => write!(f, "capture error: {msg}"),
        }
    }
}

/// A running scan session
///
/// The session ends when [`ScanSession::stop`] is called, when the capture
/// source closes its channel, or when the session is dropped.
#[derive(Debug)]
pub struct ScanSession {
    reports: mpsc::Receiver<ScanReport>,
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ScanSession {
    pub(crate) fn start(ctx: Arc<AppContext>, mut events: mpsc::Receiver<CaptureEvent>) -> Self {
        let (report_tx, reports) = mpsc::channel(REPORT_BUFFER);
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            info!("Scan session started");

            loop {
                tokio::select! {
                    biased;

                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            debug!("Scan session stop requested");
                            break;
                        }
                    }
                    event = events.recv() => {
                        let report = match event {
                            None => {
                                debug!("Capture source closed");
                                break;
                            }
                            Some(CaptureEvent::NotFound) => continue,
                            Some(CaptureEvent::Error(msg)) => {
                                warn!(error = %msg, "Capture error");
                                ScanReport::CaptureError(msg)
                            }
                            Some(CaptureEvent::Decoded(text)) => {
                                match ctx.record_scan(&text, ScanSource::Camera).await {
                                    Ok(queued) => ScanReport::Accepted(queued),
                                    Err(error @ Error::InvalidFormat(_)) => {
                                        ScanReport::Rejected { raw: text, error }
                                    }
                                    Err(error) => ScanReport::Failed(error),
                                }
                            }
                        };

                        if report_tx.send(report).await.is_err() {
                            debug!("Scan report receiver dropped");
                            break;
                        }
                    }
                }
            }

            info!("Scan session stopped");
        });

        Self {
            reports,
            stop_tx,
            handle,
        }
    }

    /// Next report, or `None` once the session has ended and all reports
    /// were drained
    pub async fn next_report(&mut self) -> Option<ScanReport> {
        self.reports.recv().await
    }

    /// Ask the session to stop after the current event
    pub fn stop(&self) {
        let _ = self.stop_tx.send(true);
    }

    /// Whether the session task is still consuming events
    pub fn is_active(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stop and wait for the session task to exit
    pub async fn finish(self) {
        self.stop();
        if let Err(e) = self.handle.await {
            warn!("Scan session task panicked: {e}");
        }
    }
}
