//! # pointcard - Offline-first scan queue for loyalty point terminals
//!
//! An operator scans a member's 14-digit ID (camera QR capture or manual
//! entry). Every accepted scan is appended to a durable local queue, so the
//! terminal keeps working without network connectivity. The queue is uploaded
//! in one batch to a remote aggregation endpoint, either on demand or by a
//! background auto-sync loop, and is only cleared once the endpoint confirms
//! the batch.
//!
//! ## Guarantees
//!
//! - **Durable**: scans survive process restarts (SQLite-backed queue).
//! - **At-least-once**: a batch leaves the device only after the endpoint
//!   answers with `status: 200`. Any failure keeps every entry for the next
//!   attempt.
//! - **Single-flight**: one sync runs at a time; a concurrent trigger
//!   observes [`SyncOutcome::AlreadyRunning`].
//! - **Attributed**: each scan and batch carries a per-installation device ID.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pointcard::{Config, PointCard, Settings};
//!
//! #[tokio::main]
//! async fn main() -> pointcard::Result<()> {
//!     let terminal = PointCard::init(Config::new("/var/lib/pointcard")).await?;
//!
//!     // One-time setup by the operator
//!     terminal
//!         .save_settings(Settings::new("https://points.example.com/exec", "store-7", 10)?)
//!         .await?;
//!
//!     // Scans are queued locally, online or not
//!     terminal.manual_entry(" 12345678901234 ").await?;
//!
//!     // Upload whatever is queued
//!     let outcome = terminal.sync_now().await;
//!     println!("{outcome}");
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`app`]: the [`PointCard`] facade exposing every operator action
//! - [`capture`]: capture event channel and scan sessions
//! - [`config`]: process configuration (paths, intervals, timeouts)
//! - [`context`]: the shared application context
//! - [`error`]: error taxonomy and [`Result`] alias
//! - [`identity`]: per-installation device identity
//! - [`queue`]: the durable scan queue and persisted sync state
//! - [`scan`]: member ID validation and [`ScanEntry`]
//! - [`settings`]: operator settings and their persistent store
//! - [`sync`]: the synchronizer, wire payloads and auto-sync scheduler

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::all)]

pub mod app;
pub mod capture;
pub mod config;
pub mod context;
pub mod error;
pub mod identity;
pub mod queue;
pub mod scan;
pub mod settings;
pub mod sync;

pub use app::{PointCard, TerminalStatus};
pub use capture::{CaptureEvent, CaptureSource, ScanReport, ScanSession};
pub use config::Config;
pub use context::AppContext;
pub use error::{Error, Result};
pub use identity::DeviceId;
pub use queue::{QueueStore, QueuedScan};
pub use scan::{validate, MemberId, ScanEntry, ScanSource};
pub use settings::{Settings, SettingsStore};
pub use sync::scheduler::AutoSync;
pub use sync::{SyncOutcome, SyncReport, Synchronizer};

/// Number of decimal digits in a canonical member ID.
pub const MEMBER_ID_LEN: usize = 14;

/// Default auto-sync interval in seconds.
///
/// Can be configured via [`Config::with_sync_interval`].
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 60;

/// Default timeout for a single sync request, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default timeout for the auto-sync reachability probe, in milliseconds.
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 3_000;
