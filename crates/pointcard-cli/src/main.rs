//! pointcard terminal
//!
//! Operator front end for a loyalty point scan terminal.
//!
//! ## Commands
//!
//! - **configure**: save endpoint URL, store ID and point value
//! - **show**: settings, device ID, queued scans, last sync
//! - **enter**: queue a member ID typed by the operator
//! - **scan**: read scanned codes from stdin with auto-sync running
//! - **sync**: upload the queue now
//! - **reset**: wipe local state and regenerate the device ID

mod commands;
mod stdin;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

use pointcard::{Config, PointCard};

/// pointcard - offline-first loyalty point terminal
#[derive(Parser, Debug)]
#[command(name = "pointcard")]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory holding settings, device ID and the scan queue
    #[arg(long, env = "POINTCARD_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Auto-sync interval in seconds while scanning
    #[arg(long, default_value_t = pointcard::DEFAULT_SYNC_INTERVAL_SECS, env = "POINTCARD_SYNC_INTERVAL")]
    sync_interval: u64,

    /// Log level
    #[arg(long, default_value = "warn", env = "POINTCARD_LOG_LEVEL")]
    log_level: Level,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Save operator settings
    Configure {
        /// Aggregation endpoint URL
        #[arg(long)]
        endpoint: String,
        /// Store ID
        #[arg(long)]
        store_id: String,
        /// Points granted per scan
        #[arg(long)]
        points: String,
    },
    /// Show settings and queue status
    Show,
    /// Queue a member ID by hand (prompts when omitted)
    Enter {
        /// 14-digit member ID
        member_id: Option<String>,
    },
    /// Read scanned codes from stdin, one per line, until EOF or ctrl-c
    Scan,
    /// Upload queued scans now
    Sync,
    /// Wipe all local state and regenerate the device ID
    Reset {
        /// Confirm the reset; unsynced scans are lost
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries operator output
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let data_dir = args
        .data_dir
        .unwrap_or_else(Config::default_storage_path);
    debug!(data_dir = %data_dir.display(), "Data directory");

    let config = Config::new(&data_dir).with_sync_interval(args.sync_interval);
    let terminal = PointCard::init(config)
        .await
        .with_context(|| format!("Failed to open terminal state in {}", data_dir.display()))?;

    let result = match args.command {
        Command::Configure {
            endpoint,
            store_id,
            points,
        } => commands::configure(&terminal, &endpoint, &store_id, &points).await,
        Command::Show => commands::show(&terminal).await,
        Command::Enter { member_id } => commands::enter(&terminal, member_id).await,
        Command::Scan => commands::scan(&terminal).await,
        Command::Sync => commands::sync(&terminal).await,
        Command::Reset { yes } => commands::reset(&terminal, yes).await,
    };

    terminal.shutdown().await;
    result
}
