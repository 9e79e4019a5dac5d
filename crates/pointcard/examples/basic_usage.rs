//! Basic usage example for pointcard.
//!
//! This example walks through a terminal's day:
//! - Initializing the terminal
//! - Saving operator settings
//! - Queueing scans (manual entry and a capture session)
//! - Checking status and syncing
//!
//! Run with: cargo run -p pointcard --example basic_usage
//!
//! Set `POINTCARD_ENDPOINT` to a real aggregation endpoint to see a
//! successful sync; otherwise the sync fails and the scans stay queued.

use pointcard::{CaptureEvent, Config, PointCard, ScanReport, Settings};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> pointcard::Result<()> {
    tracing_subscriber::fmt::init();

    println!("=== pointcard Basic Usage Example ===\n");

    // -------------------------------------------------------------------------
    // Step 1: Initialize the terminal
    // -------------------------------------------------------------------------
    println!("1. Initializing terminal...");

    // In a real deployment, use Config::default() for a persistent path
    let storage_path = std::env::temp_dir().join("pointcard-example");
    println!("   Storage path: {}", storage_path.display());

    let terminal = PointCard::init(Config::new(&storage_path).with_sync_interval(30)).await?;
    println!("   Device ID: {}\n", terminal.device_id());

    // -------------------------------------------------------------------------
    // Step 2: Operator settings
    // -------------------------------------------------------------------------
    println!("2. Saving settings...");

    let endpoint = std::env::var("POINTCARD_ENDPOINT")
        .unwrap_or_else(|_| "http://127.0.0.1:9/exec".to_string());
    terminal
        .save_settings(Settings::parse(&endpoint, "store-7", "10")?)
        .await?;
    println!("   Endpoint: {endpoint}\n");

    // -------------------------------------------------------------------------
    // Step 3: Queue scans
    // -------------------------------------------------------------------------
    println!("3. Queueing scans...");

    let queued = terminal.manual_entry(" 12345678901234 ").await?;
    println!("   Manual entry queued as #{}", queued.seq);

    match terminal.manual_entry("12-34").await {
        Ok(_) => println!("   Unexpectedly accepted"),
        Err(e) => println!("   Rejected: {e}"),
    }

    // Any component that emits capture events can drive a session
    let (tx, rx) = mpsc::channel(8);
    let mut session = terminal.start_scan(rx)?;
    tx.send(CaptureEvent::NotFound).await.ok();
    tx.send(CaptureEvent::Decoded("98765432109876".into())).await.ok();
    drop(tx);

    while let Some(report) = session.next_report().await {
        match report {
            ScanReport::Accepted(_) => println!("   {report}"),
            other => println!("   (not queued) {other}"),
        }
    }
    println!();

    // -------------------------------------------------------------------------
    // Step 4: Status and sync
    // -------------------------------------------------------------------------
    println!("4. Syncing...");

    let status = terminal.status().await?;
    println!("   Queued scans: {}", status.queued);

    let outcome = terminal.sync_now().await;
    println!("   {outcome}");

    let status = terminal.status().await?;
    println!("   Queued scans after sync: {}", status.queued);
    match status.last_sync {
        Some(at) => println!("   Last sync: {at}"),
        None => println!("   Last sync: never"),
    }
    println!();

    // -------------------------------------------------------------------------
    // Step 5: Shutdown
    // -------------------------------------------------------------------------
    println!("5. Shutting down...");
    terminal.shutdown().await;

    println!("\n=== Example complete ===");
    Ok(())
}
