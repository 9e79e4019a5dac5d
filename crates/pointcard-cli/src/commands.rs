//! Subcommand handlers

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, Utc};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

use pointcard::{Error, PointCard, ScanReport, Settings, SyncOutcome};

use crate::stdin::StdinScanner;

pub async fn configure(
    terminal: &PointCard,
    endpoint: &str,
    store_id: &str,
    points: &str,
) -> Result<()> {
    let settings = Settings::parse(endpoint, store_id, points).context("Settings not saved")?;
    terminal
        .save_settings(settings)
        .await
        .context("Settings not saved")?;

    println!("Settings saved.");
    Ok(())
}

pub async fn show(terminal: &PointCard) -> Result<()> {
    let status = terminal.status().await.context("Failed to read status")?;

    match &status.settings {
        Some(settings) => {
            println!("Endpoint:     {}", settings.endpoint_url);
            println!("Store ID:     {}", settings.store_id);
            println!("Point value:  {}", settings.point_value);
        }
        None => println!("Settings:     not configured (run `pointcard configure`)"),
    }
    println!("Device ID:    {}", status.device_id);
    println!("Queued scans: {}", status.queued);
    println!("Last sync:    {}", local_time(status.last_sync));
    Ok(())
}

pub async fn enter(terminal: &PointCard, member_id: Option<String>) -> Result<()> {
    let raw = match member_id {
        Some(raw) => raw,
        None => match prompt("Member ID: ").await? {
            Some(raw) => raw,
            None => {
                println!("Cancelled.");
                return Ok(());
            }
        },
    };

    match terminal.manual_entry(&raw).await {
        Ok(queued) => {
            println!("Point added: {} (queued offline)", queued.entry.member_id);
            Ok(())
        }
        Err(Error::InvalidFormat(_)) => bail!("Invalid member ID: {}", raw.trim()),
        Err(e) => Err(e).context("Scan not saved"),
    }
}

pub async fn scan(terminal: &PointCard) -> Result<()> {
    let mut session = terminal
        .start_scan(StdinScanner)
        .context("Cannot start scanning")?;
    terminal.start_auto_sync().await;

    println!("Scanning; one code per line. Ctrl-C or EOF to stop.");

    let mut accepted = 0usize;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received ctrl-c, stopping scan session");
                break;
            }
            report = session.next_report() => {
                let Some(report) = report else { break };
                if matches!(report, ScanReport::Accepted(_)) {
                    accepted += 1;
                }
                println!("{report}");
            }
        }
    }

    session.finish().await;
    terminal.stop_auto_sync().await;

    let status = terminal.status().await.context("Failed to read status")?;
    println!(
        "Session ended: {accepted} scan(s) added, {} waiting for sync.",
        status.queued
    );
    Ok(())
}

pub async fn sync(terminal: &PointCard) -> Result<()> {
    let outcome = terminal.sync_now().await;
    println!("{outcome}");

    if let SyncOutcome::Failed(e) = outcome {
        return Err(e).context("Sync failed");
    }
    Ok(())
}

pub async fn reset(terminal: &PointCard, yes: bool) -> Result<()> {
    if !yes {
        let queued = terminal.status().await.map(|s| s.queued).unwrap_or(0);
        bail!(
            "Refusing to reset without --yes ({queued} unsynced scan(s) would be lost)"
        );
    }

    let device_id = terminal.reset_device().await.context("Reset failed")?;
    println!("Device reset. New device ID: {device_id}");
    Ok(())
}

/// Ask for one line; `None` when the operator enters nothing or stdin is closed
async fn prompt(label: &str) -> Result<Option<String>> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(label.as_bytes()).await?;
    stdout.flush().await?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("Failed to read member ID")?;
    Ok(answer(line))
}

fn answer(line: String) -> Option<String> {
    if line.trim().is_empty() {
        None
    } else {
        Some(line)
    }
}

fn local_time(at: Option<DateTime<Utc>>) -> String {
    at.map_or_else(
        || "never".to_string(),
        |at| at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_answer_cancels() {
        assert_eq!(answer(String::new()), None);
        assert_eq!(answer("  \n".to_string()), None);
        assert_eq!(
            answer("12345678901234\n".to_string()).as_deref(),
            Some("12345678901234\n")
        );
    }

    #[test]
    fn test_local_time_never() {
        assert_eq!(local_time(None), "never");
    }

    #[test]
    fn test_local_time_format() {
        let rendered = local_time(Some(Utc::now()));
        assert_eq!(rendered.len(), "2024-01-02 03:04:05".len());
    }
}
