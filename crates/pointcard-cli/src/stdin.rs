//! Capture source reading decoded codes from stdin
//!
//! Keyboard-wedge scanners type each code followed by Enter, so every line
//! is one decode. Blank lines count as "no code found".

use std::io::BufRead;

use pointcard::{CaptureEvent, CaptureSource, Error};
use tokio::sync::mpsc;
use tracing::debug;

pub struct StdinScanner;

impl CaptureSource for StdinScanner {
    fn open(self) -> pointcard::Result<mpsc::Receiver<CaptureEvent>> {
        let (tx, rx) = mpsc::channel(16);

        // A plain thread: a blocking stdin read must not hold up runtime shutdown
        std::thread::Builder::new()
            .name("stdin-scanner".into())
            .spawn(move || {
                for line in std::io::stdin().lock().lines() {
                    let event = match line {
                        Ok(line) if line.trim().is_empty() => CaptureEvent::NotFound,
                        Ok(line) => CaptureEvent::Decoded(line),
                        Err(e) => {
                            let _ = tx.blocking_send(CaptureEvent::Error(e.to_string()));
                            break;
                        }
                    };
                    if tx.blocking_send(event).is_err() {
                        break;
                    }
                }
                debug!("Stdin closed");
            })
            .map_err(|e| Error::capture(format!("failed to start stdin reader: {e}")))?;

        Ok(rx)
    }
}
