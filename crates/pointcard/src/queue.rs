//! Durable scan queue
//!
//! Pending scans live in a SQLite database next to the persisted sync state.
//! The queue is append-only from the scanning side: entries are never edited
//! and never deleted one by one. Only a confirmed sync (or a device reset)
//! removes them, and always as a whole batch.
//!
//! ## Durability
//!
//! - Every append is a single `INSERT`, so it either commits or leaves the
//!   table untouched.
//! - Removing a synced batch and recording the sync time happen in one
//!   transaction.
//! - All SQLite work runs on the blocking pool; callers just `.await`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::identity::DeviceId;
use crate::scan::{MemberId, ScanEntry};

const LAST_SYNC_KEY: &str = "last_sync_ms";

/// A queued scan with its device-internal sequence number
///
/// `seq` orders the queue and marks batch boundaries; it never leaves the
/// device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedScan {
    /// Insertion order, strictly increasing
    pub seq: i64,
    /// The scan itself
    pub entry: ScanEntry,
}

/// SQLite-backed queue of pending scans
#[derive(Debug, Clone)]
pub struct QueueStore {
    path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl QueueStore {
    /// Open or create the queue database
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::storage(format!("failed to create queue directory: {e}")))?;
        }

        let conn = Connection::open(path)
            .map_err(|e| Error::storage(format!("failed to open queue database: {e}")))?;

        conn.execute_batch(
            "PRAGMA synchronous = FULL;
             CREATE TABLE IF NOT EXISTS scans (
                 seq INTEGER PRIMARY KEY AUTOINCREMENT,
                 member_id TEXT NOT NULL,
                 timestamp TEXT NOT NULL,
                 device_id TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS sync_state (
                 key TEXT PRIMARY KEY,
                 value INTEGER NOT NULL
             );",
        )
        .map_err(|e| Error::storage(format!("failed to create queue tables: {e}")))?;

        debug!(path = %path.display(), "Queue database opened");

        Ok(Self {
            path: path.to_path_buf(),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Path of the underlying database
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` against the connection on the blocking pool
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            f(&mut guard)
        })
        .await
        .map_err(|e| Error::storage(format!("queue task failed: {e}")))?
    }

    /// Durably append one scan
    ///
    /// Returns the stored entry with its sequence number. If this fails the
    /// scan was not queued and existing entries are unaffected.
    pub async fn append(&self, entry: ScanEntry) -> Result<QueuedScan> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO scans (member_id, timestamp, device_id) VALUES (?1, ?2, ?3)",
                params![entry.member_id.as_str(), entry.timestamp_iso(), entry.device_id.as_str()],
            )
            .map_err(|e| Error::storage(format!("failed to append scan: {e}")))?;

            let seq = conn.last_insert_rowid();
            debug!(seq, member_id = %entry.member_id, "Scan queued");
            Ok(QueuedScan { seq, entry })
        })
        .await
    }

    /// All queued scans in insertion order
    pub async fn read_all(&self) -> Result<Vec<QueuedScan>> {
        self.with_conn(|conn| {
            let mut stmt = conn
                .prepare("SELECT seq, member_id, timestamp, device_id FROM scans ORDER BY seq")
                .map_err(|e| Error::storage(format!("failed to prepare statement: {e}")))?;

            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })
                .map_err(|e| Error::storage(format!("failed to query scans: {e}")))?;

            let mut scans = Vec::new();
            for row in rows {
                let (seq, member_id, timestamp, device_id) =
                    row.map_err(|e| Error::storage(format!("failed to read scan row: {e}")))?;
                scans.push(decode_row(seq, &member_id, &timestamp, device_id)?);
            }
            Ok(scans)
        })
        .await
    }

    /// Number of queued scans
    pub async fn count(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM scans", [], |row| row.get(0))
                .map_err(|e| Error::storage(format!("failed to count scans: {e}")))?;
            Ok(usize::try_from(count).unwrap_or(0))
        })
        .await
    }

    /// Remove every queued scan
    pub async fn clear(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let removed = conn
                .execute("DELETE FROM scans", [])
                .map_err(|e| Error::storage(format!("failed to clear queue: {e}")))?;
            info!(removed, "Queue cleared");
            Ok(removed)
        })
        .await
    }

    /// Remove queued scans up to and including `seq`
    pub async fn clear_through(&self, seq: i64) -> Result<usize> {
        self.with_conn(move |conn| {
            let removed = conn
                .execute("DELETE FROM scans WHERE seq <= ?1", [seq])
                .map_err(|e| Error::storage(format!("failed to clear queue: {e}")))?;
            debug!(removed, through = seq, "Queue cleared through sequence");
            Ok(removed)
        })
        .await
    }

    /// Drop a confirmed batch and record the sync time, atomically
    ///
    /// Scans appended after the batch was read (`seq` greater than
    /// `through_seq`) stay queued.
    pub async fn commit_batch(&self, through_seq: i64, synced_at: DateTime<Utc>) -> Result<usize> {
        self.with_conn(move |conn| {
            let tx = conn
                .transaction()
                .map_err(|e| Error::storage(format!("failed to begin transaction: {e}")))?;
            let removed = tx
                .execute("DELETE FROM scans WHERE seq <= ?1", [through_seq])
                .map_err(|e| Error::storage(format!("failed to clear synced batch: {e}")))?;
            tx.execute(
                "INSERT INTO sync_state (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![LAST_SYNC_KEY, synced_at.timestamp_millis()],
            )
            .map_err(|e| Error::storage(format!("failed to record sync time: {e}")))?;
            tx.commit()
                .map_err(|e| Error::storage(format!("failed to commit synced batch: {e}")))?;
            Ok(removed)
        })
        .await
    }

    /// Time of the last confirmed sync, if any
    pub async fn last_sync(&self) -> Result<Option<DateTime<Utc>>> {
        self.with_conn(|conn| {
            let millis: Option<i64> = conn
                .query_row(
                    "SELECT value FROM sync_state WHERE key = ?1",
                    [LAST_SYNC_KEY],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| Error::storage(format!("failed to read sync state: {e}")))?;
            Ok(millis.and_then(DateTime::<Utc>::from_timestamp_millis))
        })
        .await
    }

    /// Wipe every scan and the sync state in one transaction
    pub async fn reset(&self) -> Result<()> {
        self.with_conn(|conn| {
            let tx = conn
                .transaction()
                .map_err(|e| Error::storage(format!("failed to begin transaction: {e}")))?;
            tx.execute("DELETE FROM scans", [])
                .map_err(|e| Error::storage(format!("failed to clear queue: {e}")))?;
            tx.execute("DELETE FROM sync_state", [])
                .map_err(|e| Error::storage(format!("failed to clear sync state: {e}")))?;
            tx.commit()
                .map_err(|e| Error::storage(format!("failed to commit reset: {e}")))?;
            info!("Queue and sync state reset");
            Ok(())
        })
        .await
    }
}

fn decode_row(seq: i64, member_id: &str, timestamp: &str, device_id: String) -> Result<QueuedScan> {
    let member_id = MemberId::parse(member_id)
        .map_err(|e| Error::storage(format!("corrupt queue entry {seq}: {e}")))?;
    let timestamp = DateTime::parse_from_rfc3339(timestamp)
        .map_err(|e| Error::storage(format!("corrupt timestamp in queue entry {seq}: {e}")))?
        .with_timezone(&Utc);

    Ok(QueuedScan {
        seq,
        entry: ScanEntry {
            member_id,
            timestamp,
            device_id: DeviceId::from_stored(device_id),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::validate;
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, QueueStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = QueueStore::open(&temp_dir.path().join("queue.db")).unwrap();
        (temp_dir, store)
    }

    fn entry(n: u64) -> ScanEntry {
        let device_id = DeviceId::generate();
        validate(&format!("{n:014}"), &device_id, Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn test_append_preserves_order_and_count() {
        let (_dir, store) = open_temp();

        for n in 1..=5 {
            store.append(entry(n)).await.unwrap();
        }

        assert_eq!(store.count().await.unwrap(), 5);
        let ids: Vec<String> = store
            .read_all()
            .await
            .unwrap()
            .into_iter()
            .map(|q| q.entry.member_id.to_string())
            .collect();
        let expected: Vec<String> = (1..=5).map(|n| format!("{n:014}")).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn test_entries_roundtrip_exactly() {
        let (_dir, store) = open_temp();
        let original = entry(42);
        let queued = store.append(original.clone()).await.unwrap();

        let all = store.read_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].seq, queued.seq);
        assert_eq!(all[0].entry.member_id, original.member_id);
        assert_eq!(all[0].entry.device_id, original.device_id);
        assert_eq!(all[0].entry.timestamp_iso(), original.timestamp_iso());
    }

    #[tokio::test]
    async fn test_clear_empties_queue() {
        let (_dir, store) = open_temp();
        for n in 1..=3 {
            store.append(entry(n)).await.unwrap();
        }

        assert_eq!(store.clear().await.unwrap(), 3);
        assert!(store.read_all().await.unwrap().is_empty());
        assert_eq!(store.count().await.unwrap(), 0);

        // Clearing an empty queue is fine
        assert_eq!(store.clear().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_commit_batch_keeps_later_entries() {
        let (_dir, store) = open_temp();
        store.append(entry(1)).await.unwrap();
        let second = store.append(entry(2)).await.unwrap();
        store.append(entry(3)).await.unwrap();

        let synced_at = Utc::now();
        let removed = store.commit_batch(second.seq, synced_at).await.unwrap();
        assert_eq!(removed, 2);

        let remaining = store.read_all().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].entry.member_id.as_str(), "00000000000003");

        let last_sync = store.last_sync().await.unwrap().unwrap();
        assert_eq!(last_sync.timestamp_millis(), synced_at.timestamp_millis());
    }

    #[tokio::test]
    async fn test_clear_through() {
        let (_dir, store) = open_temp();
        let first = store.append(entry(1)).await.unwrap();
        store.append(entry(2)).await.unwrap();

        assert_eq!(store.clear_through(first.seq).await.unwrap(), 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sequence_never_reused_after_clear() {
        let (_dir, store) = open_temp();
        let before = store.append(entry(1)).await.unwrap();
        store.clear().await.unwrap();
        let after = store.append(entry(2)).await.unwrap();
        assert!(after.seq > before.seq);
    }

    #[tokio::test]
    async fn test_queue_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("queue.db");

        {
            let store = QueueStore::open(&path).unwrap();
            store.append(entry(7)).await.unwrap();
            store.append(entry(8)).await.unwrap();
            store.commit_batch(0, Utc::now()).await.unwrap();
        }

        let reopened = QueueStore::open(&path).unwrap();
        assert_eq!(reopened.count().await.unwrap(), 2);
        assert!(reopened.last_sync().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_last_sync_absent_until_first_commit() {
        let (_dir, store) = open_temp();
        assert!(store.last_sync().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reset_wipes_everything() {
        let (_dir, store) = open_temp();
        store.append(entry(1)).await.unwrap();
        store.commit_batch(0, Utc::now()).await.unwrap();

        store.reset().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.last_sync().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_appends_all_land() {
        let (_dir, store) = open_temp();

        let mut handles = Vec::new();
        for n in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.append(entry(n)).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let all = store.read_all().await.unwrap();
        assert_eq!(all.len(), 20);
        assert!(all.windows(2).all(|w| w[0].seq < w[1].seq));
    }
}
