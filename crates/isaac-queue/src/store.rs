//! DurableQueue: SQLite-backed store of commands awaiting remote delivery.
//!
//! Each row moves `pending -> syncing -> done | failed`. Every transition is
//! a single conditional UPDATE, so two callers racing on the same row can
//! never both win. The only backwards edges are the stale-claim recovery
//! (`syncing -> pending`) and an explicit human retry (`failed -> pending`).

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use isaac_types::QueueError;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SELECT_COLUMNS: &str = "SELECT id, queued_at, command_type, command_text, target_device, \
     retry_count, last_retry_at, status, error_message, metadata FROM command_queue";

/// What a queued entry is, which decides how the sync worker delivers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandType {
    /// A cloud-side meta action.
    Meta,
    /// A local shell command, recorded to remote history.
    Shell,
    /// A command routed to another device.
    DeviceRoute,
}

impl CommandType {
    pub fn as_str(self) -> &'static str {
        match self {
            CommandType::Meta => "meta",
            CommandType::Shell => "shell",
            CommandType::DeviceRoute => "device_route",
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "meta" => Ok(CommandType::Meta),
            "shell" => Ok(CommandType::Shell),
            "device_route" => Ok(CommandType::DeviceRoute),
            other => Err(format!("unknown command type '{other}'")),
        }
    }
}

/// Lifecycle state of a queued entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Syncing,
    Done,
    Failed,
}

impl QueueStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Syncing => "syncing",
            QueueStatus::Done => "done",
            QueueStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(QueueStatus::Pending),
            "syncing" => Ok(QueueStatus::Syncing),
            "done" => Ok(QueueStatus::Done),
            "failed" => Ok(QueueStatus::Failed),
            other => Err(format!("unknown queue status '{other}'")),
        }
    }
}

/// One persisted row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedCommand {
    pub id: i64,
    pub queued_at: DateTime<Utc>,
    pub command_type: CommandType,
    pub command_text: String,
    pub target_device: Option<String>,
    pub retry_count: u32,
    pub last_retry_at: Option<DateTime<Utc>>,
    pub status: QueueStatus,
    pub error_message: Option<String>,
    pub metadata: Map<String, Value>,
}

/// Counts per status plus the time of the latest successful delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSummary {
    pub pending: u64,
    pub syncing: u64,
    pub failed: u64,
    pub done: u64,
    pub last_sync: Option<DateTime<Utc>>,
}

impl QueueSummary {
    /// Entries that have not been delivered yet.
    pub fn outstanding(&self) -> u64 {
        self.pending + self.syncing
    }
}

/// The durable command queue.
///
/// Safe to share between the dispatch path and the sync worker behind an
/// `Arc`; the connection is serialized by an internal mutex.
pub struct DurableQueue {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl fmt::Debug for DurableQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DurableQueue").field("path", &self.path).finish()
    }
}

impl DurableQueue {
    /// Open (or create) the queue database at `path`.
    ///
    /// Creates missing parent directories, enables WAL mode and a busy
    /// timeout, and creates the table and its indexes if needed.
    pub fn open(path: &Path) -> Result<Self, QueueError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                QueueError::Storage(format!("failed to create {}: {e}", parent.display()))
            })?;
        }

        let conn = Connection::open(path)
            .map_err(|e| QueueError::Storage(format!("failed to open database: {e}")))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| QueueError::Storage(format!("failed to set WAL mode: {e}")))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| QueueError::Storage(format!("failed to set busy timeout: {e}")))?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS command_queue (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                queued_at TEXT NOT NULL,
                command_type TEXT NOT NULL,
                command_text TEXT NOT NULL,
                target_device TEXT,
                retry_count INTEGER NOT NULL DEFAULT 0,
                last_retry_at TEXT,
                status TEXT NOT NULL DEFAULT 'pending',
                error_message TEXT,
                metadata TEXT NOT NULL DEFAULT '{}'
            );
            CREATE INDEX IF NOT EXISTS idx_queue_status ON command_queue(status);
            CREATE INDEX IF NOT EXISTS idx_queue_queued_at ON command_queue(queued_at);",
        )
        .map_err(|e| QueueError::Storage(format!("failed to create schema: {e}")))?;

        info!(path = %path.display(), "command queue opened");
        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, QueueError> {
        self.conn.lock().map_err(|_| QueueError::Poisoned)
    }

    /// Append a new `pending` entry and return its id.
    ///
    /// Never drops the command: any storage failure is returned.
    pub fn enqueue(
        &self,
        command_type: CommandType,
        command_text: &str,
        target_device: Option<&str>,
        metadata: &Map<String, Value>,
    ) -> Result<i64, QueueError> {
        let metadata = serde_json::to_string(metadata)
            .map_err(|e| QueueError::Storage(format!("failed to encode metadata: {e}")))?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO command_queue (queued_at, command_type, command_text, target_device, status, metadata)
             VALUES (?1, ?2, ?3, ?4, 'pending', ?5)",
            params![
                timestamp(Utc::now()),
                command_type.as_str(),
                command_text,
                target_device,
                metadata,
            ],
        )
        .map_err(|e| QueueError::Storage(format!("failed to enqueue command: {e}")))?;
        let id = conn.last_insert_rowid();
        info!(queue_id = id, command_type = %command_type, target = ?target_device, "command queued");
        Ok(id)
    }

    /// Up to `limit` pending entries, oldest first.
    pub fn dequeue_pending(&self, limit: usize) -> Result<Vec<QueuedCommand>, QueueError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "{SELECT_COLUMNS} WHERE status = 'pending' ORDER BY queued_at ASC, id ASC LIMIT ?1"
            ))
            .map_err(|e| QueueError::Storage(format!("failed to prepare query: {e}")))?;
        let rows = stmt
            .query_map(params![limit], row_to_command)
            .map_err(|e| QueueError::Storage(format!("failed to query pending: {e}")))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| QueueError::Storage(format!("failed to read entry: {e}")))
    }

    /// Claim a pending entry for delivery.
    ///
    /// Returns `false` if the entry was not pending, e.g. because another
    /// sync cycle already claimed it.
    pub fn mark_syncing(&self, id: i64) -> Result<bool, QueueError> {
        self.transition(
            "UPDATE command_queue SET status = 'syncing', last_retry_at = ?2
             WHERE id = ?1 AND status = 'pending'",
            params![id, timestamp(Utc::now())],
        )
    }

    /// Record a successful delivery of a claimed entry.
    pub fn mark_done(&self, id: i64) -> Result<bool, QueueError> {
        let changed = self.transition(
            "UPDATE command_queue SET status = 'done', last_retry_at = ?2, error_message = NULL
             WHERE id = ?1 AND status = 'syncing'",
            params![id, timestamp(Utc::now())],
        )?;
        if changed {
            info!(queue_id = id, "queued command delivered");
        }
        Ok(changed)
    }

    /// Record a failed delivery of a claimed entry and bump its retry count.
    pub fn mark_failed(&self, id: i64, error: &str) -> Result<bool, QueueError> {
        let changed = self.transition(
            "UPDATE command_queue
             SET status = 'failed', retry_count = retry_count + 1, error_message = ?2, last_retry_at = ?3
             WHERE id = ?1 AND status = 'syncing'",
            params![id, error, timestamp(Utc::now())],
        )?;
        if changed {
            warn!(queue_id = id, error, "queued command failed");
        }
        Ok(changed)
    }

    /// Move a failed entry back to pending. Only ever done on request.
    pub fn retry_failed(&self, id: i64) -> Result<bool, QueueError> {
        let changed = self.transition(
            "UPDATE command_queue SET status = 'pending' WHERE id = ?1 AND status = 'failed'",
            params![id],
        )?;
        if changed {
            info!(queue_id = id, "failed command requeued");
        }
        Ok(changed)
    }

    /// Return `syncing` entries claimed longer ago than `older_than` to
    /// `pending`. Returns how many were reset.
    pub fn reset_stale_syncing(&self, older_than: Duration) -> Result<usize, QueueError> {
        let conn = self.conn()?;
        let reset = conn
            .execute(
                "UPDATE command_queue SET status = 'pending'
                 WHERE status = 'syncing' AND (last_retry_at IS NULL OR last_retry_at < ?1)",
                params![cutoff(older_than)],
            )
            .map_err(|e| QueueError::Storage(format!("failed to reset stale entries: {e}")))?;
        if reset > 0 {
            warn!(count = reset, "reset stale syncing commands to pending");
        }
        Ok(reset)
    }

    /// Delete `done` entries queued longer ago than `older_than`.
    pub fn purge_done(&self, older_than: Duration) -> Result<usize, QueueError> {
        let conn = self.conn()?;
        let deleted = conn
            .execute(
                "DELETE FROM command_queue WHERE status = 'done' AND queued_at < ?1",
                params![cutoff(older_than)],
            )
            .map_err(|e| QueueError::Storage(format!("failed to purge entries: {e}")))?;
        if deleted > 0 {
            info!(count = deleted, "purged old queue entries");
        }
        Ok(deleted)
    }

    pub fn get(&self, id: i64) -> Result<Option<QueuedCommand>, QueueError> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("{SELECT_COLUMNS} WHERE id = ?1"),
            params![id],
            row_to_command,
        )
        .optional()
        .map_err(|e| QueueError::Storage(format!("failed to read entry {id}: {e}")))
    }

    /// Most recent entries first, optionally filtered by status.
    pub fn list(
        &self,
        status: Option<QueueStatus>,
        limit: usize,
    ) -> Result<Vec<QueuedCommand>, QueueError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "{SELECT_COLUMNS} WHERE (?1 IS NULL OR status = ?1) ORDER BY id DESC LIMIT ?2"
            ))
            .map_err(|e| QueueError::Storage(format!("failed to prepare query: {e}")))?;
        let rows = stmt
            .query_map(params![status.map(QueueStatus::as_str), limit], row_to_command)
            .map_err(|e| QueueError::Storage(format!("failed to list entries: {e}")))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| QueueError::Storage(format!("failed to read entry: {e}")))
    }

    pub fn summary(&self) -> Result<QueueSummary, QueueError> {
        let conn = self.conn()?;
        let mut summary = QueueSummary::default();
        {
            let mut stmt = conn
                .prepare("SELECT status, COUNT(*) FROM command_queue GROUP BY status")
                .map_err(|e| QueueError::Storage(format!("failed to prepare query: {e}")))?;
            let rows = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))
                .map_err(|e| QueueError::Storage(format!("failed to count entries: {e}")))?;
            for row in rows {
                let (status, count) =
                    row.map_err(|e| QueueError::Storage(format!("failed to read count: {e}")))?;
                let count = u64::try_from(count).unwrap_or(0);
                match status.parse::<QueueStatus>() {
                    Ok(QueueStatus::Pending) => summary.pending = count,
                    Ok(QueueStatus::Syncing) => summary.syncing = count,
                    Ok(QueueStatus::Done) => summary.done = count,
                    Ok(QueueStatus::Failed) => summary.failed = count,
                    Err(e) => warn!(error = %e, "ignoring unknown status in queue"),
                }
            }
        }

        let last_sync: Option<String> = conn
            .query_row(
                "SELECT MAX(last_retry_at) FROM command_queue WHERE status = 'done'",
                [],
                |row| row.get(0),
            )
            .map_err(|e| QueueError::Storage(format!("failed to read last sync: {e}")))?;
        summary.last_sync = last_sync
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc));
        Ok(summary)
    }

    fn transition(&self, sql: &str, params: impl rusqlite::Params) -> Result<bool, QueueError> {
        let conn = self.conn()?;
        let changed = conn
            .execute(sql, params)
            .map_err(|e| QueueError::Storage(format!("failed to update entry: {e}")))?;
        Ok(changed == 1)
    }
}

/// RFC 3339 UTC with microseconds; fixed width so text order is time order.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn cutoff(older_than: Duration) -> String {
    let delta = chrono::Duration::from_std(older_than)
        .unwrap_or_else(|_| chrono::Duration::days(365 * 1000));
    let at = Utc::now()
        .checked_sub_signed(delta)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);
    timestamp(at)
}

fn parse_time(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_text<T>(idx: usize, raw: &str) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    raw.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into())
    })
}

fn row_to_command(row: &Row<'_>) -> rusqlite::Result<QueuedCommand> {
    let queued_at: String = row.get(1)?;
    let command_type: String = row.get(2)?;
    let retry_count: i64 = row.get(5)?;
    let last_retry_at: Option<String> = row.get(6)?;
    let status: String = row.get(7)?;
    let metadata: String = row.get(9)?;

    Ok(QueuedCommand {
        id: row.get(0)?,
        queued_at: parse_time(1, &queued_at)?,
        command_type: parse_text(2, &command_type)?,
        command_text: row.get(3)?,
        target_device: row.get(4)?,
        retry_count: u32::try_from(retry_count).unwrap_or(u32::MAX),
        last_retry_at: last_retry_at
            .as_deref()
            .map(|raw| parse_time(6, raw))
            .transpose()?,
        status: parse_text(7, &status)?,
        error_message: row.get(8)?,
        metadata: serde_json::from_str(&metadata).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(9, Type::Text, Box::new(e))
        })?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open(tmp: &TempDir) -> DurableQueue {
        DurableQueue::open(&tmp.path().join("queue.db")).unwrap()
    }

    fn route(queue: &DurableQueue, text: &str) -> i64 {
        queue
            .enqueue(CommandType::DeviceRoute, text, Some("labpc"), &Map::new())
            .unwrap()
    }

    #[test]
    fn enqueue_creates_pending_row() {
        let tmp = TempDir::new().unwrap();
        let queue = open(&tmp);
        let mut metadata = Map::new();
        metadata.insert("tier".into(), Value::from(3.0));
        let id = queue
            .enqueue(CommandType::DeviceRoute, "status", Some("labpc"), &metadata)
            .unwrap();

        let entry = queue.get(id).unwrap().unwrap();
        assert_eq!(entry.status, QueueStatus::Pending);
        assert_eq!(entry.command_text, "status");
        assert_eq!(entry.target_device.as_deref(), Some("labpc"));
        assert_eq!(entry.retry_count, 0);
        assert!(entry.last_retry_at.is_none());
        assert_eq!(entry.metadata["tier"], 3.0);
    }

    #[test]
    fn survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let id = {
            let queue = open(&tmp);
            queue
                .enqueue(CommandType::Meta, "/sync-history", None, &Map::new())
                .unwrap()
        };
        let queue = open(&tmp);
        let pending = queue.dequeue_pending(10).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, id);
        assert_eq!(pending[0].command_type, CommandType::Meta);
        assert_eq!(pending[0].command_text, "/sync-history");
        assert_eq!(pending[0].target_device, None);
    }

    #[test]
    fn dequeue_is_fifo_and_bounded() {
        let tmp = TempDir::new().unwrap();
        let queue = open(&tmp);
        let ids: Vec<i64> = (0..5).map(|i| route(&queue, &format!("cmd {i}"))).collect();
        let batch = queue.dequeue_pending(3).unwrap();
        let got: Vec<i64> = batch.iter().map(|c| c.id).collect();
        assert_eq!(got, ids[..3]);
    }

    #[test]
    fn full_lifecycle_to_done() {
        let tmp = TempDir::new().unwrap();
        let queue = open(&tmp);
        let id = route(&queue, "status");

        assert!(queue.mark_syncing(id).unwrap());
        assert!(queue.dequeue_pending(10).unwrap().is_empty());
        assert!(queue.mark_done(id).unwrap());

        let entry = queue.get(id).unwrap().unwrap();
        assert_eq!(entry.status, QueueStatus::Done);
        assert!(entry.last_retry_at.is_some());
    }

    #[test]
    fn claim_is_exclusive() {
        let tmp = TempDir::new().unwrap();
        let queue = open(&tmp);
        let id = route(&queue, "status");
        assert!(queue.mark_syncing(id).unwrap());
        assert!(!queue.mark_syncing(id).unwrap());
    }

    #[test]
    fn failure_increments_retry_and_is_sticky() {
        let tmp = TempDir::new().unwrap();
        let queue = open(&tmp);
        let id = route(&queue, "status");
        queue.mark_syncing(id).unwrap();
        assert!(queue.mark_failed(id, "connection refused").unwrap());

        let entry = queue.get(id).unwrap().unwrap();
        assert_eq!(entry.status, QueueStatus::Failed);
        assert_eq!(entry.retry_count, 1);
        assert_eq!(entry.error_message.as_deref(), Some("connection refused"));

        // Not picked up again, not reset by stale recovery.
        assert!(queue.dequeue_pending(10).unwrap().is_empty());
        assert_eq!(queue.reset_stale_syncing(Duration::ZERO).unwrap(), 0);
        assert_eq!(queue.get(id).unwrap().unwrap().status, QueueStatus::Failed);
    }

    #[test]
    fn done_and_failed_require_a_claim() {
        let tmp = TempDir::new().unwrap();
        let queue = open(&tmp);
        let id = route(&queue, "status");
        assert!(!queue.mark_done(id).unwrap());
        assert!(!queue.mark_failed(id, "nope").unwrap());
        assert_eq!(queue.get(id).unwrap().unwrap().status, QueueStatus::Pending);
    }

    #[test]
    fn retry_failed_requeues() {
        let tmp = TempDir::new().unwrap();
        let queue = open(&tmp);
        let id = route(&queue, "status");
        queue.mark_syncing(id).unwrap();
        queue.mark_failed(id, "boom").unwrap();

        assert!(queue.retry_failed(id).unwrap());
        assert_eq!(queue.dequeue_pending(10).unwrap().len(), 1);
        // Only failed rows can be retried.
        assert!(!queue.retry_failed(id).unwrap());
    }

    #[test]
    fn stale_syncing_resets_to_pending() {
        let tmp = TempDir::new().unwrap();
        let queue = open(&tmp);
        let id = route(&queue, "status");
        queue.mark_syncing(id).unwrap();

        // Fresh claims are left alone.
        assert_eq!(queue.reset_stale_syncing(Duration::from_secs(300)).unwrap(), 0);

        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(queue.reset_stale_syncing(Duration::from_millis(5)).unwrap(), 1);
        assert_eq!(queue.get(id).unwrap().unwrap().status, QueueStatus::Pending);
        // Idempotent.
        assert_eq!(queue.reset_stale_syncing(Duration::from_millis(5)).unwrap(), 0);
    }

    #[test]
    fn summary_counts_and_last_sync() {
        let tmp = TempDir::new().unwrap();
        let queue = open(&tmp);
        assert_eq!(queue.summary().unwrap(), QueueSummary::default());

        let a = route(&queue, "a");
        let b = route(&queue, "b");
        route(&queue, "c");
        queue.mark_syncing(a).unwrap();
        queue.mark_done(a).unwrap();
        queue.mark_syncing(b).unwrap();
        queue.mark_failed(b, "x").unwrap();

        let summary = queue.summary().unwrap();
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.done, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.syncing, 0);
        assert_eq!(summary.outstanding(), 1);
        assert_eq!(
            summary.last_sync,
            queue.get(a).unwrap().unwrap().last_retry_at
        );
    }

    #[test]
    fn purge_only_removes_old_done_rows() {
        let tmp = TempDir::new().unwrap();
        let queue = open(&tmp);
        let done = route(&queue, "done");
        let pending = route(&queue, "pending");
        queue.mark_syncing(done).unwrap();
        queue.mark_done(done).unwrap();

        assert_eq!(queue.purge_done(Duration::from_secs(3600)).unwrap(), 0);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(queue.purge_done(Duration::from_millis(5)).unwrap(), 1);
        assert!(queue.get(done).unwrap().is_none());
        assert!(queue.get(pending).unwrap().is_some());
    }

    #[test]
    fn list_filters_by_status_newest_first() {
        let tmp = TempDir::new().unwrap();
        let queue = open(&tmp);
        let a = route(&queue, "a");
        let b = route(&queue, "b");
        queue.mark_syncing(a).unwrap();

        let all: Vec<i64> = queue.list(None, 10).unwrap().iter().map(|c| c.id).collect();
        assert_eq!(all, vec![b, a]);
        let pending = queue.list(Some(QueueStatus::Pending), 10).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, b);
    }

    #[test]
    fn creates_parent_directories() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested/dir/queue.db");
        let queue = DurableQueue::open(&path).unwrap();
        assert_eq!(queue.path(), path);
        assert!(path.exists());
    }

    #[test]
    fn unopenable_path_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let err = DurableQueue::open(&blocker.join("queue.db")).unwrap_err();
        assert!(matches!(err, QueueError::Storage(_)), "got: {err}");
    }
}
