//! Operator-visible import log.
//!
//! Importers report what happened to each file through [`ImportLogSink`].
//! Recording is synchronous, fire-and-forget, and cannot fail: a sink that
//! persists entries does so in the background and only logs its own errors.
//! Every entry is also emitted as a `tracing` event.

use std::sync::Mutex;

use anyhow::Result;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::Config;
use crate::db;
use crate::get::format_ts_iso;
use crate::models::{ImportLogEntry, ImportStatus};

pub trait ImportLogSink: Send + Sync {
    fn record(&self, file_name: &str, status: ImportStatus, message: &str);
}

fn new_entry(file_name: &str, status: ImportStatus, message: &str) -> ImportLogEntry {
    match status {
        ImportStatus::Failed => {
            warn!(file = %file_name, status = %status, "{}", message)
        }
        _ => info!(file = %file_name, status = %status, "{}", message),
    }
    ImportLogEntry {
        timestamp: Utc::now().timestamp(),
        file_name: file_name.to_string(),
        status,
        message: message.to_string(),
    }
}

/// Keeps entries in process memory.
#[derive(Default)]
pub struct MemoryImportLog {
    entries: Mutex<Vec<ImportLogEntry>>,
}

impl MemoryImportLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all entries in recording order.
    pub fn entries(&self) -> Vec<ImportLogEntry> {
        self.entries.lock().unwrap().clone()
    }
}

impl ImportLogSink for MemoryImportLog {
    fn record(&self, file_name: &str, status: ImportStatus, message: &str) {
        let entry = new_entry(file_name, status, message);
        self.entries.lock().unwrap().push(entry);
    }
}

/// Persists entries to the `import_log` table from a background writer task.
pub struct SqliteImportLog {
    tx: Mutex<Option<mpsc::UnboundedSender<ImportLogEntry>>>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl SqliteImportLog {
    /// Spawns the writer task. Must be called inside a tokio runtime.
    pub fn spawn(pool: SqlitePool) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<ImportLogEntry>();
        let writer = tokio::spawn(async move {
            while let Some(entry) = rx.recv().await {
                if let Err(e) = insert_entry(&pool, &entry).await {
                    warn!(file = %entry.file_name, error = %e, "failed to persist import log entry");
                }
            }
        });
        Self {
            tx: Mutex::new(Some(tx)),
            writer: Mutex::new(Some(writer)),
        }
    }

    /// Stops accepting entries and waits until everything queued is written.
    pub async fn close(&self) {
        self.tx.lock().unwrap().take();
        let writer = self.writer.lock().unwrap().take();
        if let Some(writer) = writer {
            if let Err(e) = writer.await {
                warn!(error = %e, "import log writer ended abnormally");
            }
        }
    }
}

impl ImportLogSink for SqliteImportLog {
    fn record(&self, file_name: &str, status: ImportStatus, message: &str) {
        let entry = new_entry(file_name, status, message);
        if let Some(tx) = self.tx.lock().unwrap().as_ref() {
            let _ = tx.send(entry);
        }
    }
}

async fn insert_entry(pool: &SqlitePool, entry: &ImportLogEntry) -> Result<()> {
    sqlx::query("INSERT INTO import_log (timestamp, file_name, status, message) VALUES (?, ?, ?, ?)")
        .bind(entry.timestamp)
        .bind(&entry.file_name)
        .bind(entry.status.as_str())
        .bind(&entry.message)
        .execute(pool)
        .await?;
    Ok(())
}

/// The newest `limit` entries, oldest first.
pub async fn recent(pool: &SqlitePool, limit: i64) -> Result<Vec<ImportLogEntry>> {
    let rows = sqlx::query(
        "SELECT timestamp, file_name, status, message FROM import_log ORDER BY id DESC LIMIT ?",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let mut entries: Vec<ImportLogEntry> = rows
        .iter()
        .map(|row| {
            let status: String = row.get("status");
            ImportLogEntry {
                timestamp: row.get("timestamp"),
                file_name: row.get("file_name"),
                status: ImportStatus::parse(&status).unwrap_or(ImportStatus::Failed),
                message: row.get("message"),
            }
        })
        .collect();
    entries.reverse();
    Ok(entries)
}

/// CLI entry point for `docarc log`.
pub async fn run_log(config: &Config, limit: i64) -> Result<()> {
    let pool = db::connect(config).await?;
    crate::migrate::apply_schema(&pool).await?;
    let entries = recent(&pool, limit).await;
    pool.close().await;
    let entries = entries?;

    if entries.is_empty() {
        println!("No import log entries.");
        return Ok(());
    }
    for e in entries {
        println!(
            "{}  {:<8}  {}  {}",
            format_ts_iso(e.timestamp),
            e.status,
            e.file_name,
            e.message
        );
    }
    Ok(())
}
