//! Unattended inbox ingestion.
//!
//! Files dropped into the inbox flow through four stages:
//!
//! ```text
//!  watcher / sweep ──offer──▶ Intake ──mpsc──▶ worker ──▶ readiness ──▶ import ──▶ cleanup
//!                               │                              │
//!                        wrong extension                 still locked ×N
//!                               ▼                              ▼
//!                            Ignored                         Failed
//! ```
//!
//! - [`Intake::offer`] filters by extension and coalesces: a path that is
//!   already queued or in flight is not queued again. Accepted paths are
//!   logged `Started`.
//! - A single worker task takes one path at a time, in arrival order.
//! - Readiness means the file's size and modification time did not change
//!   across one `retry_delay`, it is non-empty, and it can be opened and
//!   exclusively locked (fs2 advisory lock). A file still growing, lock
//!   contention, and other transient I/O errors use up one of `max_retries`
//!   attempts; a missing file or a permission error fails at once.
//! - Import resolves the target folder under the root, then runs the same
//!   hash/dedupe/insert step as a manual import. After a successful insert
//!   the source file is deleted; a failed delete is only logged.
//!
//! Every accepted path ends with exactly one of `Imported`, `Ignored`
//! (duplicate content), or `Failed` in the import log, including paths
//! still queued at shutdown. The pipeline never returns errors to its caller.

use std::collections::HashSet;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use anyhow::{bail, Result};
use fs2::FileExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::archive::Archive;
use crate::config::{Config, WatcherConfig};
use crate::documents::DocumentService;
use crate::error::ArchiveError;
use crate::file_types::FileTypePolicy;
use crate::folders::FolderTree;
use crate::import_log::{ImportLogSink, SqliteImportLog};
use crate::models::ImportStatus;
use crate::watcher::InboxWatcher;

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Root-level folder that receives imported documents.
    pub target_folder: String,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl PipelineSettings {
    pub fn from_config(watcher: &WatcherConfig) -> Self {
        Self {
            target_folder: watcher.target_folder.clone(),
            max_retries: watcher.max_retries.max(1),
            retry_delay: watcher.retry_delay(),
        }
    }
}

/// Producer side of the pipeline. Cheap to clone; safe to call from the
/// watcher's callback thread.
#[derive(Clone)]
pub struct Intake {
    tx: mpsc::UnboundedSender<PathBuf>,
    pending: Arc<Mutex<HashSet<PathBuf>>>,
    policy: FileTypePolicy,
    log: Arc<dyn ImportLogSink>,
}

impl Intake {
    /// Queues `path` for import. Returns `false` if the file type is not
    /// allowed, the path is already queued, or the pipeline has stopped.
    pub fn offer(&self, path: &Path) -> bool {
        let name = display_name(path);
        if !self.policy.is_allowed(path) {
            self.log
                .record(&name, ImportStatus::Ignored, &self.policy.rejection_message(path));
            return false;
        }

        if !self.pending.lock().unwrap().insert(path.to_path_buf()) {
            debug!(file = %name, "already queued");
            return false;
        }

        self.log.record(&name, ImportStatus::Started, "queued for import");
        if self.tx.send(path.to_path_buf()).is_err() {
            self.pending.lock().unwrap().remove(path);
            self.log
                .record(&name, ImportStatus::Failed, "importer is shutting down");
            return false;
        }
        true
    }
}

enum Readiness {
    Ready(Vec<u8>),
    Failed(String),
    Cancelled,
}

pub struct IngestionPipeline {
    tree: Arc<FolderTree>,
    documents: DocumentService,
    log: Arc<dyn ImportLogSink>,
    settings: PipelineSettings,
}

impl IngestionPipeline {
    pub fn new(
        tree: Arc<FolderTree>,
        documents: DocumentService,
        log: Arc<dyn ImportLogSink>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            tree,
            documents,
            log,
            settings,
        }
    }

    /// Spawns the worker. Paths are fed through the handle's [`Intake`].
    pub fn start(self) -> PipelineHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(Mutex::new(HashSet::new()));
        let cancel = CancellationToken::new();
        let intake = Intake {
            tx,
            pending: pending.clone(),
            policy: self.documents.policy().clone(),
            log: self.log.clone(),
        };
        let worker = tokio::spawn(self.run(rx, pending, cancel.clone()));
        PipelineHandle {
            intake,
            cancel,
            worker,
            watcher: None,
        }
    }

    async fn run(
        self,
        mut rx: mpsc::UnboundedReceiver<PathBuf>,
        pending: Arc<Mutex<HashSet<PathBuf>>>,
        cancel: CancellationToken,
    ) {
        info!(target_folder = %self.settings.target_folder, "import worker started");
        loop {
            let path = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = rx.recv() => match next {
                    Some(path) => path,
                    None => break,
                },
            };
            self.process(&path, &cancel).await;
            pending.lock().unwrap().remove(&path);
        }

        rx.close();
        while let Ok(path) = rx.try_recv() {
            self.log
                .record(&display_name(&path), ImportStatus::Failed, "dropped at shutdown");
            pending.lock().unwrap().remove(&path);
        }
        info!("import worker stopped");
    }

    async fn process(&self, path: &Path, cancel: &CancellationToken) {
        let name = display_name(path);
        let data = match self.wait_until_ready(path, cancel).await {
            Readiness::Ready(data) => data,
            Readiness::Failed(reason) => {
                self.log.record(&name, ImportStatus::Failed, &reason);
                return;
            }
            Readiness::Cancelled => {
                self.log
                    .record(&name, ImportStatus::Failed, "shutdown before the file was ready");
                return;
            }
        };

        let imported = match self
            .tree
            .ensure_named_child_of_root(&self.settings.target_folder)
            .await
        {
            Ok(folder_id) => self.documents.import_read(&folder_id, path, data).await,
            Err(e) => Err(e),
        };

        match imported {
            Ok(doc) => {
                self.log.record(
                    &name,
                    ImportStatus::Imported,
                    &format!(
                        "imported into '{}' as {}",
                        self.settings.target_folder, doc.id
                    ),
                );
                if let Err(e) = tokio::fs::remove_file(path).await {
                    warn!(file = %name, error = %e, "imported but could not remove source file");
                }
            }
            Err(ArchiveError::Duplicate { content_hash }) => {
                self.log.record(
                    &name,
                    ImportStatus::Ignored,
                    &format!("duplicate of an archived document (sha256 {})", content_hash),
                );
            }
            Err(e) => {
                self.log.record(&name, ImportStatus::Failed, &e.to_string());
            }
        }
    }

    async fn wait_until_ready(&self, path: &Path, cancel: &CancellationToken) -> Readiness {
        let max = self.settings.max_retries;
        let mut last = match tokio::fs::metadata(path).await {
            Ok(meta) => Some(Snapshot::of(&meta)),
            Err(e) => match fatal(&e) {
                Some(reason) => return Readiness::Failed(reason),
                None => None,
            },
        };

        for attempt in 1..=max {
            tokio::select! {
                _ = cancel.cancelled() => return Readiness::Cancelled,
                _ = tokio::time::sleep(self.settings.retry_delay) => {}
            }

            let current = match tokio::fs::metadata(path).await {
                Ok(meta) => Snapshot::of(&meta),
                Err(e) => {
                    if let Some(reason) = fatal(&e) {
                        return Readiness::Failed(reason);
                    }
                    debug!(path = %path.display(), attempt, error = %e, "file not ready");
                    last = None;
                    continue;
                }
            };
            let stable = last.as_ref() == Some(&current);
            last = Some(current.clone());
            if !stable {
                debug!(path = %path.display(), attempt, bytes = current.len, "file is still changing");
                continue;
            }
            if current.len == 0 {
                debug!(path = %path.display(), attempt, "file is still empty");
                continue;
            }

            let owned = path.to_path_buf();
            let result = match tokio::task::spawn_blocking(move || read_locked(&owned)).await {
                Ok(r) => r,
                Err(e) => return Readiness::Failed(format!("readiness check failed: {}", e)),
            };
            match result {
                Ok(data) if data.len() as u64 == current.len => return Readiness::Ready(data),
                Ok(_) => debug!(path = %path.display(), attempt, "file changed while reading"),
                Err(e) => {
                    if let Some(reason) = fatal(&e) {
                        return Readiness::Failed(reason);
                    }
                    debug!(path = %path.display(), attempt, error = %e, "file not ready");
                }
            }
        }
        Readiness::Failed(
            ArchiveError::TransientIo(format!("still in use after {} attempts", max)).to_string(),
        )
    }
}

/// Size and modification time; a file is stable when two snapshots taken a
/// retry delay apart are equal.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Snapshot {
    len: u64,
    modified: Option<SystemTime>,
}

impl Snapshot {
    fn of(meta: &std::fs::Metadata) -> Self {
        Self {
            len: meta.len(),
            modified: meta.modified().ok(),
        }
    }
}

/// Errors that end the readiness wait at once.
fn fatal(e: &std::io::Error) -> Option<String> {
    match e.kind() {
        ErrorKind::NotFound => Some("file disappeared before import".to_string()),
        ErrorKind::PermissionDenied => {
            Some(ArchiveError::PermissionDenied(e.to_string()).to_string())
        }
        _ => None,
    }
}

/// Opens `path`, takes a non-blocking exclusive lock, and reads it whole.
fn read_locked(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    file.try_lock_exclusive()?;
    let mut data = Vec::new();
    let read = file.read_to_end(&mut data);
    let _ = FileExt::unlock(&file);
    read?;
    Ok(data)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// A running pipeline. Dropping the handle does not stop the worker; call
/// [`shutdown`](PipelineHandle::shutdown).
pub struct PipelineHandle {
    intake: Intake,
    cancel: CancellationToken,
    worker: JoinHandle<()>,
    watcher: Option<InboxWatcher>,
}

impl PipelineHandle {
    pub fn intake(&self) -> &Intake {
        &self.intake
    }

    /// Stops capture and the worker. Paths still queued are logged `Failed`.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        drop(self.watcher);
        if let Err(e) = self.worker.await {
            warn!(error = %e, "import worker ended abnormally");
        }
    }
}

/// Offers every regular file directly inside `dir`, in file-name order.
pub fn sweep_existing(dir: &Path, intake: &Intake) -> usize {
    let mut offered = 0;
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        if intake.offer(entry.path()) {
            offered += 1;
        }
    }
    offered
}

/// Starts the worker and the inbox watcher. Returns `None` when the watcher
/// is disabled in configuration.
pub fn start_inbox(
    config: &WatcherConfig,
    pipeline: IngestionPipeline,
) -> Result<Option<PipelineHandle>> {
    if !config.enabled {
        info!("inbox watcher disabled");
        return Ok(None);
    }
    std::fs::create_dir_all(&config.path)?;

    let mut handle = pipeline.start();
    if config.scan_existing_on_start {
        let offered = sweep_existing(&config.path, handle.intake());
        info!(offered, "offered files already in the inbox");
    }
    match InboxWatcher::start(&config.path, handle.intake().clone()) {
        Ok(watcher) => handle.watcher = Some(watcher),
        Err(e) => {
            handle.cancel.cancel();
            return Err(e);
        }
    }
    Ok(Some(handle))
}

/// CLI entry point for `docarc watch`: imports until Ctrl-C.
pub async fn run_watch(config: &Config) -> Result<()> {
    if !config.watcher.enabled {
        bail!("The inbox watcher is disabled. Set [watcher] enabled = true in the config.");
    }

    let archive = Archive::open(config).await?;
    let log = Arc::new(SqliteImportLog::spawn(archive.store.pool().clone()));
    let pipeline = IngestionPipeline::new(
        archive.folders.clone(),
        archive.documents.clone(),
        log.clone(),
        PipelineSettings::from_config(&config.watcher),
    );

    let Some(handle) = start_inbox(&config.watcher, pipeline)? else {
        bail!("The inbox watcher is disabled.");
    };
    println!(
        "Watching {} (importing into '{}'). Press Ctrl-C to stop.",
        config.watcher.path.display(),
        config.watcher.target_folder
    );

    tokio::signal::ctrl_c().await?;
    println!("Stopping...");
    handle.shutdown().await;
    log.close().await;
    archive.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::DefaultExtractor;
    use crate::import_log::MemoryImportLog;
    use crate::models::ImportLogEntry;
    use crate::store::memory::InMemoryStore;
    use crate::store::ArchiveStore;

    struct Fixture {
        tree: Arc<FolderTree>,
        log: Arc<MemoryImportLog>,
        handle: PipelineHandle,
        inbox: tempfile::TempDir,
    }

    fn fixture(max_retries: u32, retry_delay_ms: u64) -> Fixture {
        let store: Arc<dyn ArchiveStore> = Arc::new(InMemoryStore::new());
        let tree = Arc::new(FolderTree::new(store.clone(), ["AutoImport"]));
        let docs =
            DocumentService::new(store, Arc::new(DefaultExtractor), FileTypePolicy::default());
        let log = Arc::new(MemoryImportLog::new());
        let pipeline = IngestionPipeline::new(
            tree.clone(),
            docs,
            log.clone(),
            PipelineSettings {
                target_folder: "AutoImport".to_string(),
                max_retries,
                retry_delay: Duration::from_millis(retry_delay_ms),
            },
        );
        Fixture {
            tree,
            log,
            handle: pipeline.start(),
            inbox: tempfile::tempdir().unwrap(),
        }
    }

    async fn wait_for_terminal(log: &MemoryImportLog, file: &str) -> ImportLogEntry {
        for _ in 0..200 {
            if let Some(e) = log
                .entries()
                .into_iter()
                .find(|e| e.file_name == file && e.status.is_terminal())
            {
                return e;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("no terminal log entry for {}", file);
    }

    fn statuses(log: &MemoryImportLog, file: &str) -> Vec<ImportStatus> {
        log.entries()
            .into_iter()
            .filter(|e| e.file_name == file)
            .map(|e| e.status)
            .collect()
    }

    #[tokio::test]
    async fn imports_into_target_folder_and_removes_source() {
        let fx = fixture(10, 20);
        let path = fx.inbox.path().join("invoice.pdf");
        std::fs::write(&path, b"%PDF-1.4 invoice").unwrap();

        assert!(fx.handle.intake().offer(&path));
        let entry = wait_for_terminal(&fx.log, "invoice.pdf").await;
        assert_eq!(entry.status, ImportStatus::Imported);
        assert!(!path.exists());

        let folder_id = fx.tree.ensure_named_child_of_root("AutoImport").await.unwrap();
        let docs = fx.tree.store().documents_in_folder(&folder_id).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].file_name, "invoice.pdf");
        assert_eq!(
            statuses(&fx.log, "invoice.pdf"),
            vec![ImportStatus::Started, ImportStatus::Imported]
        );
        fx.handle.shutdown().await;
    }

    #[tokio::test]
    async fn disallowed_extension_is_ignored_once() {
        let fx = fixture(10, 20);
        let path = fx.inbox.path().join("notes.txt");
        std::fs::write(&path, b"hello").unwrap();

        assert!(!fx.handle.intake().offer(&path));
        assert!(path.exists());
        assert_eq!(statuses(&fx.log, "notes.txt"), vec![ImportStatus::Ignored]);
        assert!(fx.tree.store().list_documents().await.unwrap().is_empty());
        fx.handle.shutdown().await;
    }

    #[tokio::test]
    async fn duplicate_content_is_ignored_and_kept() {
        let fx = fixture(10, 20);
        let first = fx.inbox.path().join("a.pdf");
        let second = fx.inbox.path().join("b.pdf");
        std::fs::write(&first, b"same bytes").unwrap();
        std::fs::write(&second, b"same bytes").unwrap();

        fx.handle.intake().offer(&first);
        fx.handle.intake().offer(&second);
        assert_eq!(
            wait_for_terminal(&fx.log, "a.pdf").await.status,
            ImportStatus::Imported
        );
        let dup = wait_for_terminal(&fx.log, "b.pdf").await;
        assert_eq!(dup.status, ImportStatus::Ignored);
        assert!(dup.message.contains("duplicate"));
        assert!(second.exists());
        assert_eq!(fx.tree.store().list_documents().await.unwrap().len(), 1);
        fx.handle.shutdown().await;
    }

    #[tokio::test]
    async fn locked_file_is_imported_once_released() {
        let fx = fixture(20, 25);
        let path = fx.inbox.path().join("scan.pdf");
        std::fs::write(&path, b"%PDF-1.4 scan").unwrap();
        let writer = File::open(&path).unwrap();
        writer.lock_exclusive().unwrap();

        assert!(fx.handle.intake().offer(&path));
        // Still held: a second offer is coalesced.
        assert!(!fx.handle.intake().offer(&path));
        tokio::time::sleep(Duration::from_millis(100)).await;
        FileExt::unlock(&writer).unwrap();

        assert_eq!(
            wait_for_terminal(&fx.log, "scan.pdf").await.status,
            ImportStatus::Imported
        );
        assert_eq!(
            statuses(&fx.log, "scan.pdf"),
            vec![ImportStatus::Started, ImportStatus::Imported]
        );
        assert_eq!(fx.tree.store().list_documents().await.unwrap().len(), 1);
        fx.handle.shutdown().await;
    }

    #[tokio::test]
    async fn file_held_past_the_budget_fails_and_stays() {
        let fx = fixture(3, 10);
        let path = fx.inbox.path().join("busy.pdf");
        std::fs::write(&path, b"%PDF-1.4 busy").unwrap();
        let writer = File::open(&path).unwrap();
        writer.lock_exclusive().unwrap();

        fx.handle.intake().offer(&path);
        let entry = wait_for_terminal(&fx.log, "busy.pdf").await;
        assert_eq!(entry.status, ImportStatus::Failed);
        assert!(entry.message.contains("3 attempts"));
        assert!(path.exists());

        // The worker moves on to the next file.
        let next = fx.inbox.path().join("next.pdf");
        std::fs::write(&next, b"%PDF-1.4 next").unwrap();
        fx.handle.intake().offer(&next);
        assert_eq!(
            wait_for_terminal(&fx.log, "next.pdf").await.status,
            ImportStatus::Imported
        );
        FileExt::unlock(&writer).unwrap();
        fx.handle.shutdown().await;
    }

    #[tokio::test]
    async fn vanished_file_fails_immediately() {
        let fx = fixture(10, 1000);
        let path = fx.inbox.path().join("gone.pdf");
        assert!(fx.handle.intake().offer(&path));
        let entry = wait_for_terminal(&fx.log, "gone.pdf").await;
        assert_eq!(entry.status, ImportStatus::Failed);
        assert!(entry.message.contains("disappeared"));
        fx.handle.shutdown().await;
    }

    #[tokio::test]
    async fn sweep_offers_existing_files_in_name_order() {
        let fx = fixture(10, 20);
        std::fs::write(fx.inbox.path().join("b.pdf"), b"bbb").unwrap();
        std::fs::write(fx.inbox.path().join("a.pdf"), b"aaa").unwrap();
        std::fs::write(fx.inbox.path().join("c.txt"), b"ccc").unwrap();
        std::fs::create_dir(fx.inbox.path().join("sub")).unwrap();

        assert_eq!(sweep_existing(fx.inbox.path(), fx.handle.intake()), 2);
        wait_for_terminal(&fx.log, "a.pdf").await;
        wait_for_terminal(&fx.log, "b.pdf").await;
        let started: Vec<String> = fx
            .log
            .entries()
            .into_iter()
            .filter(|e| e.status == ImportStatus::Started)
            .map(|e| e.file_name)
            .collect();
        assert_eq!(started, vec!["a.pdf", "b.pdf"]);
        fx.handle.shutdown().await;
    }

    #[tokio::test]
    async fn unlocked_writer_is_waited_out_until_the_file_settles() {
        let fx = fixture(20, 150);
        let path = fx.inbox.path().join("scan.pdf");
        let mut writer = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .unwrap();
        std::io::Write::write_all(&mut writer, b"%PDF-1.4 first part").unwrap();

        assert!(fx.handle.intake().offer(&path));
        tokio::time::sleep(Duration::from_millis(50)).await;
        std::io::Write::write_all(&mut writer, b" and the remainder").unwrap();
        drop(writer);

        let entry = wait_for_terminal(&fx.log, "scan.pdf").await;
        assert_eq!(entry.status, ImportStatus::Imported, "{}", entry.message);
        let docs = fx.tree.store().list_documents().await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(
            docs[0].size as usize,
            b"%PDF-1.4 first part and the remainder".len()
        );
        assert_eq!(
            statuses(&fx.log, "scan.pdf"),
            vec![ImportStatus::Started, ImportStatus::Imported]
        );
        fx.handle.shutdown().await;
    }

    #[tokio::test]
    async fn queued_paths_are_logged_failed_at_shutdown() {
        let fx = fixture(100, 50);
        let busy = fx.inbox.path().join("busy.pdf");
        std::fs::write(&busy, b"%PDF-1.4 busy").unwrap();
        let writer = File::open(&busy).unwrap();
        writer.lock_exclusive().unwrap();
        let waiting = fx.inbox.path().join("waiting.pdf");
        std::fs::write(&waiting, b"%PDF-1.4 waiting").unwrap();

        assert!(fx.handle.intake().offer(&busy));
        assert!(fx.handle.intake().offer(&waiting));
        tokio::time::sleep(Duration::from_millis(100)).await;
        fx.handle.shutdown().await;

        assert_eq!(
            statuses(&fx.log, "busy.pdf"),
            vec![ImportStatus::Started, ImportStatus::Failed]
        );
        let waiting_entries: Vec<ImportLogEntry> = fx
            .log
            .entries()
            .into_iter()
            .filter(|e| e.file_name == "waiting.pdf")
            .collect();
        assert_eq!(waiting_entries.len(), 2);
        assert_eq!(waiting_entries[1].status, ImportStatus::Failed);
        assert_eq!(waiting_entries[1].message, "dropped at shutdown");
        assert!(busy.exists());
        assert!(waiting.exists());
        FileExt::unlock(&writer).unwrap();
    }

    #[tokio::test]
    async fn offers_after_shutdown_are_refused() {
        let fx = fixture(10, 20);
        let intake = fx.handle.intake().clone();
        fx.handle.shutdown().await;

        let path = fx.inbox.path().join("late.pdf");
        std::fs::write(&path, b"late").unwrap();
        assert!(!intake.offer(&path));
        assert_eq!(
            statuses(&fx.log, "late.pdf"),
            vec![ImportStatus::Started, ImportStatus::Failed]
        );
        assert!(path.exists());
    }
}
