//! End-to-end inbox scenarios: a real filesystem watcher feeding the import
//! pipeline over an in-memory store.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use doc_archive::config::WatcherConfig;
use doc_archive::documents::DocumentService;
use doc_archive::extract::DefaultExtractor;
use doc_archive::file_types::FileTypePolicy;
use doc_archive::folders::FolderTree;
use doc_archive::import_log::MemoryImportLog;
use doc_archive::ingest::{start_inbox, IngestionPipeline, PipelineHandle, PipelineSettings};
use doc_archive::models::{ImportLogEntry, ImportStatus};
use doc_archive::store::memory::InMemoryStore;
use doc_archive::store::ArchiveStore;
use tempfile::TempDir;

struct Inbox {
    _tmp: TempDir,
    dir: std::path::PathBuf,
    tree: Arc<FolderTree>,
    log: Arc<MemoryImportLog>,
    handle: PipelineHandle,
}

fn watcher_config(dir: &Path, scan_existing_on_start: bool) -> WatcherConfig {
    WatcherConfig {
        enabled: true,
        path: dir.to_path_buf(),
        target_folder: "AutoImport".to_string(),
        max_retries: 20,
        retry_delay_ms: 50,
        scan_existing_on_start,
    }
}

fn start(tmp: TempDir, scan_existing_on_start: bool) -> Inbox {
    let dir = tmp.path().join("inbox");
    let config = watcher_config(&dir, scan_existing_on_start);

    let store: Arc<dyn ArchiveStore> = Arc::new(InMemoryStore::new());
    let tree = Arc::new(FolderTree::new(store.clone(), [config.target_folder.as_str()]));
    let docs = DocumentService::new(store, Arc::new(DefaultExtractor), FileTypePolicy::default());
    let log = Arc::new(MemoryImportLog::new());
    let pipeline = IngestionPipeline::new(
        tree.clone(),
        docs,
        log.clone(),
        PipelineSettings::from_config(&config),
    );
    let handle = start_inbox(&config, pipeline)
        .expect("watcher starts")
        .expect("watcher enabled");

    Inbox {
        _tmp: tmp,
        dir,
        tree,
        log,
        handle,
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

async fn auto_import_file_names(tree: &FolderTree) -> Vec<String> {
    let folder = tree.ensure_named_child_of_root("AutoImport").await.unwrap();
    tree.store()
        .documents_in_folder(&folder)
        .await
        .unwrap()
        .into_iter()
        .map(|d| d.file_name)
        .collect()
}

#[tokio::test]
async fn dropped_pdf_lands_in_auto_import() {
    let inbox = start(TempDir::new().unwrap(), false);

    // Write elsewhere, then move in, as scanners and mail clients do.
    let staging = inbox._tmp.path().join("invoice.pdf");
    std::fs::write(&staging, b"%PDF-1.4 invoice body").unwrap();
    let target = inbox.dir.join("invoice.pdf");
    std::fs::rename(&staging, &target).unwrap();

    let entry = wait_for_terminal(&inbox.log, "invoice.pdf").await;
    assert_eq!(entry.status, ImportStatus::Imported, "{}", entry.message);
    assert_eq!(auto_import_file_names(&inbox.tree).await, vec!["invoice.pdf"]);
    assert!(!target.exists());
    inbox.handle.shutdown().await;
}

#[tokio::test]
async fn dropped_text_file_is_ignored_once_and_left_alone() {
    let inbox = start(TempDir::new().unwrap(), false);
    let target = inbox.dir.join("notes.txt");
    std::fs::write(&target, b"remember the milk").unwrap();

    wait_for_terminal(&inbox.log, "notes.txt").await;
    // Give any late duplicate events time to arrive.
    tokio::time::sleep(Duration::from_millis(300)).await;

    let entries: Vec<ImportLogEntry> = inbox
        .log
        .entries()
        .into_iter()
        .filter(|e| e.file_name == "notes.txt")
        .collect();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, ImportStatus::Ignored);
    assert!(target.exists());
    assert!(inbox.tree.store().list_documents().await.unwrap().is_empty());
    inbox.handle.shutdown().await;
}

#[tokio::test]
async fn same_content_under_two_names_yields_one_document() {
    let inbox = start(TempDir::new().unwrap(), false);
    std::fs::write(inbox.dir.join("a.pdf"), b"%PDF-1.4 identical").unwrap();
    assert_eq!(
        wait_for_terminal(&inbox.log, "a.pdf").await.status,
        ImportStatus::Imported
    );

    std::fs::write(inbox.dir.join("b.pdf"), b"%PDF-1.4 identical").unwrap();
    let second = wait_for_terminal(&inbox.log, "b.pdf").await;
    assert_eq!(second.status, ImportStatus::Ignored);
    assert!(second.message.contains("duplicate"));

    assert_eq!(inbox.tree.store().list_documents().await.unwrap().len(), 1);
    assert!(inbox.dir.join("b.pdf").exists());
    inbox.handle.shutdown().await;
}

#[tokio::test]
async fn existing_files_are_swept_on_start() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("inbox");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("old.pdf"), b"%PDF-1.4 waiting since yesterday").unwrap();

    let inbox = start(tmp, true);
    assert_eq!(
        wait_for_terminal(&inbox.log, "old.pdf").await.status,
        ImportStatus::Imported
    );
    assert_eq!(auto_import_file_names(&inbox.tree).await, vec!["old.pdf"]);
    inbox.handle.shutdown().await;
}

#[tokio::test]
async fn auto_import_folder_is_protected() {
    let inbox = start(TempDir::new().unwrap(), false);
    let folder = inbox
        .tree
        .ensure_named_child_of_root("AutoImport")
        .await
        .unwrap();
    assert!(inbox.tree.is_special(&folder).await.unwrap());
    assert!(inbox.tree.delete(&folder).await.is_err());
    inbox.handle.shutdown().await;
}

#[tokio::test]
async fn disabled_watcher_is_a_no_op() {
    let tmp = TempDir::new().unwrap();
    let mut config = watcher_config(&tmp.path().join("inbox"), false);
    config.enabled = false;

    let store: Arc<dyn ArchiveStore> = Arc::new(InMemoryStore::new());
    let tree = Arc::new(FolderTree::new(store.clone(), ["AutoImport"]));
    let docs = DocumentService::new(store, Arc::new(DefaultExtractor), FileTypePolicy::default());
    let pipeline = IngestionPipeline::new(
        tree,
        docs,
        Arc::new(MemoryImportLog::new()),
        PipelineSettings::from_config(&config),
    );
    assert!(start_inbox(&config, pipeline).unwrap().is_none());
    assert!(!tmp.path().join("inbox").exists());
}
