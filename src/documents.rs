//! Document import, lookup, and mutation.
//!
//! [`DocumentService`] owns the hash → dedupe → insert step shared by manual
//! imports and the ingestion pipeline. The `exists_with_hash` pre-check is a
//! fast path only; the store's uniqueness constraint is what guarantees one
//! document per content hash when two importers race.

use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ArchiveError, Result};
use crate::extract::ContentExtractor;
use crate::file_types::{content_type_for, FileTypePolicy};
use crate::folders::validate_name;
use crate::hash::content_hash;
use crate::models::{Document, DocumentSummary};
use crate::store::ArchiveStore;

pub const MAX_TITLE_LEN: usize = 500;

#[derive(Clone)]
pub struct DocumentService {
    store: Arc<dyn ArchiveStore>,
    extractor: Arc<dyn ContentExtractor>,
    policy: FileTypePolicy,
}

impl DocumentService {
    pub fn new(
        store: Arc<dyn ArchiveStore>,
        extractor: Arc<dyn ContentExtractor>,
        policy: FileTypePolicy,
    ) -> Self {
        Self {
            store,
            extractor,
            policy,
        }
    }

    pub fn policy(&self) -> &FileTypePolicy {
        &self.policy
    }

    /// Manual import of a file from disk into `folder_id`.
    pub async fn import_file(&self, folder_id: &str, path: &Path) -> Result<DocumentSummary> {
        if !self.policy.is_allowed(path) {
            return Err(ArchiveError::Unsupported(self.policy.rejection_message(path)));
        }
        self.require_folder(folder_id).await?;
        let data = tokio::fs::read(path).await?;
        self.import_read(folder_id, path, data).await
    }

    /// Extracts text from bytes already read from `path` and imports them.
    pub(crate) async fn import_read(
        &self,
        folder_id: &str,
        path: &Path,
        data: Vec<u8>,
    ) -> Result<DocumentSummary> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        // pdf-extract can panic on malformed input; keep that off the runtime.
        let extractor = self.extractor.clone();
        let owned_path = path.to_path_buf();
        let shared = Arc::new(data);
        let task_data = shared.clone();
        let plain_text = match tokio::task::spawn_blocking(move || {
            extractor.extract(&owned_path, &task_data)
        })
        .await
        {
            Ok(text) => text,
            Err(e) => {
                warn!(file = %file_name, error = %e, "text extraction task failed");
                String::new()
            }
        };
        let data = Arc::try_unwrap(shared).unwrap_or_else(|shared| shared.as_ref().clone());
        debug!(file = %file_name, chars = plain_text.len(), "extracted text");

        self.import_bytes(folder_id, &file_name, data, plain_text)
            .await
    }

    /// Validates, hashes, dedupes, and inserts a document. The title is the
    /// file name without its extension.
    pub async fn import_bytes(
        &self,
        folder_id: &str,
        file_name: &str,
        data: Vec<u8>,
        plain_text: String,
    ) -> Result<DocumentSummary> {
        let file_name = validate_name(file_name)?;
        if data.is_empty() {
            return Err(ArchiveError::InvalidArgument(format!(
                "{} is empty",
                file_name
            )));
        }
        let title = title_from_file_name(&file_name);
        let title = validate_title(&title)?;

        let hash = content_hash(&data);
        if self.exists_with_hash(&hash).await? {
            return Err(ArchiveError::Duplicate { content_hash: hash });
        }

        let now = Utc::now().timestamp();
        let doc = Document {
            id: Uuid::new_v4().to_string(),
            title,
            content_type: content_type_for(Path::new(&file_name)).to_string(),
            file_name,
            data,
            plain_text,
            content_hash: hash,
            folder_id: folder_id.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.store.insert_document(&doc).await?;
        info!(
            document_id = %doc.id,
            file = %doc.file_name,
            folder_id = %doc.folder_id,
            bytes = doc.data.len(),
            "imported document"
        );
        Ok(doc.summary())
    }

    pub async fn get(&self, id: &str) -> Result<DocumentSummary> {
        self.store
            .get_document(id)
            .await?
            .ok_or_else(|| ArchiveError::NotFound(format!("document {}", id)))
    }

    pub async fn get_with_data(&self, id: &str) -> Result<Document> {
        self.store
            .get_document_with_data(id)
            .await?
            .ok_or_else(|| ArchiveError::NotFound(format!("document {}", id)))
    }

    pub async fn list_all(&self) -> Result<Vec<DocumentSummary>> {
        self.store.list_documents().await
    }

    pub async fn list_by_folder(&self, folder_id: &str) -> Result<Vec<DocumentSummary>> {
        self.require_folder(folder_id).await?;
        self.store.documents_in_folder(folder_id).await
    }

    pub async fn rename(&self, id: &str, title: &str) -> Result<DocumentSummary> {
        let title = validate_title(title)?;
        let mut doc = self.get(id).await?;
        doc.title = title;
        doc.updated_at = Utc::now().timestamp();
        self.store.update_document(&doc).await?;
        info!(document_id = %doc.id, title = %doc.title, "renamed document");
        Ok(doc)
    }

    pub async fn move_to_folder(&self, id: &str, folder_id: &str) -> Result<DocumentSummary> {
        let mut doc = self.get(id).await?;
        self.require_folder(folder_id).await?;
        if doc.folder_id == folder_id {
            return Ok(doc);
        }
        doc.folder_id = folder_id.to_string();
        doc.updated_at = Utc::now().timestamp();
        self.store.update_document(&doc).await?;
        info!(document_id = %doc.id, folder_id = %folder_id, "moved document");
        Ok(doc)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let doc = self.get(id).await?;
        self.store.delete_document(&doc.id).await?;
        info!(document_id = %doc.id, file = %doc.file_name, "deleted document");
        Ok(())
    }

    /// Writes the stored bytes to `target`. Returns the number of bytes written.
    pub async fn export_to_file(&self, id: &str, target: &Path) -> Result<usize> {
        let doc = self.get_with_data(id).await?;
        tokio::fs::write(target, &doc.data).await?;
        info!(document_id = %doc.id, target = %target.display(), "exported document");
        Ok(doc.data.len())
    }

    pub async fn exists_with_hash(&self, hash: &str) -> Result<bool> {
        Ok(self.store.find_by_hash(hash).await?.is_some())
    }

    async fn require_folder(&self, folder_id: &str) -> Result<()> {
        match self.store.get_folder(folder_id).await? {
            Some(_) => Ok(()),
            None => Err(ArchiveError::NotFound(format!("folder {}", folder_id))),
        }
    }
}

fn title_from_file_name(file_name: &str) -> String {
    Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| file_name.to_string())
}

fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ArchiveError::InvalidArgument(
            "title must not be empty".to_string(),
        ));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(ArchiveError::InvalidArgument(format!(
            "title must be at most {} characters",
            MAX_TITLE_LEN
        )));
    }
    Ok(title.to_string())
}
