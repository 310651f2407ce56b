//! Storage abstraction for the archive.
//!
//! The [`ArchiveStore`] trait defines every persistence operation the folder
//! tree, the document service, and the ingestion pipeline need, so the core
//! can run against SQLite in production and an in-memory map in tests.
//!
//! Each call is an atomic unit. Implementations must enforce two uniqueness
//! constraints themselves rather than relying on callers' pre-checks:
//!
//! - folder names are unique among siblings, compared case-insensitively,
//!   and at most one folder has no parent (violations → [`ArchiveError::Conflict`]);
//! - document content hashes are unique store-wide
//!   (violations → [`ArchiveError::Duplicate`]).
//!
//! [`ArchiveError::Conflict`]: crate::error::ArchiveError::Conflict
//! [`ArchiveError::Duplicate`]: crate::error::ArchiveError::Duplicate

pub mod memory;
pub mod sqlite;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Document, DocumentSummary, Folder};

/// A document matched by substring search, with the text needed for a snippet.
#[derive(Debug, Clone)]
pub struct TextHit {
    pub summary: DocumentSummary,
    pub plain_text: String,
}

/// Abstract storage backend for folders and documents.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`get_folder`](ArchiveStore::get_folder) | Folder by id |
/// | [`list_folders`](ArchiveStore::list_folders) | Every folder (tree building) |
/// | [`root_folders`](ArchiveStore::root_folders) | Folders without a parent |
/// | [`child_folders`](ArchiveStore::child_folders) | Direct children of a folder |
/// | [`insert_folder`](ArchiveStore::insert_folder) | Add a folder |
/// | [`update_folder`](ArchiveStore::update_folder) | Persist name / parent changes |
/// | [`delete_folder`](ArchiveStore::delete_folder) | Remove one folder row |
/// | [`insert_document`](ArchiveStore::insert_document) | Add a document |
/// | [`find_by_hash`](ArchiveStore::find_by_hash) | Existence-by-hash |
/// | [`search_documents`](ArchiveStore::search_documents) | Substring search |
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    async fn get_folder(&self, id: &str) -> Result<Option<Folder>>;

    async fn list_folders(&self) -> Result<Vec<Folder>>;

    async fn root_folders(&self) -> Result<Vec<Folder>>;

    /// Children ordered by name, case-insensitively.
    async fn child_folders(&self, parent_id: &str) -> Result<Vec<Folder>>;

    async fn count_folders(&self) -> Result<usize>;

    /// Fails with `Conflict` on a sibling-name or second-root violation.
    async fn insert_folder(&self, folder: &Folder) -> Result<()>;

    /// Fails with `NotFound` if the row is gone, `Conflict` on a name violation.
    async fn update_folder(&self, folder: &Folder) -> Result<()>;

    async fn delete_folder(&self, id: &str) -> Result<()>;

    async fn get_document(&self, id: &str) -> Result<Option<DocumentSummary>>;

    async fn get_document_with_data(&self, id: &str) -> Result<Option<Document>>;

    async fn list_documents(&self) -> Result<Vec<DocumentSummary>>;

    async fn documents_in_folder(&self, folder_id: &str) -> Result<Vec<DocumentSummary>>;

    /// Document count keyed by folder id; folders without documents are absent.
    async fn document_counts(&self) -> Result<HashMap<String, usize>>;

    /// Fails with `Duplicate` if the content hash is taken and `NotFound` if
    /// the folder does not exist.
    async fn insert_document(&self, doc: &Document) -> Result<()>;

    /// Persists title, folder, and `updated_at` of an existing document.
    async fn update_document(&self, doc: &DocumentSummary) -> Result<()>;

    async fn delete_document(&self, id: &str) -> Result<()>;

    async fn find_by_hash(&self, content_hash: &str) -> Result<Option<DocumentSummary>>;

    /// Case-insensitive substring match over title, file name, and text.
    async fn search_documents(&self, term: &str) -> Result<Vec<TextHit>>;
}

/// Case-folded key for sibling-name comparisons.
pub(crate) fn name_key(name: &str) -> String {
    name.to_lowercase()
}

/// Case-insensitive substring test over a document's searchable fields.
pub(crate) fn matches_term(title: &str, file_name: &str, plain_text: &str, term: &str) -> bool {
    let needle = name_key(term);
    [title, file_name, plain_text]
        .iter()
        .any(|field| name_key(field).contains(&needle))
}
