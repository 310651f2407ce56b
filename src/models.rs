//! Core data models used throughout the archive.
//!
//! These types represent the folders, documents, and import-log entries that
//! flow through the folder tree, the document service, and the ingestion
//! pipeline. Timestamps are unix seconds, as stored in SQLite.

use serde::Serialize;

/// A node of the folder tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Folder {
    pub id: String,
    pub name: String,
    /// `None` only for the single root folder.
    pub parent_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Folder {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

/// An archived document, including its bytes and extracted text.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub file_name: String,
    pub content_type: String,
    #[serde(skip)]
    pub data: Vec<u8>,
    pub plain_text: String,
    /// Lowercase hex SHA-256 of `data`.
    pub content_hash: String,
    pub folder_id: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Document {
    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            file_name: self.file_name.clone(),
            content_type: self.content_type.clone(),
            size: self.data.len() as i64,
            content_hash: self.content_hash.clone(),
            folder_id: self.folder_id.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Document metadata without the blob or extracted text, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSummary {
    pub id: String,
    pub title: String,
    pub file_name: String,
    pub content_type: String,
    pub size: i64,
    pub content_hash: String,
    pub folder_id: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Outcome recorded for a file seen by an importer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    Started,
    Imported,
    Ignored,
    Failed,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStatus::Started => "started",
            ImportStatus::Imported => "imported",
            ImportStatus::Ignored => "ignored",
            ImportStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "started" => Some(ImportStatus::Started),
            "imported" => Some(ImportStatus::Imported),
            "ignored" => Some(ImportStatus::Ignored),
            "failed" => Some(ImportStatus::Failed),
            _ => None,
        }
    }

    /// Terminal outcomes end the life of a path in the pipeline.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ImportStatus::Started)
    }
}

impl std::fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the operator-visible import log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportLogEntry {
    pub timestamp: i64,
    pub file_name: String,
    pub status: ImportStatus,
    pub message: String,
}

/// A search hit with its folder location and a text excerpt.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub document_id: String,
    pub title: String,
    pub file_name: String,
    pub folder_id: String,
    pub folder_path: String,
    pub snippet: String,
}
