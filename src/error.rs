//! Error taxonomy for archive operations.
//!
//! Folder-tree and document operations surface these synchronously to the
//! caller. The ingestion pipeline never propagates them: every failure ends
//! as an import-log entry (see [`crate::ingest`]).

use thiserror::Error;

/// Result alias used by the library modules.
pub type Result<T> = std::result::Result<T, ArchiveError>;

#[derive(Error, Debug)]
pub enum ArchiveError {
    /// Referenced folder or document does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Sibling name collision, cycle, or storage uniqueness violation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Mutation of the root or a special folder.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Empty or malformed name, title, or self-parenting.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// File extension is not on the import allow-list.
    #[error("unsupported file type: {0}")]
    Unsupported(String),

    /// File is still held by a writer; retryable.
    #[error("file busy: {0}")]
    TransientIo(String),

    /// Access to the file was refused; not retryable.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// A document with identical content is already archived.
    #[error("duplicate content (sha256 {content_hash})")]
    Duplicate { content_hash: String },

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ArchiveError {
    /// Short machine-friendly label, used in log lines and CLI output.
    pub fn kind(&self) -> &'static str {
        match self {
            ArchiveError::NotFound(_) => "not_found",
            ArchiveError::Conflict(_) => "conflict",
            ArchiveError::Forbidden(_) => "forbidden",
            ArchiveError::InvalidArgument(_) => "invalid_argument",
            ArchiveError::Unsupported(_) => "unsupported",
            ArchiveError::TransientIo(_) => "transient_io",
            ArchiveError::PermissionDenied(_) => "permission_denied",
            ArchiveError::Duplicate { .. } => "duplicate",
            ArchiveError::Storage(_) => "storage",
            ArchiveError::Io(_) => "io",
        }
    }
}
