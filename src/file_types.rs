//! File type policy: which extensions may be imported, and their MIME types.

use std::path::Path;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_OCTET_STREAM: &str = "application/octet-stream";

/// Static extension → MIME table. Extensions are lowercase, without the dot.
const MIME_TABLE: &[(&str, &str)] = &[
    ("pdf", MIME_PDF),
    ("docx", MIME_DOCX),
    (
        "xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    (
        "pptx",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    ),
    ("doc", "application/msword"),
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    ("csv", "text/csv"),
    ("xml", "application/xml"),
    ("json", "application/json"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
];

/// Lowercased extension of `path`, without the leading dot.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .filter(|e| !e.is_empty())
}

/// MIME type for a file name, falling back to `application/octet-stream`.
pub fn content_type_for(path: &Path) -> &'static str {
    let Some(ext) = extension_of(path) else {
        return MIME_OCTET_STREAM;
    };
    MIME_TABLE
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, mime)| *mime)
        .unwrap_or(MIME_OCTET_STREAM)
}

/// Extension allow-list shared by manual and unattended imports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTypePolicy {
    allowed: Vec<String>,
}

impl FileTypePolicy {
    /// Builds a policy from configured extensions. Leading dots and case are
    /// ignored, so `".PDF"` and `"pdf"` are the same entry.
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut allowed: Vec<String> = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        allowed.sort();
        allowed.dedup();
        Self { allowed }
    }

    pub fn is_allowed(&self, path: &Path) -> bool {
        match extension_of(path) {
            Some(ext) => self.allowed.iter().any(|a| *a == ext),
            None => false,
        }
    }

    pub fn allowed(&self) -> &[String] {
        &self.allowed
    }

    /// Operator-facing message for a rejected file.
    pub fn rejection_message(&self, path: &Path) -> String {
        let ext = extension_of(path)
            .map(|e| format!(".{}", e))
            .unwrap_or_else(|| "(none)".to_string());
        format!(
            "file type {} is not supported (allowed: {})",
            ext,
            self.allowed
                .iter()
                .map(|e| format!(".{}", e))
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

impl Default for FileTypePolicy {
    fn default() -> Self {
        Self::new(["pdf", "docx"])
    }
}
