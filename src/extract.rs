//! Text extraction for archived documents (PDF, DOCX).
//!
//! Extraction never fails the import: unsupported or unreadable content
//! yields an empty string and a `debug!` line. The extracted text feeds
//! search and snippets only; the stored bytes are the source of truth.

use std::io::Read;
use std::path::Path;

use tracing::debug;

use crate::file_types::{content_type_for, MIME_DOCX, MIME_PDF};

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Turns document bytes into searchable plain text.
pub trait ContentExtractor: Send + Sync {
    fn supports(&self, path: &Path) -> bool;

    /// Plain text of `data`; empty when nothing can be extracted.
    fn extract(&self, path: &Path, data: &[u8]) -> String;
}

/// PDF via `pdf-extract`, DOCX via `zip` + `quick-xml`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultExtractor;

impl ContentExtractor for DefaultExtractor {
    fn supports(&self, path: &Path) -> bool {
        matches!(content_type_for(path), MIME_PDF | MIME_DOCX)
    }

    fn extract(&self, path: &Path, data: &[u8]) -> String {
        let result = match content_type_for(path) {
            MIME_PDF => extract_pdf(data),
            MIME_DOCX => extract_docx(data),
            _ => return String::new(),
        };
        match result {
            Ok(text) => normalize_whitespace(&text),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "text extraction failed");
                String::new()
            }
        }
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, String> {
    pdf_extract::extract_text_from_mem(bytes).map_err(|e| format!("pdf: {}", e))
}

fn extract_docx(bytes: &[u8]) -> Result<String, String> {
    let mut archive =
        zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| format!("docx: {}", e))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|e| format!("docx: {}", e))?;
    let mut xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut xml)
        .map_err(|e| format!("docx: {}", e))?;
    if xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err("docx: word/document.xml exceeds size limit".to_string());
    }
    docx_paragraphs(&xml)
}

/// Collects `<w:t>` runs, one line per `<w:p>` paragraph.
fn docx_paragraphs(xml: &[u8]) -> Result<String, String> {
    use quick_xml::events::Event;

    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => lines.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"tab" => current.push('\t'),
            Ok(Event::Text(te)) if in_text => {
                current.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("docx: {}", e)),
            _ => {}
        }
        buf.clear();
    }
    if !current.is_empty() {
        lines.push(current);
    }
    Ok(lines.join("\n"))
}

/// Collapses runs of spaces/tabs to one space and 3+ newlines to two.
pub fn normalize_whitespace(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    let mut newlines = 0usize;

    for c in text.chars() {
        match c {
            '\n' => {
                pending_space = false;
                newlines += 1;
            }
            ' ' | '\t' | '\u{a0}' => {
                if newlines == 0 {
                    pending_space = true;
                }
            }
            _ => {
                if newlines > 0 {
                    if !out.is_empty() {
                        out.push_str(if newlines >= 2 { "\n\n" } else { "\n" });
                    }
                    newlines = 0;
                } else if pending_space && !out.is_empty() {
                    out.push(' ');
                }
                pending_space = false;
                out.push(c);
            }
        }
    }
    out
}
