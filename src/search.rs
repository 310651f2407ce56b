//! Substring search with snippets and folder paths.
//!
//! Matching is a case-insensitive substring test over title, file name, and
//! extracted text, done by the store. This module turns the raw hits into
//! [`SearchResult`]s: it resolves each document's folder path and cuts a
//! snippet around the first occurrence of the term in the text.

use std::collections::HashMap;

use anyhow::Result;

use crate::archive::Archive;
use crate::config::Config;
use crate::folders::FolderTree;
use crate::models::SearchResult;

const CHARS_BEFORE: usize = 80;
const CHARS_AFTER: usize = 120;
const PREVIEW_CHARS: usize = 200;

/// Searches the archive. A blank term yields no results.
pub async fn search(tree: &FolderTree, term: &str) -> crate::error::Result<Vec<SearchResult>> {
    let term = term.trim();
    if term.is_empty() {
        return Ok(Vec::new());
    }

    let hits = tree.store().search_documents(term).await?;
    let mut paths: HashMap<String, String> = HashMap::new();
    let mut results = Vec::with_capacity(hits.len());
    for hit in hits {
        let folder_id = hit.summary.folder_id.clone();
        let folder_path = match paths.get(&folder_id) {
            Some(p) => p.clone(),
            None => {
                let p = tree.display_path(&folder_id).await?;
                paths.insert(folder_id.clone(), p.clone());
                p
            }
        };
        results.push(SearchResult {
            document_id: hit.summary.id,
            title: hit.summary.title,
            file_name: hit.summary.file_name,
            folder_id,
            folder_path,
            snippet: make_snippet(&hit.plain_text, term),
        });
    }
    Ok(results)
}

/// Excerpt of `text` around the first case-insensitive occurrence of `term`:
/// 80 characters before, 120 after, whitespace collapsed, with `...` marking
/// truncation. Without an occurrence, the first 200 characters.
pub fn make_snippet(text: &str, term: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let folded: Vec<char> = chars.iter().map(|c| fold(*c)).collect();
    let needle: Vec<char> = term.chars().map(fold).collect();

    let position = if needle.is_empty() {
        None
    } else {
        folded.windows(needle.len()).position(|w| w == needle.as_slice())
    };

    let (start, end) = match position {
        Some(pos) => (
            pos.saturating_sub(CHARS_BEFORE),
            (pos + needle.len() + CHARS_AFTER).min(chars.len()),
        ),
        None => (0, PREVIEW_CHARS.min(chars.len())),
    };

    let excerpt: String = chars[start..end].iter().collect();
    let prefix = if start > 0 { "..." } else { "" };
    let suffix = if end < chars.len() { "..." } else { "" };
    format!("{}{}{}", prefix, collapse_whitespace(&excerpt), suffix)
}

/// Single-char case fold that keeps indices aligned with the source text.
fn fold(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// CLI entry point for `docarc search`.
pub async fn run_search(config: &Config, term: &str) -> Result<()> {
    let archive = Archive::open(config).await?;
    let results = search(&archive.folders, term).await;
    archive.close().await;
    let results = results?;

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, r) in results.iter().enumerate() {
        println!("{}. {} ({})", i + 1, r.title, r.file_name);
        println!("    id:     {}", r.document_id);
        println!("    folder: {}", r.folder_path);
        if !r.snippet.is_empty() {
            println!("    > {}", r.snippet);
        }
        println!();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::documents::DocumentService;
    use crate::extract::DefaultExtractor;
    use crate::file_types::FileTypePolicy;
    use crate::store::memory::InMemoryStore;
    use crate::store::ArchiveStore;

    #[test]
    fn snippet_empty_text() {
        assert_eq!(make_snippet("", "x"), "");
    }

    #[test]
    fn snippet_short_text_is_not_truncated() {
        assert_eq!(make_snippet("Total  due:\n42 EUR", "due"), "Total due: 42 EUR");
    }

    #[test]
    fn snippet_window_around_match() {
        let text = format!("{}NEEDLE{}", "a".repeat(100), "b".repeat(200));
        let snippet = make_snippet(&text, "needle");
        let expected = format!("...{}NEEDLE{}...", "a".repeat(80), "b".repeat(120));
        assert_eq!(snippet, expected);
    }

    #[test]
    fn snippet_without_match_shows_preview() {
        let text = "x".repeat(250);
        let snippet = make_snippet(&text, "missing");
        assert_eq!(snippet, format!("{}...", "x".repeat(200)));
    }

    #[test]
    fn snippet_counts_characters_not_bytes() {
        let text = format!("{}Straße", "ü".repeat(90));
        let snippet = make_snippet(&text, "STRASSE");
        // No match (ß does not fold to "ss"); preview is char-safe.
        assert!(snippet.starts_with('ü'));
        let hit = make_snippet(&text, "straße");
        assert!(hit.starts_with("..."));
        assert!(hit.ends_with("Straße"));
    }

    #[tokio::test]
    async fn search_resolves_folder_paths() {
        let store: Arc<dyn ArchiveStore> = Arc::new(InMemoryStore::new());
        let tree = FolderTree::new(store.clone(), Vec::<String>::new());
        let root = tree.ensure_root().await.unwrap();
        let taxes = tree.create(&root.id, "Taxes").await.unwrap();
        let y2024 = tree.create(&taxes.id, "2024").await.unwrap();
        let docs = DocumentService::new(store, Arc::new(DefaultExtractor), FileTypePolicy::default());
        docs.import_bytes(
            &y2024.id,
            "invoice.pdf",
            b"one".to_vec(),
            "Invoice number 17, amount due".to_string(),
        )
        .await
        .unwrap();
        docs.import_bytes(&root.id, "letter.pdf", b"two".to_vec(), "Dear reader".to_string())
            .await
            .unwrap();

        let results = search(&tree, "AMOUNT").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].folder_path, "Root / Taxes / 2024");
        assert_eq!(results[0].snippet, "Invoice number 17, amount due");

        // File-name matches count even when the text does not contain the term.
        let by_name = search(&tree, "letter").await.unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].snippet, "Dear reader");

        assert!(search(&tree, "   ").await.unwrap().is_empty());
    }
}
