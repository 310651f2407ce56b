//! Document retrieval by ID.
//!
//! Fetches a document's metadata and extracted text together with the path
//! of its folder. Used by the `docarc get` CLI command.

use anyhow::Result;
use serde::Serialize;

use crate::archive::Archive;
use crate::config::Config;
use crate::documents::DocumentService;
use crate::folders::FolderTree;

#[derive(Debug, Clone, Serialize)]
pub struct DocumentResponse {
    pub id: String,
    pub title: String,
    pub file_name: String,
    pub content_type: String,
    pub size: usize,
    pub content_hash: String,
    pub folder_id: String,
    pub folder_path: String,
    pub created_at: String, // ISO8601
    pub updated_at: String, // ISO8601
    pub plain_text: String,
}

/// Core get function returning structured data.
pub async fn get_document(
    documents: &DocumentService,
    tree: &FolderTree,
    id: &str,
) -> crate::error::Result<DocumentResponse> {
    let doc = documents.get_with_data(id).await?;
    let folder_path = tree.display_path(&doc.folder_id).await?;
    Ok(DocumentResponse {
        size: doc.data.len(),
        created_at: format_ts_iso(doc.created_at),
        updated_at: format_ts_iso(doc.updated_at),
        id: doc.id,
        title: doc.title,
        file_name: doc.file_name,
        content_type: doc.content_type,
        content_hash: doc.content_hash,
        folder_id: doc.folder_id,
        folder_path,
        plain_text: doc.plain_text,
    })
}

/// CLI entry point for `docarc get`.
pub async fn run_get(config: &Config, id: &str, json: bool) -> Result<()> {
    let archive = Archive::open(config).await?;
    let doc = get_document(&archive.documents, &archive.folders, id).await;
    archive.close().await;
    let doc = doc?;

    if json {
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    println!("--- Document ---");
    println!("id:           {}", doc.id);
    println!("title:        {}", doc.title);
    println!("file_name:    {}", doc.file_name);
    println!("content_type: {}", doc.content_type);
    println!("size:         {} bytes", doc.size);
    println!("sha256:       {}", doc.content_hash);
    println!("folder:       {} ({})", doc.folder_path, doc.folder_id);
    println!("created_at:   {}", doc.created_at);
    println!("updated_at:   {}", doc.updated_at);
    println!();

    println!("--- Text ---");
    if doc.plain_text.is_empty() {
        println!("(no extracted text)");
    } else {
        println!("{}", doc.plain_text);
    }

    Ok(())
}

pub(crate) fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}
