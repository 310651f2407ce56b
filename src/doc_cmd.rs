//! Document commands: `import`, `list`, `export`, `rename-doc`, `move-doc`,
//! `delete-doc`.

use std::path::Path;

use anyhow::Result;

use crate::archive::Archive;
use crate::config::Config;
use crate::get::format_ts_iso;

/// Imports one file into `folder` (the root when omitted). The source file
/// is left in place.
pub async fn run_import(config: &Config, file: &Path, folder: Option<&str>) -> Result<()> {
    let archive = Archive::open(config).await?;
    let folder_id = match folder {
        Some(id) => Ok(id.to_string()),
        None => archive.folders.root().await.map(|root| root.id),
    };
    let imported = match folder_id {
        Ok(folder_id) => archive.documents.import_file(&folder_id, file).await,
        Err(e) => Err(e),
    };
    archive.close().await;
    let doc = imported?;
    println!("Imported {} as {}", doc.file_name, doc.id);
    Ok(())
}

pub async fn run_list(config: &Config, folder: Option<&str>, json: bool) -> Result<()> {
    let archive = Archive::open(config).await?;
    let docs = match folder {
        Some(id) => archive.documents.list_by_folder(id).await,
        None => archive.documents.list_all().await,
    };
    archive.close().await;
    let docs = docs?;

    if json {
        println!("{}", serde_json::to_string_pretty(&docs)?);
        return Ok(());
    }
    if docs.is_empty() {
        println!("No documents.");
        return Ok(());
    }
    for d in docs {
        println!(
            "{}  {}  {:>10}  {} ({})",
            d.id,
            format_ts_iso(d.created_at),
            d.size,
            d.title,
            d.file_name
        );
    }
    Ok(())
}

pub async fn run_export(config: &Config, id: &str, target: &Path) -> Result<()> {
    let archive = Archive::open(config).await?;
    let exported = archive.documents.export_to_file(id, target).await;
    archive.close().await;
    let bytes = exported?;
    println!("Exported {} bytes to {}", bytes, target.display());
    Ok(())
}

pub async fn run_rename(config: &Config, id: &str, title: &str) -> Result<()> {
    let archive = Archive::open(config).await?;
    let renamed = archive.documents.rename(id, title).await;
    archive.close().await;
    let doc = renamed?;
    println!("Renamed document {} to '{}'", doc.id, doc.title);
    Ok(())
}

pub async fn run_move(config: &Config, id: &str, folder: &str) -> Result<()> {
    let archive = Archive::open(config).await?;
    let moved = archive.documents.move_to_folder(id, folder).await;
    archive.close().await;
    let doc = moved?;
    println!("Moved document {} to folder {}", doc.id, doc.folder_id);
    Ok(())
}

pub async fn run_delete(config: &Config, id: &str) -> Result<()> {
    let archive = Archive::open(config).await?;
    let deleted = archive.documents.delete(id).await;
    archive.close().await;
    deleted?;
    println!("Deleted document {}", id);
    Ok(())
}
