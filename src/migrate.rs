//! Schema creation for the archive database.

use anyhow::Result;
use sqlx::SqlitePool;

/// Creates every table and index if missing. Idempotent.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    // Create folders table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS folders (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            name_key TEXT NOT NULL,
            parent_id TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            FOREIGN KEY (parent_id) REFERENCES folders(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create documents table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            file_name TEXT NOT NULL,
            content_type TEXT NOT NULL DEFAULT 'application/octet-stream',
            data BLOB NOT NULL,
            plain_text TEXT NOT NULL DEFAULT '',
            content_hash TEXT NOT NULL,
            folder_id TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE(content_hash),
            FOREIGN KEY (folder_id) REFERENCES folders(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create import log table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS import_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp INTEGER NOT NULL,
            file_name TEXT NOT NULL,
            status TEXT NOT NULL,
            message TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Sibling names are unique after case folding (`name_key` holds the
    // Unicode-lowercased name); the root sorts under ''.
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_folders_parent_name_key ON folders(IFNULL(parent_id, ''), name_key)",
    )
    .execute(pool)
    .await?;

    // At most one folder without a parent.
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_folders_single_root ON folders(IFNULL(parent_id, '')) WHERE parent_id IS NULL",
    )
    .execute(pool)
    .await?;

    // Create indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_folders_parent_id ON folders(parent_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_folder_id ON documents(folder_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_import_log_timestamp ON import_log(timestamp DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
