//! SQLite-backed [`ArchiveStore`] implementation.
//!
//! Maps each store operation to SQL against the schema created by
//! [`crate::migrate::apply_schema`]. The schema's unique indexes are the
//! authoritative dedupe and sibling-name guards; constraint violations are
//! translated into [`ArchiveError::Duplicate`] and [`ArchiveError::Conflict`].
//! Folder names are indexed through a `name_key` column holding
//! [`name_key`](super::name_key) so the index folds case the same way the
//! folder tree does. Search filters in Rust for the same reason.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::error::{ArchiveError, Result};
use crate::migrate;
use crate::models::{Document, DocumentSummary, Folder};

use super::{matches_term, name_key, ArchiveStore, TextHit};

const SUMMARY_COLUMNS: &str = "id, title, file_name, content_type, length(data) AS size, content_hash, folder_id, created_at, updated_at";

/// SQLite implementation of the [`ArchiveStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connects to the configured database and makes sure the schema exists.
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let pool = db::connect(config).await?;
        migrate::apply_schema(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn folder_from_row(row: &SqliteRow) -> Folder {
    Folder {
        id: row.get("id"),
        name: row.get("name"),
        parent_id: row.get("parent_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn summary_from_row(row: &SqliteRow) -> DocumentSummary {
    DocumentSummary {
        id: row.get("id"),
        title: row.get("title"),
        file_name: row.get("file_name"),
        content_type: row.get("content_type"),
        size: row.get("size"),
        content_hash: row.get("content_hash"),
        folder_id: row.get("folder_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn folder_write_error(e: sqlx::Error, folder: &Folder) -> ArchiveError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return if folder.parent_id.is_none() {
                ArchiveError::Conflict("a root folder already exists".to_string())
            } else {
                ArchiveError::Conflict(format!(
                    "a folder named '{}' already exists here",
                    folder.name
                ))
            };
        }
        if db_err.is_foreign_key_violation() {
            return ArchiveError::NotFound(format!(
                "parent folder {}",
                folder.parent_id.as_deref().unwrap_or("?")
            ));
        }
    }
    ArchiveError::Storage(e)
}

fn document_write_error(e: sqlx::Error, content_hash: &str, folder_id: &str) -> ArchiveError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return ArchiveError::Duplicate {
                content_hash: content_hash.to_string(),
            };
        }
        if db_err.is_foreign_key_violation() {
            return ArchiveError::NotFound(format!("folder {}", folder_id));
        }
    }
    ArchiveError::Storage(e)
}

#[async_trait]
impl ArchiveStore for SqliteStore {
    async fn get_folder(&self, id: &str) -> Result<Option<Folder>> {
        let row = sqlx::query(
            "SELECT id, name, parent_id, created_at, updated_at FROM folders WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(folder_from_row))
    }

    async fn list_folders(&self) -> Result<Vec<Folder>> {
        let rows = sqlx::query(
            "SELECT id, name, parent_id, created_at, updated_at FROM folders ORDER BY name_key",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(folder_from_row).collect())
    }

    async fn root_folders(&self) -> Result<Vec<Folder>> {
        let rows = sqlx::query(
            "SELECT id, name, parent_id, created_at, updated_at FROM folders WHERE parent_id IS NULL ORDER BY name_key",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(folder_from_row).collect())
    }

    async fn child_folders(&self, parent_id: &str) -> Result<Vec<Folder>> {
        let rows = sqlx::query(
            "SELECT id, name, parent_id, created_at, updated_at FROM folders WHERE parent_id = ? ORDER BY name_key",
        )
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(folder_from_row).collect())
    }

    async fn count_folders(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM folders")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn insert_folder(&self, folder: &Folder) -> Result<()> {
        sqlx::query(
            "INSERT INTO folders (id, name, name_key, parent_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&folder.id)
        .bind(&folder.name)
        .bind(name_key(&folder.name))
        .bind(&folder.parent_id)
        .bind(folder.created_at)
        .bind(folder.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| folder_write_error(e, folder))?;
        Ok(())
    }

    async fn update_folder(&self, folder: &Folder) -> Result<()> {
        let result =
            sqlx::query("UPDATE folders SET name = ?, name_key = ?, parent_id = ?, updated_at = ? WHERE id = ?")
                .bind(&folder.name)
                .bind(name_key(&folder.name))
                .bind(&folder.parent_id)
                .bind(folder.updated_at)
                .bind(&folder.id)
                .execute(&self.pool)
                .await
                .map_err(|e| folder_write_error(e, folder))?;
        if result.rows_affected() == 0 {
            return Err(ArchiveError::NotFound(format!("folder {}", folder.id)));
        }
        Ok(())
    }

    async fn delete_folder(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM folders WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<DocumentSummary>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM documents WHERE id = ?",
            SUMMARY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(summary_from_row))
    }

    async fn get_document_with_data(&self, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query(
            "SELECT id, title, file_name, content_type, data, plain_text, content_hash, folder_id, created_at, updated_at FROM documents WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|row| Document {
            id: row.get("id"),
            title: row.get("title"),
            file_name: row.get("file_name"),
            content_type: row.get("content_type"),
            data: row.get("data"),
            plain_text: row.get("plain_text"),
            content_hash: row.get("content_hash"),
            folder_id: row.get("folder_id"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }))
    }

    async fn list_documents(&self) -> Result<Vec<DocumentSummary>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM documents ORDER BY title COLLATE NOCASE, id",
            SUMMARY_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(summary_from_row).collect())
    }

    async fn documents_in_folder(&self, folder_id: &str) -> Result<Vec<DocumentSummary>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM documents WHERE folder_id = ? ORDER BY title COLLATE NOCASE, id",
            SUMMARY_COLUMNS
        ))
        .bind(folder_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(summary_from_row).collect())
    }

    async fn document_counts(&self) -> Result<HashMap<String, usize>> {
        let rows = sqlx::query("SELECT folder_id, COUNT(*) AS n FROM documents GROUP BY folder_id")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|row| {
                let folder_id: String = row.get("folder_id");
                let n: i64 = row.get("n");
                (folder_id, n as usize)
            })
            .collect())
    }

    async fn insert_document(&self, doc: &Document) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, title, file_name, content_type, data, plain_text,
                                   content_hash, folder_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.title)
        .bind(&doc.file_name)
        .bind(&doc.content_type)
        .bind(&doc.data)
        .bind(&doc.plain_text)
        .bind(&doc.content_hash)
        .bind(&doc.folder_id)
        .bind(doc.created_at)
        .bind(doc.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| document_write_error(e, &doc.content_hash, &doc.folder_id))?;
        Ok(())
    }

    async fn update_document(&self, doc: &DocumentSummary) -> Result<()> {
        let result =
            sqlx::query("UPDATE documents SET title = ?, folder_id = ?, updated_at = ? WHERE id = ?")
                .bind(&doc.title)
                .bind(&doc.folder_id)
                .bind(doc.updated_at)
                .bind(&doc.id)
                .execute(&self.pool)
                .await
                .map_err(|e| document_write_error(e, &doc.content_hash, &doc.folder_id))?;
        if result.rows_affected() == 0 {
            return Err(ArchiveError::NotFound(format!("document {}", doc.id)));
        }
        Ok(())
    }

    async fn delete_document(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_by_hash(&self, content_hash: &str) -> Result<Option<DocumentSummary>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM documents WHERE content_hash = ?",
            SUMMARY_COLUMNS
        ))
        .bind(content_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(summary_from_row))
    }

    async fn search_documents(&self, term: &str) -> Result<Vec<TextHit>> {
        // LIKE and NOCASE only fold ASCII, so matching happens here.
        let rows = sqlx::query(&format!(
            "SELECT {}, plain_text FROM documents ORDER BY title COLLATE NOCASE, id",
            SUMMARY_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|row| TextHit {
                summary: summary_from_row(row),
                plain_text: row.get("plain_text"),
            })
            .filter(|hit| {
                matches_term(
                    &hit.summary.title,
                    &hit.summary.file_name,
                    &hit.plain_text,
                    term,
                )
            })
            .collect())
    }
}
