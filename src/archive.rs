//! Wiring of the archive components for a configured database.
//!
//! Every CLI command opens an [`Archive`], works through its folder tree and
//! document service, and closes it. The store handle is shared explicitly;
//! nothing is global.

use std::sync::Arc;

use anyhow::Result;

use crate::config::Config;
use crate::documents::DocumentService;
use crate::extract::DefaultExtractor;
use crate::folders::FolderTree;
use crate::store::sqlite::SqliteStore;
use crate::store::ArchiveStore;

pub struct Archive {
    pub store: Arc<SqliteStore>,
    pub folders: Arc<FolderTree>,
    pub documents: DocumentService,
}

impl Archive {
    /// Opens the database, applies the schema, and makes sure the root
    /// folder exists.
    pub async fn open(config: &Config) -> Result<Self> {
        let store = Arc::new(SqliteStore::open(config).await?);
        let shared: Arc<dyn ArchiveStore> = store.clone();
        let folders = Arc::new(FolderTree::new(shared.clone(), config.special_folders()));
        folders.ensure_root().await?;
        let documents =
            DocumentService::new(shared, Arc::new(DefaultExtractor), config.file_policy());
        Ok(Self {
            store,
            folders,
            documents,
        })
    }

    pub async fn close(self) {
        self.store.close().await;
    }
}
