//! In-memory [`ArchiveStore`] implementation for tests.
//!
//! Uses `HashMap`s behind `std::sync::RwLock`. Uniqueness checks run under
//! the write lock, so concurrent inserts of the same content or the same
//! sibling name resolve exactly like the SQLite constraints do.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{ArchiveError, Result};
use crate::models::{Document, DocumentSummary, Folder};

use super::{matches_term, name_key, ArchiveStore, TextHit};

/// In-memory store for tests and throwaway archives.
pub struct InMemoryStore {
    folders: RwLock<HashMap<String, Folder>>,
    docs: RwLock<HashMap<String, Document>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            folders: RwLock::new(HashMap::new()),
            docs: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn sibling_conflict(folders: &HashMap<String, Folder>, candidate: &Folder) -> Option<String> {
    let key = name_key(&candidate.name);
    if candidate.parent_id.is_none()
        && folders
            .values()
            .any(|f| f.parent_id.is_none() && f.id != candidate.id)
    {
        return Some("a root folder already exists".to_string());
    }
    folders
        .values()
        .find(|f| {
            f.id != candidate.id && f.parent_id == candidate.parent_id && name_key(&f.name) == key
        })
        .map(|f| format!("a folder named '{}' already exists here", f.name))
}

fn by_name(folders: &mut [Folder]) {
    folders.sort_by_key(|f| name_key(&f.name));
}

fn by_title(docs: &mut [DocumentSummary]) {
    docs.sort_by(|a, b| name_key(&a.title).cmp(&name_key(&b.title)).then(a.id.cmp(&b.id)));
}

#[async_trait]
impl ArchiveStore for InMemoryStore {
    async fn get_folder(&self, id: &str) -> Result<Option<Folder>> {
        Ok(self.folders.read().unwrap().get(id).cloned())
    }

    async fn list_folders(&self) -> Result<Vec<Folder>> {
        let mut all: Vec<Folder> = self.folders.read().unwrap().values().cloned().collect();
        by_name(&mut all);
        Ok(all)
    }

    async fn root_folders(&self) -> Result<Vec<Folder>> {
        let mut roots: Vec<Folder> = self
            .folders
            .read()
            .unwrap()
            .values()
            .filter(|f| f.parent_id.is_none())
            .cloned()
            .collect();
        by_name(&mut roots);
        Ok(roots)
    }

    async fn child_folders(&self, parent_id: &str) -> Result<Vec<Folder>> {
        let mut children: Vec<Folder> = self
            .folders
            .read()
            .unwrap()
            .values()
            .filter(|f| f.parent_id.as_deref() == Some(parent_id))
            .cloned()
            .collect();
        by_name(&mut children);
        Ok(children)
    }

    async fn count_folders(&self) -> Result<usize> {
        Ok(self.folders.read().unwrap().len())
    }

    async fn insert_folder(&self, folder: &Folder) -> Result<()> {
        let mut folders = self.folders.write().unwrap();
        if folders.contains_key(&folder.id) {
            return Err(ArchiveError::Conflict(format!(
                "folder id {} already exists",
                folder.id
            )));
        }
        if let Some(msg) = sibling_conflict(&folders, folder) {
            return Err(ArchiveError::Conflict(msg));
        }
        folders.insert(folder.id.clone(), folder.clone());
        Ok(())
    }

    async fn update_folder(&self, folder: &Folder) -> Result<()> {
        let mut folders = self.folders.write().unwrap();
        if !folders.contains_key(&folder.id) {
            return Err(ArchiveError::NotFound(format!("folder {}", folder.id)));
        }
        if let Some(msg) = sibling_conflict(&folders, folder) {
            return Err(ArchiveError::Conflict(msg));
        }
        folders.insert(folder.id.clone(), folder.clone());
        Ok(())
    }

    async fn delete_folder(&self, id: &str) -> Result<()> {
        self.folders.write().unwrap().remove(id);
        Ok(())
    }

    async fn get_document(&self, id: &str) -> Result<Option<DocumentSummary>> {
        Ok(self.docs.read().unwrap().get(id).map(Document::summary))
    }

    async fn get_document_with_data(&self, id: &str) -> Result<Option<Document>> {
        Ok(self.docs.read().unwrap().get(id).cloned())
    }

    async fn list_documents(&self) -> Result<Vec<DocumentSummary>> {
        let mut all: Vec<DocumentSummary> = self
            .docs
            .read()
            .unwrap()
            .values()
            .map(Document::summary)
            .collect();
        by_title(&mut all);
        Ok(all)
    }

    async fn documents_in_folder(&self, folder_id: &str) -> Result<Vec<DocumentSummary>> {
        let mut docs: Vec<DocumentSummary> = self
            .docs
            .read()
            .unwrap()
            .values()
            .filter(|d| d.folder_id == folder_id)
            .map(Document::summary)
            .collect();
        by_title(&mut docs);
        Ok(docs)
    }

    async fn document_counts(&self) -> Result<HashMap<String, usize>> {
        let mut counts = HashMap::new();
        for doc in self.docs.read().unwrap().values() {
            *counts.entry(doc.folder_id.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn insert_document(&self, doc: &Document) -> Result<()> {
        if !self.folders.read().unwrap().contains_key(&doc.folder_id) {
            return Err(ArchiveError::NotFound(format!("folder {}", doc.folder_id)));
        }
        let mut docs = self.docs.write().unwrap();
        if docs.values().any(|d| d.content_hash == doc.content_hash) {
            return Err(ArchiveError::Duplicate {
                content_hash: doc.content_hash.clone(),
            });
        }
        docs.insert(doc.id.clone(), doc.clone());
        Ok(())
    }

    async fn update_document(&self, doc: &DocumentSummary) -> Result<()> {
        if !self.folders.read().unwrap().contains_key(&doc.folder_id) {
            return Err(ArchiveError::NotFound(format!("folder {}", doc.folder_id)));
        }
        let mut docs = self.docs.write().unwrap();
        let stored = docs
            .get_mut(&doc.id)
            .ok_or_else(|| ArchiveError::NotFound(format!("document {}", doc.id)))?;
        stored.title = doc.title.clone();
        stored.folder_id = doc.folder_id.clone();
        stored.updated_at = doc.updated_at;
        Ok(())
    }

    async fn delete_document(&self, id: &str) -> Result<()> {
        self.docs.write().unwrap().remove(id);
        Ok(())
    }

    async fn find_by_hash(&self, content_hash: &str) -> Result<Option<DocumentSummary>> {
        Ok(self
            .docs
            .read()
            .unwrap()
            .values()
            .find(|d| d.content_hash == content_hash)
            .map(Document::summary))
    }

    async fn search_documents(&self, term: &str) -> Result<Vec<TextHit>> {
        let docs = self.docs.read().unwrap();
        let mut hits: Vec<TextHit> = docs
            .values()
            .filter(|d| matches_term(&d.title, &d.file_name, &d.plain_text, term))
            .map(|d| TextHit {
                summary: d.summary(),
                plain_text: d.plain_text.clone(),
            })
            .collect();
        hits.sort_by(|a, b| name_key(&a.summary.title).cmp(&name_key(&b.summary.title)));
        Ok(hits)
    }
}
