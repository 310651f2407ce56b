//! Folder tree consistency.
//!
//! [`FolderTree`] owns every structural mutation of the folder hierarchy and
//! keeps these invariants:
//!
//! - exactly one folder has no parent (the root, named `"Root"`);
//! - folder names are unique among siblings, compared case-insensitively;
//! - following `parent_id` from any folder reaches the root (no cycles);
//! - the root and the configured special folders (root-level inbox folders)
//!   cannot be renamed, moved, or deleted.
//!
//! All walks over the tree (descendant checks, cascade delete, tree
//! building) are iterative and bounded by the folder count, so a deep or
//! corrupted hierarchy cannot overflow the stack or loop forever.
//!
//! Deleting a folder cascades: child folders first, then each folder's
//! documents, then the folder itself. There is no rollback if a step fails
//! midway; the caller sees the error and whatever was already removed stays
//! removed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ArchiveError, Result};
use crate::models::Folder;
use crate::store::{name_key, ArchiveStore};

pub const ROOT_NAME: &str = "Root";
pub const MAX_NAME_LEN: usize = 255;

const INVALID_NAME_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Validates a folder or file name and returns it trimmed.
pub fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ArchiveError::InvalidArgument(
            "name must not be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(ArchiveError::InvalidArgument(format!(
            "name must be at most {} characters",
            MAX_NAME_LEN
        )));
    }
    if let Some(c) = trimmed
        .chars()
        .find(|c| INVALID_NAME_CHARS.contains(c) || c.is_control())
    {
        return Err(ArchiveError::InvalidArgument(format!(
            "name contains an invalid character: {:?}",
            c
        )));
    }
    Ok(trimmed.to_string())
}

/// A folder with its document count and nested children, for display.
#[derive(Debug, Clone, Serialize)]
pub struct FolderNode {
    pub folder: Folder,
    pub document_count: usize,
    pub children: Vec<FolderNode>,
}

/// What a cascading delete removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeleteSummary {
    pub folders: usize,
    pub documents: usize,
}

pub struct FolderTree {
    store: Arc<dyn ArchiveStore>,
    special: HashSet<String>,
}

impl FolderTree {
    /// `special_names` are root-level folders protected from rename, move,
    /// and delete (e.g. the auto-import inbox folder).
    pub fn new<I, S>(store: Arc<dyn ArchiveStore>, special_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            store,
            special: special_names
                .into_iter()
                .map(|s| name_key(s.as_ref().trim()))
                .collect(),
        }
    }

    pub fn store(&self) -> &Arc<dyn ArchiveStore> {
        &self.store
    }

    /// Creates the root folder if none exists. Idempotent.
    pub async fn ensure_root(&self) -> Result<Folder> {
        if let Some(root) = self.store.root_folders().await?.into_iter().next() {
            return Ok(root);
        }

        let root = new_folder(ROOT_NAME, None);
        match self.store.insert_folder(&root).await {
            Ok(()) => {
                info!(folder_id = %root.id, "created root folder");
                Ok(root)
            }
            // Lost a race against another creator; theirs is the root.
            Err(ArchiveError::Conflict(_)) => self.root().await,
            Err(e) => Err(e),
        }
    }

    pub async fn root(&self) -> Result<Folder> {
        self.store
            .root_folders()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ArchiveError::NotFound("root folder".to_string()))
    }

    /// Returns the id of the root's child named `name` (case-insensitive),
    /// creating root and child as needed. Idempotent.
    pub async fn ensure_named_child_of_root(&self, name: &str) -> Result<String> {
        let name = validate_name(name)?;
        let root = self.ensure_root().await?;

        if let Some(existing) = self.find_child(&root.id, &name).await? {
            return Ok(existing.id);
        }

        let folder = new_folder(&name, Some(&root.id));
        match self.store.insert_folder(&folder).await {
            Ok(()) => {
                info!(folder_id = %folder.id, name = %folder.name, "created root-level folder");
                Ok(folder.id)
            }
            Err(ArchiveError::Conflict(_)) => self
                .find_child(&root.id, &name)
                .await?
                .map(|f| f.id)
                .ok_or_else(|| {
                    ArchiveError::Conflict(format!("could not create folder '{}'", name))
                }),
            Err(e) => Err(e),
        }
    }

    pub async fn get(&self, id: &str) -> Result<Folder> {
        self.store
            .get_folder(id)
            .await?
            .ok_or_else(|| ArchiveError::NotFound(format!("folder {}", id)))
    }

    pub async fn children(&self, parent_id: &str) -> Result<Vec<Folder>> {
        self.get(parent_id).await?;
        self.store.child_folders(parent_id).await
    }

    pub async fn create(&self, parent_id: &str, name: &str) -> Result<Folder> {
        let name = validate_name(name)?;
        let parent = self.get(parent_id).await?;

        if self.find_child(&parent.id, &name).await?.is_some() {
            return Err(ArchiveError::Conflict(format!(
                "a folder named '{}' already exists in '{}'",
                name, parent.name
            )));
        }

        let folder = new_folder(&name, Some(&parent.id));
        self.store.insert_folder(&folder).await?;
        info!(folder_id = %folder.id, parent_id = %parent.id, name = %folder.name, "created folder");
        Ok(folder)
    }

    pub async fn rename(&self, id: &str, new_name: &str) -> Result<Folder> {
        let new_name = validate_name(new_name)?;
        let mut folder = self.get(id).await?;
        self.ensure_mutable(&folder, "renamed").await?;

        if let Some(parent_id) = folder.parent_id.as_deref() {
            if let Some(other) = self.find_child(parent_id, &new_name).await? {
                if other.id != folder.id {
                    return Err(ArchiveError::Conflict(format!(
                        "a folder named '{}' already exists here",
                        other.name
                    )));
                }
            }
        }

        let old_name = std::mem::replace(&mut folder.name, new_name);
        folder.updated_at = Utc::now().timestamp();
        self.store.update_folder(&folder).await?;
        info!(folder_id = %folder.id, from = %old_name, to = %folder.name, "renamed folder");
        Ok(folder)
    }

    pub async fn move_folder(&self, id: &str, new_parent_id: &str) -> Result<Folder> {
        if id == new_parent_id {
            return Err(ArchiveError::InvalidArgument(
                "a folder cannot be moved into itself".to_string(),
            ));
        }

        let mut folder = self.get(id).await?;
        let new_parent = self.get(new_parent_id).await?;
        self.ensure_mutable(&folder, "moved").await?;

        if self.is_self_or_descendant(&new_parent, &folder.id).await? {
            return Err(ArchiveError::Conflict(format!(
                "cannot move '{}' into its own subtree",
                folder.name
            )));
        }

        if folder.parent_id.as_deref() == Some(new_parent.id.as_str()) {
            return Ok(folder);
        }

        if let Some(other) = self.find_child(&new_parent.id, &folder.name).await? {
            return Err(ArchiveError::Conflict(format!(
                "'{}' already contains a folder named '{}'",
                new_parent.name, other.name
            )));
        }

        let old_parent = folder.parent_id.replace(new_parent.id.clone());
        folder.updated_at = Utc::now().timestamp();
        self.store.update_folder(&folder).await?;
        info!(
            folder_id = %folder.id,
            from = old_parent.as_deref().unwrap_or("-"),
            to = %new_parent.id,
            "moved folder"
        );
        Ok(folder)
    }

    /// Deletes a folder, its whole subtree, and every document in it.
    pub async fn delete(&self, id: &str) -> Result<DeleteSummary> {
        let folder = self.get(id).await?;
        self.ensure_mutable(&folder, "deleted").await?;

        // Breadth-first collection; reversed, every folder precedes its parent.
        let mut order = vec![folder.id.clone()];
        let mut seen: HashSet<String> = order.iter().cloned().collect();
        let mut next = 0;
        while next < order.len() {
            for child in self.store.child_folders(&order[next]).await? {
                if seen.insert(child.id.clone()) {
                    order.push(child.id);
                }
            }
            next += 1;
        }

        let mut summary = DeleteSummary::default();
        for folder_id in order.iter().rev() {
            for doc in self.store.documents_in_folder(folder_id).await? {
                self.store.delete_document(&doc.id).await?;
                summary.documents += 1;
            }
            self.store.delete_folder(folder_id).await?;
            summary.folders += 1;
        }

        info!(
            folder_id = %folder.id,
            name = %folder.name,
            folders = summary.folders,
            documents = summary.documents,
            "deleted folder"
        );
        Ok(summary)
    }

    /// True for the root and for special root-level folders.
    pub async fn is_special(&self, id: &str) -> Result<bool> {
        let folder = self.get(id).await?;
        Ok(self.protection_reason(&folder).await?.is_some())
    }

    /// The full hierarchy with per-folder document counts.
    pub async fn tree(&self) -> Result<Vec<FolderNode>> {
        let folders = self.store.list_folders().await?;
        let counts = self.store.document_counts().await?;

        let mut children_of: HashMap<Option<String>, Vec<String>> = HashMap::new();
        let mut by_id: HashMap<String, Folder> = HashMap::new();
        for f in folders {
            children_of
                .entry(f.parent_id.clone())
                .or_default()
                .push(f.id.clone());
            by_id.insert(f.id.clone(), f);
        }

        let roots = children_of.get(&None).cloned().unwrap_or_default();
        let mut order: Vec<String> = roots.clone();
        let mut seen: HashSet<String> = order.iter().cloned().collect();
        let mut next = 0;
        while next < order.len() {
            if let Some(kids) = children_of.get(&Some(order[next].clone())) {
                for kid in kids {
                    if seen.insert(kid.clone()) {
                        order.push(kid.clone());
                    }
                }
            }
            next += 1;
        }

        let mut built: HashMap<String, FolderNode> = HashMap::new();
        for id in order.iter().rev() {
            let Some(folder) = by_id.remove(id) else {
                continue;
            };
            let mut children: Vec<FolderNode> = children_of
                .get(&Some(id.clone()))
                .map(|kids| kids.iter().filter_map(|k| built.remove(k)).collect())
                .unwrap_or_default();
            children.sort_by_key(|n| name_key(&n.folder.name));
            let document_count = counts.get(id).copied().unwrap_or(0);
            built.insert(
                id.clone(),
                FolderNode {
                    folder,
                    document_count,
                    children,
                },
            );
        }

        let mut nodes: Vec<FolderNode> = roots.iter().filter_map(|r| built.remove(r)).collect();
        nodes.sort_by_key(|n| name_key(&n.folder.name));
        Ok(nodes)
    }

    /// Folder names from the root down to `id`, inclusive.
    pub async fn path_of(&self, id: &str) -> Result<Vec<String>> {
        let limit = self.store.count_folders().await?;
        let mut names = Vec::new();
        let mut current = Some(self.get(id).await?);
        while let Some(folder) = current {
            if names.len() > limit {
                warn!(folder_id = %id, "parent chain longer than folder count");
                break;
            }
            names.push(folder.name.clone());
            current = match folder.parent_id {
                Some(parent_id) => self.store.get_folder(&parent_id).await?,
                None => None,
            };
        }
        names.reverse();
        Ok(names)
    }

    /// `path_of` rendered as `"Root / A / B"`.
    pub async fn display_path(&self, id: &str) -> Result<String> {
        Ok(self.path_of(id).await?.join(" / "))
    }

    async fn find_child(&self, parent_id: &str, name: &str) -> Result<Option<Folder>> {
        let key = name_key(name);
        Ok(self
            .store
            .child_folders(parent_id)
            .await?
            .into_iter()
            .find(|f| name_key(&f.name) == key))
    }

    async fn protection_reason(&self, folder: &Folder) -> Result<Option<&'static str>> {
        let Some(parent_id) = folder.parent_id.as_deref() else {
            return Ok(Some("the root folder"));
        };
        if !self.special.contains(&name_key(&folder.name)) {
            return Ok(None);
        }
        let parent_is_root = self
            .store
            .get_folder(parent_id)
            .await?
            .map(|p| p.is_root())
            .unwrap_or(false);
        Ok(parent_is_root.then_some("a special folder"))
    }

    async fn ensure_mutable(&self, folder: &Folder, action: &str) -> Result<()> {
        match self.protection_reason(folder).await? {
            Some(reason) => Err(ArchiveError::Forbidden(format!(
                "'{}' is {} and cannot be {}",
                folder.name, reason, action
            ))),
            None => Ok(()),
        }
    }

    /// Walks up from `candidate` looking for `ancestor_id`. A chain longer
    /// than the folder count, or one that dangles, counts as a match.
    async fn is_self_or_descendant(&self, candidate: &Folder, ancestor_id: &str) -> Result<bool> {
        let limit = self.store.count_folders().await?;
        let mut current = candidate.clone();
        for _ in 0..=limit {
            if current.id == ancestor_id {
                return Ok(true);
            }
            let Some(parent_id) = current.parent_id.clone() else {
                return Ok(false);
            };
            match self.store.get_folder(&parent_id).await? {
                Some(parent) => current = parent,
                None => {
                    warn!(folder_id = %current.id, parent_id = %parent_id, "dangling parent reference");
                    return Ok(true);
                }
            }
        }
        warn!(folder_id = %candidate.id, "parent chain exceeds folder count");
        Ok(true)
    }
}

fn new_folder(name: &str, parent_id: Option<&str>) -> Folder {
    let now = Utc::now().timestamp();
    Folder {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        parent_id: parent_id.map(str::to_string),
        created_at: now,
        updated_at: now,
    }
}
