//! `docarc folder ...` commands.

use anyhow::Result;

use crate::archive::Archive;
use crate::config::Config;
use crate::folders::FolderNode;

/// Renders the tree as indented lines, one folder per line.
pub fn render_tree(nodes: &[FolderNode]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut stack: Vec<(&FolderNode, usize)> = nodes.iter().rev().map(|n| (n, 0)).collect();
    while let Some((node, depth)) = stack.pop() {
        lines.push(format!(
            "{}{} [{}] ({} documents)",
            "  ".repeat(depth),
            node.folder.name,
            node.folder.id,
            node.document_count
        ));
        for child in node.children.iter().rev() {
            stack.push((child, depth + 1));
        }
    }
    lines
}

pub async fn run_tree(config: &Config, json: bool) -> Result<()> {
    let archive = Archive::open(config).await?;
    let nodes = archive.folders.tree().await;
    archive.close().await;
    let nodes = nodes?;

    if json {
        println!("{}", serde_json::to_string_pretty(&nodes)?);
    } else {
        for line in render_tree(&nodes) {
            println!("{}", line);
        }
    }
    Ok(())
}

/// Creates `name` under `parent` (the root when omitted).
pub async fn run_create(config: &Config, parent: Option<&str>, name: &str) -> Result<()> {
    let archive = Archive::open(config).await?;
    let parent_id = match parent {
        Some(id) => Ok(id.to_string()),
        None => archive.folders.root().await.map(|root| root.id),
    };
    let created = match parent_id {
        Ok(parent_id) => archive.folders.create(&parent_id, name).await,
        Err(e) => Err(e),
    };
    archive.close().await;
    let folder = created?;
    println!("Created folder '{}' with id {}", folder.name, folder.id);
    Ok(())
}

pub async fn run_rename(config: &Config, id: &str, name: &str) -> Result<()> {
    let archive = Archive::open(config).await?;
    let renamed = archive.folders.rename(id, name).await;
    archive.close().await;
    let folder = renamed?;
    println!("Renamed folder {} to '{}'", folder.id, folder.name);
    Ok(())
}

pub async fn run_move(config: &Config, id: &str, new_parent: &str) -> Result<()> {
    let archive = Archive::open(config).await?;
    let moved = match archive.folders.move_folder(id, new_parent).await {
        Ok(folder) => archive.folders.display_path(&folder.id).await,
        Err(e) => Err(e),
    };
    archive.close().await;
    println!("Moved folder to {}", moved?);
    Ok(())
}

pub async fn run_delete(config: &Config, id: &str) -> Result<()> {
    let archive = Archive::open(config).await?;
    let deleted = archive.folders.delete(id).await;
    archive.close().await;
    let summary = deleted?;
    println!(
        "Deleted {} folder(s) and {} document(s)",
        summary.folders, summary.documents
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Folder;

    fn node(id: &str, name: &str, docs: usize, children: Vec<FolderNode>) -> FolderNode {
        FolderNode {
            folder: Folder {
                id: id.to_string(),
                name: name.to_string(),
                parent_id: None,
                created_at: 0,
                updated_at: 0,
            },
            document_count: docs,
            children,
        }
    }

    #[test]
    fn tree_renders_depth_first_with_indentation() {
        let tree = vec![node(
            "r",
            "Root",
            0,
            vec![
                node("a", "A", 2, vec![node("c", "C", 0, vec![])]),
                node("b", "B", 1, vec![]),
            ],
        )];
        assert_eq!(
            render_tree(&tree),
            vec![
                "Root [r] (0 documents)",
                "  A [a] (2 documents)",
                "    C [c] (0 documents)",
                "  B [b] (1 documents)",
            ]
        );
    }
}
