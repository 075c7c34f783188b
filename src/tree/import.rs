use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use super::engine::{ProjectTree, DEFAULT_ROOT_NAME};
use super::node::{FileNode, FolderNode, Node};
use crate::error::{AppError, Result};

/// Directory names never imported from a template.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    ".git",
    "node_modules",
    "__pycache__",
    "venv",
    ".venv",
    ".tox",
    ".mypy_cache",
    ".pytest_cache",
    "target",
    "dist",
];

/// Where a workspace with no stored content gets its starting tree.
#[async_trait]
pub trait TemplateSource: Send + Sync {
    async fn load(&self) -> Result<ProjectTree>;
}

/// An empty `Root` folder.
#[derive(Debug, Default, Clone)]
pub struct BlankTemplate;

#[async_trait]
impl TemplateSource for BlankTemplate {
    async fn load(&self) -> Result<ProjectTree> {
        Ok(ProjectTree::default())
    }
}

/// A starter project read from a directory on disk.
#[derive(Debug, Clone)]
pub struct DirectoryTemplate {
    root: PathBuf,
    ignore_patterns: Vec<String>,
}

impl DirectoryTemplate {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ignore_patterns: DEFAULT_IGNORE_PATTERNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[async_trait]
impl TemplateSource for DirectoryTemplate {
    async fn load(&self) -> Result<ProjectTree> {
        let root = self.root.clone();
        let ignore = self.ignore_patterns.clone();
        tokio::task::spawn_blocking(move || import_dir(&root, &ignore))
            .await
            .map_err(|e| AppError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?
    }
}

/// Read a directory into a fresh tree.
///
/// Entries are sorted by name, directories named in `ignore` are skipped, and
/// files that are not valid UTF-8 are left out with a warning.
pub fn import_dir(path: &Path, ignore: &[String]) -> Result<ProjectTree> {
    if !path.is_dir() {
        return Err(AppError::InvalidPath(path.display().to_string()));
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| DEFAULT_ROOT_NAME.to_string());
    let mut root = FolderNode::new(name);
    load_children(&mut root, path, ignore)?;
    debug!(path = %path.display(), files = root_file_count(&root), "template imported");
    Ok(ProjectTree::from_root(root))
}

fn load_children(folder: &mut FolderNode, dir: &Path, ignore: &[String]) -> Result<()> {
    let mut entries: Vec<_> = fs::read_dir(dir)?.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let entry_path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        let file_type = match entry.file_type() {
            Ok(t) => t,
            Err(_) => continue,
        };

        if file_type.is_dir() {
            if ignore.iter().any(|p| *p == name) {
                continue;
            }
            let mut sub = FolderNode::new(name);
            load_children(&mut sub, &entry_path, ignore)?;
            folder.children.push(Node::Folder(sub));
        } else if file_type.is_file() {
            match fs::read_to_string(&entry_path) {
                Ok(content) => {
                    folder
                        .children
                        .push(Node::File(FileNode::from_display_name(&name).with_content(content)));
                }
                Err(err) => {
                    warn!(path = %entry_path.display(), error = %err, "skipping unreadable template file");
                }
            }
        }
    }
    Ok(())
}

fn root_file_count(root: &FolderNode) -> usize {
    root.children.iter().map(|c| c.file_ids().len()).sum()
}
