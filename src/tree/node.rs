use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Stable identity of a tree node.
///
/// Assigned once when the node is created (or first loaded) and never derived
/// from the node's name, so renames and moves cannot change it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of a tree node, for callers that only need the tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Folder,
}

/// A text file in the project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNode {
    pub id: NodeId,
    pub filename: String,
    /// Extension without the leading dot; may be empty.
    pub extension: String,
    /// Last saved text of the file.
    pub content: String,
}

impl FileNode {
    /// Create a file with a fresh id.
    pub fn new(filename: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            id: NodeId::generate(),
            filename: filename.into(),
            extension: extension.into(),
            content: String::new(),
        }
    }

    /// Builder-style content setter.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Create a file from a display name such as `index.css`.
    pub fn from_display_name(name: &str) -> Self {
        let (filename, extension) = split_file_name(name);
        Self::new(filename, extension)
    }

    /// The name shown in the explorer and used as the sibling key:
    /// `filename.extension`, or just `filename` when there is no extension.
    pub fn display_name(&self) -> String {
        join_file_name(&self.filename, &self.extension)
    }
}

/// A folder in the project. Children keep insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderNode {
    pub id: NodeId,
    pub name: String,
    pub children: Vec<Node>,
}

impl FolderNode {
    /// Create an empty folder with a fresh id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: NodeId::generate(),
            name: name.into(),
            children: Vec::new(),
        }
    }

    /// Builder-style child append. Does not check sibling names.
    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    /// Find a direct child by its sibling name.
    pub fn child_named(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name() == name)
    }

    /// Whether a sibling other than `except` already uses `name`.
    pub fn name_taken(&self, name: &str, except: Option<&NodeId>) -> bool {
        self.children
            .iter()
            .any(|c| c.name() == name && Some(c.id()) != except)
    }
}

/// A node of the project tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    File(FileNode),
    Folder(FolderNode),
}

impl Node {
    pub fn id(&self) -> &NodeId {
        match self {
            Node::File(f) => &f.id,
            Node::Folder(f) => &f.id,
        }
    }

    /// Sibling name: display name for files, name for folders.
    pub fn name(&self) -> String {
        match self {
            Node::File(f) => f.display_name(),
            Node::Folder(f) => f.name.clone(),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::File(_) => NodeKind::File,
            Node::Folder(_) => NodeKind::Folder,
        }
    }

    pub fn as_file(&self) -> Option<&FileNode> {
        match self {
            Node::File(f) => Some(f),
            Node::Folder(_) => None,
        }
    }

    /// Collect the ids of every file in this subtree (including `self`).
    pub fn file_ids(&self) -> Vec<NodeId> {
        let mut ids = Vec::new();
        Self::collect_file_ids(self, &mut ids);
        ids
    }

    fn collect_file_ids(node: &Node, out: &mut Vec<NodeId>) {
        match node {
            Node::File(f) => out.push(f.id.clone()),
            Node::Folder(folder) => {
                for child in &folder.children {
                    Self::collect_file_ids(child, out);
                }
            }
        }
    }
}

impl From<FileNode> for Node {
    fn from(f: FileNode) -> Self {
        Node::File(f)
    }
}

impl From<FolderNode> for Node {
    fn from(f: FolderNode) -> Self {
        Node::Folder(f)
    }
}

/// Split a display name into `(filename, extension)` at the last dot.
///
/// A leading dot belongs to the filename, so `.gitignore` has no extension.
pub fn split_file_name(name: &str) -> (String, String) {
    match name.rfind('.') {
        Some(idx) if idx > 0 => (name[..idx].to_string(), name[idx + 1..].to_string()),
        _ => (name.to_string(), String::new()),
    }
}

/// Inverse of [`split_file_name`].
pub fn join_file_name(filename: &str, extension: &str) -> String {
    if extension.is_empty() {
        filename.to_string()
    } else {
        format!("{}.{}", filename, extension)
    }
}

/// Reject names that cannot be used as a path segment.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') || name == "." || name == ".." {
        return Err(AppError::InvalidName(name.to_string()));
    }
    Ok(())
}
