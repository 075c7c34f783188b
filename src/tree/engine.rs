use std::collections::HashSet;

use tracing::debug;

use super::node::{
    join_file_name, split_file_name, validate_name, FileNode, FolderNode, Node, NodeId, NodeKind,
};
use super::path::TreePath;
use crate::error::{AppError, Result};

/// Name given to the root folder when none is known.
pub const DEFAULT_ROOT_NAME: &str = "Root";

/// Folders shallower than this start expanded in the explorer.
pub const DEFAULT_EXPANDED_DEPTH: usize = 2;

/// A flattened explorer row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatItem {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub path: TreePath,
    pub depth: usize,
    pub is_expanded: bool,
    pub is_last_sibling: bool,
}

/// The project tree: exactly one root folder owning every other node.
///
/// Every structural operation validates completely before it touches the
/// tree, so an `Err` always means the tree is unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectTree {
    root: FolderNode,
}

impl Default for ProjectTree {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT_NAME)
    }
}

impl ProjectTree {
    /// Create a tree with an empty root folder.
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            root: FolderNode::new(root_name),
        }
    }

    pub fn from_root(root: FolderNode) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &FolderNode {
        &self.root
    }

    // ── Lookup ──────────────────────────────────────────────────────────

    /// The folder at `path`, if every segment names a folder.
    pub fn folder_at(&self, path: &TreePath) -> Option<&FolderNode> {
        let mut current = &self.root;
        for segment in path.segments() {
            current = match current.child_named(segment) {
                Some(Node::Folder(folder)) => folder,
                _ => return None,
            };
        }
        Some(current)
    }

    fn folder_at_mut(&mut self, path: &TreePath) -> Option<&mut FolderNode> {
        let mut current = &mut self.root;
        for segment in path.segments() {
            current = current.children.iter_mut().find_map(|c| match c {
                Node::Folder(folder) if folder.name == *segment => Some(folder),
                _ => None,
            })?;
        }
        Some(current)
    }

    fn parent_mut(&mut self, parent: &TreePath) -> Result<&mut FolderNode> {
        self.folder_at_mut(parent)
            .ok_or_else(|| AppError::PathNotFound(parent.to_string()))
    }

    /// Find any non-root node by id.
    pub fn find(&self, id: &NodeId) -> Option<&Node> {
        Self::find_in(&self.root, id)
    }

    fn find_in<'a>(folder: &'a FolderNode, id: &NodeId) -> Option<&'a Node> {
        for child in &folder.children {
            if child.id() == id {
                return Some(child);
            }
            if let Node::Folder(sub) = child {
                if let Some(found) = Self::find_in(sub, id) {
                    return Some(found);
                }
            }
        }
        None
    }

    pub fn find_file(&self, id: &NodeId) -> Option<&FileNode> {
        self.find(id).and_then(Node::as_file)
    }

    fn find_file_mut(&mut self, id: &NodeId) -> Option<&mut FileNode> {
        Self::find_file_mut_in(&mut self.root, id)
    }

    fn find_file_mut_in<'a>(folder: &'a mut FolderNode, id: &NodeId) -> Option<&'a mut FileNode> {
        for child in folder.children.iter_mut() {
            match child {
                Node::File(file) if file.id == *id => return Some(file),
                Node::Folder(sub) => {
                    if let Some(found) = Self::find_file_mut_in(sub, id) {
                        return Some(found);
                    }
                }
                Node::File(_) => {}
            }
        }
        None
    }

    /// The file whose path is exactly `path`.
    pub fn find_file_by_path(&self, path: &TreePath) -> Option<&FileNode> {
        let name = path.name()?;
        let parent = path.parent()?;
        self.folder_at(&parent)?.child_named(name)?.as_file()
    }

    /// Compute the current path of a node by walking down from the root.
    ///
    /// Fails with `NodeNotFound` when the id is no longer reachable, which is
    /// how stale references are detected after a delete or a replacement.
    pub fn resolve_path(&self, id: &NodeId) -> Result<TreePath> {
        if *id == self.root.id {
            return Ok(TreePath::root());
        }
        let mut segments = Vec::new();
        if Self::path_in(&self.root, id, &mut segments) {
            Ok(TreePath::from_segments(segments))
        } else {
            Err(AppError::NodeNotFound(id.to_string()))
        }
    }

    fn path_in(folder: &FolderNode, id: &NodeId, segments: &mut Vec<String>) -> bool {
        for child in &folder.children {
            segments.push(child.name());
            if child.id() == id {
                return true;
            }
            if let Node::Folder(sub) = child {
                if Self::path_in(sub, id, segments) {
                    return true;
                }
            }
            segments.pop();
        }
        false
    }

    /// Every file with its path, depth-first in child order.
    pub fn files(&self) -> Vec<(TreePath, &FileNode)> {
        let mut out = Vec::new();
        Self::collect_files(&self.root, &TreePath::root(), &mut out);
        out
    }

    fn collect_files<'a>(
        folder: &'a FolderNode,
        path: &TreePath,
        out: &mut Vec<(TreePath, &'a FileNode)>,
    ) {
        for child in &folder.children {
            match child {
                Node::File(file) => out.push((path.join(file.display_name()), file)),
                Node::Folder(sub) => Self::collect_files(sub, &path.join(&sub.name), out),
            }
        }
    }

    /// Every non-root folder path, parents before children.
    pub fn folders(&self) -> Vec<TreePath> {
        let mut out = Vec::new();
        Self::collect_folders(&self.root, &TreePath::root(), &mut out);
        out
    }

    fn collect_folders(folder: &FolderNode, path: &TreePath, out: &mut Vec<TreePath>) {
        for child in &folder.children {
            if let Node::Folder(sub) = child {
                let sub_path = path.join(&sub.name);
                out.push(sub_path.clone());
                Self::collect_folders(sub, &sub_path, out);
            }
        }
    }

    /// Ids of every file in the tree.
    pub fn file_ids(&self) -> HashSet<NodeId> {
        self.root
            .children
            .iter()
            .flat_map(Node::file_ids)
            .collect()
    }

    /// Ids of every file inside the node `id` (the node itself if a file).
    pub fn file_ids_under(&self, id: &NodeId) -> Result<Vec<NodeId>> {
        if *id == self.root.id {
            return Ok(self.root.children.iter().flat_map(Node::file_ids).collect());
        }
        self.find(id)
            .map(Node::file_ids)
            .ok_or_else(|| AppError::NodeNotFound(id.to_string()))
    }

    // ── Structural edits ────────────────────────────────────────────────

    /// Append `file` as the last child of the folder at `parent`.
    pub fn add_file(&mut self, file: FileNode, parent: &TreePath) -> Result<TreePath> {
        validate_file_name(&file.filename, &file.extension)?;
        self.insert(Node::File(file), parent)
    }

    /// Append `folder` (with any children it already has) under `parent`.
    pub fn add_folder(&mut self, folder: FolderNode, parent: &TreePath) -> Result<TreePath> {
        validate_name(&folder.name)?;
        self.insert(Node::Folder(folder), parent)
    }

    fn insert(&mut self, node: Node, parent: &TreePath) -> Result<TreePath> {
        let name = node.name();
        let folder = self.parent_mut(parent)?;
        if folder.name_taken(&name, None) {
            return Err(AppError::DuplicateName {
                name,
                parent: parent.to_string(),
            });
        }
        folder.children.push(node);
        let path = parent.join(name);
        debug!(path = %path, "node added");
        Ok(path)
    }

    /// Remove the file `file_id` from the folder at `parent`.
    pub fn delete_file(&mut self, file_id: &NodeId, parent: &TreePath) -> Result<FileNode> {
        match self.remove_child(file_id, NodeKind::File, parent)? {
            Node::File(file) => Ok(file),
            Node::Folder(folder) => Err(AppError::NodeNotFound(folder.id.to_string())),
        }
    }

    /// Remove the folder `folder_id`, with its whole subtree, from `parent`.
    pub fn delete_folder(&mut self, folder_id: &NodeId, parent: &TreePath) -> Result<FolderNode> {
        match self.remove_child(folder_id, NodeKind::Folder, parent)? {
            Node::Folder(folder) => Ok(folder),
            Node::File(file) => Err(AppError::NodeNotFound(file.id.to_string())),
        }
    }

    fn remove_child(&mut self, id: &NodeId, kind: NodeKind, parent: &TreePath) -> Result<Node> {
        let folder = self.parent_mut(parent)?;
        let index = folder
            .children
            .iter()
            .position(|c| c.id() == id && c.kind() == kind)
            .ok_or_else(|| AppError::NodeNotFound(id.to_string()))?;
        let removed = folder.children.remove(index);
        debug!(parent = %parent, name = %removed.name(), "node deleted");
        Ok(removed)
    }

    /// Rename a file in place. Returns the file's new path.
    pub fn rename_file(
        &mut self,
        file_id: &NodeId,
        new_filename: &str,
        new_extension: &str,
        parent: &TreePath,
    ) -> Result<TreePath> {
        validate_file_name(new_filename, new_extension)?;
        let new_name = join_file_name(new_filename, new_extension);
        let folder = self.parent_mut(parent)?;
        if folder.name_taken(&new_name, Some(file_id)) {
            return Err(AppError::DuplicateName {
                name: new_name,
                parent: parent.to_string(),
            });
        }
        let file = folder
            .children
            .iter_mut()
            .find_map(|c| match c {
                Node::File(f) if f.id == *file_id => Some(f),
                _ => None,
            })
            .ok_or_else(|| AppError::NodeNotFound(file_id.to_string()))?;
        file.filename = new_filename.to_string();
        file.extension = new_extension.to_string();
        let path = parent.join(new_name);
        debug!(path = %path, "file renamed");
        Ok(path)
    }

    /// Rename a folder in place. Descendants keep their relative paths, so
    /// only the prefix of their full paths changes. Returns the new path.
    pub fn rename_folder(
        &mut self,
        folder_id: &NodeId,
        new_name: &str,
        parent: &TreePath,
    ) -> Result<TreePath> {
        validate_name(new_name)?;
        let folder = self.parent_mut(parent)?;
        if folder.name_taken(new_name, Some(folder_id)) {
            return Err(AppError::DuplicateName {
                name: new_name.to_string(),
                parent: parent.to_string(),
            });
        }
        let target = folder
            .children
            .iter_mut()
            .find_map(|c| match c {
                Node::Folder(f) if f.id == *folder_id => Some(f),
                _ => None,
            })
            .ok_or_else(|| AppError::NodeNotFound(folder_id.to_string()))?;
        target.name = new_name.to_string();
        let path = parent.join(new_name);
        debug!(path = %path, "folder renamed");
        Ok(path)
    }

    /// Replace the saved content of a file.
    pub fn set_file_content(&mut self, id: &NodeId, content: impl Into<String>) -> Result<()> {
        let file = self
            .find_file_mut(id)
            .ok_or_else(|| AppError::NodeNotFound(id.to_string()))?;
        file.content = content.into();
        Ok(())
    }

    /// Return `name` if it is free under `parent`, otherwise the first free
    /// `stem_copy.ext`, `stem_copy2.ext`, ... variant.
    pub fn unique_file_name(&self, parent: &TreePath, name: &str) -> Result<String> {
        let folder = self
            .folder_at(parent)
            .ok_or_else(|| AppError::PathNotFound(parent.to_string()))?;
        if !folder.name_taken(name, None) {
            return Ok(name.to_string());
        }

        let (stem, ext) = split_file_name(name);
        for i in 1..=1000 {
            let suffix = if i == 1 {
                "_copy".to_string()
            } else {
                format!("_copy{}", i)
            };
            let candidate = join_file_name(&format!("{}{}", stem, suffix), &ext);
            if !folder.name_taken(&candidate, None) {
                return Ok(candidate);
            }
        }

        Err(AppError::DuplicateName {
            name: name.to_string(),
            parent: parent.to_string(),
        })
    }

    // ── Explorer view ───────────────────────────────────────────────────

    /// Flatten the tree into explorer rows, root first.
    ///
    /// With `expand_all` every folder is descended into; otherwise only
    /// folders shallower than [`DEFAULT_EXPANDED_DEPTH`] are.
    pub fn flatten(&self, expand_all: bool) -> Vec<FlatItem> {
        let mut items = Vec::new();
        let root = Node::Folder(self.root.clone());
        Self::flatten_node(&root, &TreePath::root(), 0, true, expand_all, &mut items);
        items
    }

    fn flatten_node(
        node: &Node,
        path: &TreePath,
        depth: usize,
        is_last: bool,
        expand_all: bool,
        items: &mut Vec<FlatItem>,
    ) {
        let is_expanded = match node {
            Node::Folder(_) => expand_all || depth < DEFAULT_EXPANDED_DEPTH,
            Node::File(_) => false,
        };

        items.push(FlatItem {
            id: node.id().clone(),
            name: node.name(),
            kind: node.kind(),
            path: path.clone(),
            depth,
            is_expanded,
            is_last_sibling: is_last,
        });

        if let Node::Folder(folder) = node {
            if is_expanded {
                let count = folder.children.len();
                for (i, child) in folder.children.iter().enumerate() {
                    let child_path = path.join(child.name());
                    Self::flatten_node(
                        child,
                        &child_path,
                        depth + 1,
                        i == count - 1,
                        expand_all,
                        items,
                    );
                }
            }
        }
    }
}

fn validate_file_name(filename: &str, extension: &str) -> Result<()> {
    validate_name(filename)?;
    if extension.contains('/') {
        return Err(AppError::InvalidName(join_file_name(filename, extension)));
    }
    Ok(())
}
