use tracing::debug;

use crate::tree::{FileNode, NodeId};

/// One open editor tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenBuffer {
    /// Identity of the file in the tree.
    pub file_id: NodeId,
    /// Tab label: the file's display name.
    pub title: String,
    /// Live text in the editor.
    pub content: String,
    /// Text at the last successful save.
    pub original_content: String,
}

impl OpenBuffer {
    fn from_file(file: &FileNode) -> Self {
        Self {
            file_id: file.id.clone(),
            title: file.display_name(),
            content: file.content.clone(),
            original_content: file.content.clone(),
        }
    }

    /// Dirty state is derived, never stored: editing back to the saved text
    /// makes the buffer clean again.
    pub fn has_unsaved_changes(&self) -> bool {
        self.content != self.original_content
    }
}

/// Open buffers in tab order plus the active selection.
///
/// Invariant: `active` is `None` or the id of a buffer in `buffers`.
#[derive(Debug, Default)]
pub struct BufferManager {
    buffers: Vec<OpenBuffer>,
    active: Option<NodeId>,
}

impl BufferManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `file`, reusing its buffer if one exists, and make it active.
    pub fn open_file(&mut self, file: &FileNode) {
        if self.index_of(&file.id).is_none() {
            self.buffers.push(OpenBuffer::from_file(file));
            debug!(file = %file.display_name(), "buffer opened");
        }
        self.active = Some(file.id.clone());
    }

    /// Close a buffer, discarding unsaved edits.
    ///
    /// If it was active, the tab that slides into its position becomes
    /// active, else the one before it. Returns the closed buffer.
    pub fn close_file(&mut self, file_id: &NodeId) -> Option<OpenBuffer> {
        let index = self.index_of(file_id)?;
        let closed = self.buffers.remove(index);
        if self.active.as_ref() == Some(file_id) {
            self.active = self
                .buffers
                .get(index)
                .or_else(|| index.checked_sub(1).and_then(|i| self.buffers.get(i)))
                .map(|b| b.file_id.clone());
        }
        debug!(file = %closed.title, "buffer closed");
        Some(closed)
    }

    pub fn close_all_files(&mut self) {
        self.buffers.clear();
        self.active = None;
    }

    /// Replace the live content of an open buffer. Returns false when the
    /// file is not open.
    pub fn update_file_content(&mut self, file_id: &NodeId, new_content: impl Into<String>) -> bool {
        match self.get_mut(file_id) {
            Some(buffer) => {
                buffer.content = new_content.into();
                true
            }
            None => false,
        }
    }

    /// Select an already open tab. Returns false when the file is not open.
    pub fn set_active(&mut self, file_id: &NodeId) -> bool {
        if self.index_of(file_id).is_some() {
            self.active = Some(file_id.clone());
            true
        } else {
            false
        }
    }

    pub fn active_id(&self) -> Option<&NodeId> {
        self.active.as_ref()
    }

    pub fn active(&self) -> Option<&OpenBuffer> {
        self.active.as_ref().and_then(|id| self.get(id))
    }

    pub fn get(&self, file_id: &NodeId) -> Option<&OpenBuffer> {
        self.buffers.iter().find(|b| b.file_id == *file_id)
    }

    fn get_mut(&mut self, file_id: &NodeId) -> Option<&mut OpenBuffer> {
        self.buffers.iter_mut().find(|b| b.file_id == *file_id)
    }

    fn index_of(&self, file_id: &NodeId) -> Option<usize> {
        self.buffers.iter().position(|b| b.file_id == *file_id)
    }

    pub fn is_open(&self, file_id: &NodeId) -> bool {
        self.index_of(file_id).is_some()
    }

    /// Buffers in tab order.
    pub fn iter(&self) -> impl Iterator<Item = &OpenBuffer> {
        self.buffers.iter()
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn has_unsaved_changes(&self, file_id: &NodeId) -> bool {
        self.get(file_id).is_some_and(OpenBuffer::has_unsaved_changes)
    }

    pub fn any_unsaved(&self) -> bool {
        self.buffers.iter().any(OpenBuffer::has_unsaved_changes)
    }

    /// Ids of dirty buffers, in tab order.
    pub fn dirty_ids(&self) -> Vec<NodeId> {
        self.buffers
            .iter()
            .filter(|b| b.has_unsaved_changes())
            .map(|b| b.file_id.clone())
            .collect()
    }

    /// Update a tab label after its file was renamed.
    pub fn rename(&mut self, file_id: &NodeId, title: impl Into<String>) -> bool {
        match self.get_mut(file_id) {
            Some(buffer) => {
                buffer.title = title.into();
                true
            }
            None => false,
        }
    }

    /// Close every buffer whose file id fails `keep`, fixing up the active
    /// tab the same way [`close_file`](Self::close_file) does. Returns the
    /// closed buffers.
    pub fn retain_files<F>(&mut self, mut keep: F) -> Vec<OpenBuffer>
    where
        F: FnMut(&NodeId) -> bool,
    {
        let doomed: Vec<NodeId> = self
            .buffers
            .iter()
            .filter(|b| !keep(&b.file_id))
            .map(|b| b.file_id.clone())
            .collect();
        doomed
            .iter()
            .filter_map(|id| self.close_file(id))
            .collect()
    }

    /// Record a successful save of `content`. Edits made after the snapshot
    /// was taken stay dirty.
    pub fn mark_saved(&mut self, file_id: &NodeId, content: &str) -> bool {
        match self.get_mut(file_id) {
            Some(buffer) => {
                buffer.original_content = content.to_string();
                true
            }
            None => false,
        }
    }

    /// Header text: `N files open`, plus `• Unsaved changes` when any
    /// buffer is dirty.
    pub fn summary(&self) -> String {
        let mut text = format!("{} files open", self.buffers.len());
        if self.any_unsaved() {
            text.push_str(" • Unsaved changes");
        }
        text
    }
}
