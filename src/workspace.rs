use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::buffer::{BufferManager, OpenBuffer};
use crate::error::{AppError, Result};
use crate::event::{Event, Notification};
use crate::sync::{persistence_error, sandbox_error, GatewayError, SyncAdapter, SyncReport};
use crate::tree::{
    FileNode, FolderNode, Node, NodeId, ProjectTree, SerializedTree, TemplateSource, TreePath,
};

/// A file [`Workspace::save_all`] could not save.
#[derive(Debug)]
pub struct SaveFailure {
    pub file_id: NodeId,
    /// Path of the file, or its tab title when it no longer resolves.
    pub name: String,
    pub errors: Vec<AppError>,
}

/// Result of [`Workspace::save_all`].
#[derive(Debug, Default)]
pub struct SaveAllReport {
    pub saved: Vec<TreePath>,
    pub failed: Vec<SaveFailure>,
}

impl SaveAllReport {
    pub fn is_ok(&self) -> bool {
        self.failed.is_empty()
    }
}

/// One open playground: its tree, its editor buffers and the channel that
/// mirrors both into the sandbox and the persistence backend.
///
/// Dropping a workspace leaves the shared sandbox session running.
pub struct Workspace {
    id: String,
    title: String,
    tree: ProjectTree,
    buffers: BufferManager,
    sync: SyncAdapter,
    events: mpsc::UnboundedSender<Event>,
}

impl Workspace {
    /// Assemble a workspace around an already loaded tree. No I/O.
    pub fn new(
        title: impl Into<String>,
        tree: ProjectTree,
        sync: SyncAdapter,
        events: mpsc::UnboundedSender<Event>,
    ) -> Self {
        Self {
            id: sync.workspace_id().to_string(),
            title: title.into(),
            tree,
            buffers: BufferManager::new(),
            sync,
            events,
        }
    }

    /// Load the playground from the gateway, falling back to `template`
    /// when it has no saved content yet, then mount the tree into the
    /// sandbox.
    pub async fn open(
        sync: SyncAdapter,
        template: &dyn TemplateSource,
        events: mpsc::UnboundedSender<Event>,
    ) -> Result<Self> {
        let id = sync.workspace_id().to_string();
        let (title, content) = match sync.load().await {
            Ok(record) => (record.title, record.content),
            Err(GatewayError::NotFound(_)) => (id.clone(), None),
            Err(err) => {
                let err = AppError::PersistenceFailed {
                    path: id.clone(),
                    reason: err.to_string(),
                };
                let note = Notification::error(format!("Failed to load playground data: {}", err));
                events.send(Event::Notify(note)).ok();
                return Err(err);
            }
        };

        let (tree, note) = match content {
            Some(json) => (
                SerializedTree::parse(&json).into_tree(None),
                Notification::success("Playground loaded successfully"),
            ),
            None => {
                let tree = template.load().await.map_err(|err| {
                    let note = Notification::error(format!("Failed to load template: {}", err));
                    events.send(Event::Notify(note)).ok();
                    err
                })?;
                (tree, Notification::success("Template loaded successfully"))
            }
        };

        let title = if title.is_empty() { id.clone() } else { title };
        let workspace = Self::new(title, tree, sync, events);
        info!(id = %workspace.id, files = workspace.tree.files().len(), "workspace opened");
        workspace.notify(note);
        workspace.mount().await;
        Ok(workspace)
    }

    /// Write the whole tree into the sandbox, reporting every failure.
    pub async fn mount(&self) {
        for (path, err) in self.sync.mount(&self.tree).await {
            self.report(&sandbox_error(&path, &err));
        }
    }

    // ── Accessors ───────────────────────────────────────────────────────

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn tree(&self) -> &ProjectTree {
        &self.tree
    }

    pub fn buffers(&self) -> &BufferManager {
        &self.buffers
    }

    pub fn active_file(&self) -> Option<&OpenBuffer> {
        self.buffers.active()
    }

    /// `N files open`, plus a marker when anything is unsaved.
    pub fn status(&self) -> String {
        self.buffers.summary()
    }

    pub fn server_url(&self) -> Option<String> {
        self.sync.session().and_then(|s| s.server_url())
    }

    /// Id of the node at `path`; the empty path names the root folder.
    pub fn id_at(&self, path: &TreePath) -> Result<NodeId> {
        let (Some(parent), Some(name)) = (path.parent(), path.name()) else {
            return Ok(self.tree.root().id.clone());
        };
        let found = self
            .tree
            .folder_at(&parent)
            .and_then(|folder| folder.child_named(name))
            .map(|node| node.id().clone())
            .ok_or_else(|| AppError::NodeNotFound(path.to_string()));
        self.reported(found)
    }

    // ── Events ──────────────────────────────────────────────────────────

    fn emit(&self, event: Event) {
        if self.events.send(event).is_err() {
            debug!("event receiver dropped");
        }
    }

    fn notify(&self, note: Notification) {
        self.emit(Event::Notify(note));
    }

    fn report(&self, err: &AppError) {
        if err.is_structural() {
            info!(error = %err, "tree edit rejected");
        } else if err.is_sync() {
            warn!(error = %err, "sync failed");
        } else {
            warn!(error = %err, "workspace operation failed");
        }
        self.notify(Notification::from(err));
    }

    /// Pass `result` through, notifying about an error.
    fn reported<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            self.report(err);
        }
        result
    }

    fn report_sync(&self, report: &SyncReport) {
        for err in report.errors() {
            self.report(&err);
        }
    }

    fn parent_of(&self, id: &NodeId) -> Result<TreePath> {
        self.located(id).map(|(_, parent)| parent)
    }

    /// Path of `id` and of its parent folder. The root has no parent.
    fn located(&self, id: &NodeId) -> Result<(TreePath, TreePath)> {
        let path = self.tree.resolve_path(id)?;
        let parent = path
            .parent()
            .ok_or_else(|| AppError::InvalidPath(TreePath::root().to_string()))?;
        Ok((path, parent))
    }

    /// Persist the tree after a change at `path`.
    async fn persist(&self, path: &TreePath) {
        if let Err(err) = self.sync.persist(SerializedTree::from_tree(&self.tree)).await {
            self.report(&persistence_error(path, &err));
        }
    }

    // ── Structural edits ────────────────────────────────────────────────

    /// Create an empty file under `parent` and mirror it.
    pub async fn add_file(
        &mut self,
        parent: &TreePath,
        filename: &str,
        extension: &str,
    ) -> Result<NodeId> {
        let file = FileNode::new(filename, extension);
        let id = file.id.clone();
        let added = self.tree.add_file(file, parent);
        let path = self.reported(added)?;

        let report = self
            .sync
            .write_file(&path, "", SerializedTree::from_tree(&self.tree))
            .await;
        self.report_sync(&report);
        Ok(id)
    }

    /// Create an empty folder under `parent` and mirror it.
    pub async fn add_folder(&mut self, parent: &TreePath, name: &str) -> Result<NodeId> {
        let folder = FolderNode::new(name);
        let id = folder.id.clone();
        let added = self.tree.add_folder(folder, parent);
        let path = self.reported(added)?;

        let snapshot = SerializedTree::from_tree(&self.tree);
        let (sandbox, persisted) =
            futures::join!(self.sync.create_dir(&path), self.sync.persist(snapshot));
        self.report_sync(&SyncReport {
            path,
            sandbox,
            persistence: persisted,
        });
        Ok(id)
    }

    /// Delete a file and close its buffer. The sandbox copy stays behind.
    pub async fn delete_file(&mut self, file_id: &NodeId) -> Result<()> {
        let result = self.located(file_id).and_then(|(path, parent)| {
            self.tree
                .delete_file(file_id, &parent)
                .map(|removed| (path, removed))
        });
        let (path, removed) = self.reported(result)?;
        self.buffers.close_file(&removed.id);
        self.persist(&path).await;
        Ok(())
    }

    /// Delete a folder with its subtree and close every buffer inside it.
    pub async fn delete_folder(&mut self, folder_id: &NodeId) -> Result<()> {
        let result = self.located(folder_id).and_then(|(path, parent)| {
            self.tree
                .delete_folder(folder_id, &parent)
                .map(|removed| (path, removed))
        });
        let (path, removed) = self.reported(result)?;
        for file_id in Node::Folder(removed).file_ids() {
            self.buffers.close_file(&file_id);
        }
        self.persist(&path).await;
        Ok(())
    }

    /// Rename a file, retitle its tab and write it at its new path.
    pub async fn rename_file(
        &mut self,
        file_id: &NodeId,
        new_filename: &str,
        new_extension: &str,
    ) -> Result<TreePath> {
        let result = self.parent_of(file_id).and_then(|parent| {
            self.tree
                .rename_file(file_id, new_filename, new_extension, &parent)
        });
        let path = self.reported(result)?;
        if let Some(name) = path.name() {
            self.buffers.rename(file_id, name);
        }

        let content = self
            .tree
            .find_file(file_id)
            .map(|f| f.content.clone())
            .unwrap_or_default();
        let report = self
            .sync
            .write_file(&path, &content, SerializedTree::from_tree(&self.tree))
            .await;
        self.report_sync(&report);
        Ok(path)
    }

    /// Rename a folder and write its subtree at the new location. Files
    /// inside keep their ids, so open tabs are unaffected.
    pub async fn rename_folder(&mut self, folder_id: &NodeId, new_name: &str) -> Result<TreePath> {
        let result = self
            .parent_of(folder_id)
            .and_then(|parent| self.tree.rename_folder(folder_id, new_name, &parent));
        let path = self.reported(result)?;

        if let Some(Node::Folder(folder)) = self.tree.find(folder_id) {
            let subtree = ProjectTree::from_root(folder.clone());
            if let Err(err) = self.sync.create_dir(&path).await {
                self.report(&sandbox_error(&path, &err));
            }
            for folder_path in subtree.folders() {
                let full = join_paths(&path, &folder_path);
                if let Err(err) = self.sync.create_dir(&full).await {
                    self.report(&sandbox_error(&full, &err));
                }
            }
            for (file_path, file) in subtree.files() {
                let full = join_paths(&path, &file_path);
                if let Err(err) = self.sync.sandbox_write(&full, &file.content).await {
                    self.report(&sandbox_error(&full, &err));
                }
            }
        }
        self.persist(&path).await;
        Ok(path)
    }

    // ── Buffers ─────────────────────────────────────────────────────────

    /// Open a file in a tab (or focus its existing tab).
    pub fn open_file(&mut self, file_id: &NodeId) -> Result<()> {
        let file = self
            .tree
            .find_file(file_id)
            .ok_or_else(|| AppError::NodeNotFound(file_id.to_string()));
        let file = self.reported(file)?;
        self.buffers.open_file(file);
        Ok(())
    }

    /// Close a tab, discarding unsaved edits.
    pub fn close_file(&mut self, file_id: &NodeId) -> Result<()> {
        match self.buffers.close_file(file_id) {
            Some(_) => Ok(()),
            None => self.reported(Err(AppError::BufferNotOpen(file_id.to_string()))),
        }
    }

    pub fn close_all_files(&mut self) {
        self.buffers.close_all_files();
    }

    pub fn set_active(&mut self, file_id: &NodeId) -> Result<()> {
        if self.buffers.set_active(file_id) {
            Ok(())
        } else {
            self.reported(Err(AppError::BufferNotOpen(file_id.to_string())))
        }
    }

    /// Replace the live text of an open file.
    pub fn update_file_content(&mut self, file_id: &NodeId, content: impl Into<String>) -> Result<()> {
        if self.buffers.update_file_content(file_id, content) {
            Ok(())
        } else {
            self.reported(Err(AppError::BufferNotOpen(file_id.to_string())))
        }
    }

    // ── Saving ──────────────────────────────────────────────────────────

    /// Save one open file: write it to the sandbox and persist the tree.
    ///
    /// Only when both succeed does the buffer become clean and the tree
    /// take the new content; otherwise the buffer stays dirty and the tree
    /// is unchanged. There is no automatic retry.
    pub async fn save(&mut self, file_id: &NodeId) -> Result<()> {
        let prepared = self.prepare_save(file_id);
        let (path, content) = self.reported(prepared)?;

        let mut snapshot = self.tree.clone();
        snapshot.set_file_content(file_id, content.as_str())?;
        let report = self
            .sync
            .write_file(&path, &content, SerializedTree::from_tree(&snapshot))
            .await;

        if let Ok(stored) = &report.persistence {
            if report.sandbox.is_ok() {
                self.adopt(stored.clone());
                self.commit_save(file_id, &path, &content);
                self.notify(Notification::success(format!("Saved {}", path)));
                return Ok(());
            }
        }

        self.report_sync(&report);
        let mut errors = report.errors();
        Err(errors.remove(0))
    }

    /// Save the active file.
    pub async fn save_active(&mut self) -> Result<()> {
        let Some(id) = self.buffers.active_id().cloned() else {
            return self.reported(Err(AppError::BufferNotOpen("no active file".into())));
        };
        self.save(&id).await
    }

    /// Save every dirty buffer. Each file succeeds or fails on its own;
    /// one tree holding all new contents is persisted once.
    pub async fn save_all(&mut self) -> SaveAllReport {
        let mut report = SaveAllReport::default();
        let mut files = Vec::new();
        let mut ids = Vec::new();
        let mut snapshot = self.tree.clone();

        for id in self.buffers.dirty_ids() {
            match self.prepare_save(&id) {
                Ok((path, content)) => {
                    if snapshot.set_file_content(&id, content.as_str()).is_ok() {
                        files.push((path, content));
                        ids.push(id);
                    }
                }
                Err(err) => {
                    self.report(&err);
                    let name = self
                        .buffers
                        .get(&id)
                        .map(|b| b.title.clone())
                        .unwrap_or_else(|| id.to_string());
                    report.failed.push(SaveFailure {
                        file_id: id,
                        name,
                        errors: vec![err],
                    });
                }
            }
        }
        if files.is_empty() {
            if report.is_ok() {
                self.notify(Notification::info("No unsaved changes"));
            }
            return report;
        }

        let previous: HashMap<NodeId, String> = ids
            .iter()
            .filter_map(|id| {
                self.tree
                    .find_file(id)
                    .map(|f| (id.clone(), f.content.clone()))
            })
            .collect();

        let results = self
            .sync
            .write_batch(&files, SerializedTree::from_tree(&snapshot))
            .await;

        if let Some(Ok(stored)) = results.first().map(|r| &r.persistence) {
            self.adopt(stored.clone());
        }
        for ((id, (path, content)), result) in ids.iter().zip(&files).zip(&results) {
            if result.is_ok() {
                self.commit_save(id, path, content);
                report.saved.push(path.clone());
            } else {
                if let Some(old) = previous.get(id) {
                    self.tree.set_file_content(id, old.as_str()).ok();
                }
                self.report_sync(result);
                report.failed.push(SaveFailure {
                    file_id: id.clone(),
                    name: path.to_string(),
                    errors: result.errors(),
                });
            }
        }

        if !report.saved.is_empty() {
            self.notify(Notification::success(format!(
                "Saved {} file{}",
                report.saved.len(),
                if report.saved.len() == 1 { "" } else { "s" }
            )));
        }
        info!(saved = report.saved.len(), failed = report.failed.len(), "save all finished");
        report
    }

    fn prepare_save(&self, file_id: &NodeId) -> Result<(TreePath, String)> {
        let buffer = self
            .buffers
            .get(file_id)
            .ok_or_else(|| AppError::BufferNotOpen(file_id.to_string()))?;
        let path = self.tree.resolve_path(file_id)?;
        Ok((path, buffer.content.clone()))
    }

    fn commit_save(&mut self, file_id: &NodeId, path: &TreePath, content: &str) {
        self.buffers.mark_saved(file_id, content);
        if self.tree.set_file_content(file_id, content).is_err() {
            warn!(path = %path, "saved file missing from stored tree");
        }
        info!(path = %path, "file saved");
        self.emit(Event::Saved {
            file_id: file_id.clone(),
            path: path.clone(),
        });
    }

    /// Replace the tree with the one the gateway stored. Buffers of files
    /// that no longer exist are closed; tab titles follow renames.
    fn adopt(&mut self, stored: SerializedTree) {
        let tree = stored.into_tree(Some(&self.tree));
        let live = tree.file_ids();
        for closed in self.buffers.retain_files(|id| live.contains(id)) {
            self.notify(Notification::info(format!("{} was removed", closed.title)));
        }
        let titles: Vec<(NodeId, String)> = self
            .buffers
            .iter()
            .filter_map(|b| tree.find_file(&b.file_id).map(|f| (b.file_id.clone(), f.display_name())))
            .collect();
        for (id, title) in titles {
            self.buffers.rename(&id, title);
        }
        self.tree = tree;
    }
}

/// `base` followed by every segment of `rest`.
fn join_paths(base: &TreePath, rest: &TreePath) -> TreePath {
    rest.segments()
        .iter()
        .fold(base.clone(), |path, segment| path.join(segment.as_str()))
}
