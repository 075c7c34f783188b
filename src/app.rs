use crossterm::event::KeyEvent;
use tracing::debug;

use crate::command::{Command, HELP};
use crate::error::{AppError, Result};
use crate::keymap::{self, KeyAction};
use crate::tree::node::split_file_name;
use crate::tree::{NodeKind, TreePath};
use crate::ui;
use crate::workspace::Workspace;

/// Driver state: one workspace and the quit flag.
pub struct App {
    pub workspace: Workspace,
    pub should_quit: bool,
}

impl App {
    pub fn new(workspace: Workspace) -> Self {
        Self {
            workspace,
            should_quit: false,
        }
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    /// Run one command, returning text to print.
    pub async fn execute(&mut self, command: Command) -> Result<Option<String>> {
        debug!(?command, "execute");
        let ws = &mut self.workspace;
        let output = match command {
            Command::Tree => Some(ui::render_tree(ws)),
            Command::Status => Some(ui::render_status(ws)),
            Command::Open(path) => {
                let id = ws.id_at(&path)?;
                ws.open_file(&id)?;
                None
            }
            Command::Close(path) => {
                let id = ws.id_at(&path)?;
                ws.close_file(&id)?;
                None
            }
            Command::CloseAll => {
                ws.close_all_files();
                None
            }
            Command::Edit { path, text } => {
                let id = ws.id_at(&path)?;
                ws.update_file_content(&id, text)?;
                None
            }
            Command::Append { path, text } => {
                let id = ws.id_at(&path)?;
                let mut content = ws
                    .buffers()
                    .get(&id)
                    .map(|b| b.content.clone())
                    .unwrap_or_default();
                content.push_str(&text);
                ws.update_file_content(&id, content)?;
                None
            }
            Command::Save(Some(path)) => {
                let id = ws.id_at(&path)?;
                ws.save(&id).await?;
                None
            }
            Command::Save(None) => {
                ws.save_active().await?;
                None
            }
            Command::SaveAll => {
                ws.save_all().await;
                None
            }
            Command::AddFile { parent, name } => {
                let (filename, extension) = split_file_name(&name);
                ws.add_file(&parent, &filename, &extension).await?;
                None
            }
            Command::AddFolder { parent, name } => {
                ws.add_folder(&parent, &name).await?;
                None
            }
            Command::Remove(path) => {
                let id = self.node_at(&path, NodeKind::File)?;
                self.workspace.delete_file(&id).await?;
                None
            }
            Command::RemoveDir(path) => {
                let id = self.node_at(&path, NodeKind::Folder)?;
                self.workspace.delete_folder(&id).await?;
                None
            }
            Command::Rename { path, new_name } => {
                self.rename(&path, &new_name).await?;
                None
            }
            Command::Key(chord) => {
                self.handle_key(keymap::parse_chord(&chord)?).await?;
                None
            }
            Command::Url => Some(
                ws.server_url()
                    .unwrap_or_else(|| "Sandbox not ready".to_string()),
            ),
            Command::Help => Some(HELP.to_string()),
            Command::Quit => {
                self.quit();
                None
            }
        };
        Ok(output)
    }

    /// Apply a shortcut. Keys without a binding are ignored.
    pub async fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        match keymap::action_for(&key) {
            Some(KeyAction::Save) => self.workspace.save_active().await,
            Some(KeyAction::SaveAll) => {
                self.workspace.save_all().await;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn node_at(&self, path: &TreePath, kind: NodeKind) -> Result<crate::tree::NodeId> {
        let id = self.workspace.id_at(path)?;
        match self.workspace.tree().find(&id).map(|n| n.kind()) {
            Some(found) if found == kind => Ok(id),
            _ => Err(AppError::Command(format!(
                "{} is not a {}",
                path,
                match kind {
                    NodeKind::File => "file",
                    NodeKind::Folder => "folder",
                }
            ))),
        }
    }

    async fn rename(&mut self, path: &TreePath, new_name: &str) -> Result<()> {
        let id = self.workspace.id_at(path)?;
        match self.workspace.tree().find(&id).map(|n| n.kind()) {
            Some(NodeKind::File) => {
                let (filename, extension) = split_file_name(new_name);
                self.workspace.rename_file(&id, &filename, &extension).await?;
            }
            Some(NodeKind::Folder) => {
                self.workspace.rename_folder(&id, new_name).await?;
            }
            None => return Err(AppError::NodeNotFound(path.to_string())),
        }
        Ok(())
    }
}
