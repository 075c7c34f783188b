//! Plain-text rendering of the workspace for the line driver.

use std::fmt::Write;

use crate::event::{Event, Notification};
use crate::tree::{FlatItem, NodeKind};
use crate::workspace::Workspace;

/// Box-drawing prefix for a row, derived from its ancestors' positions.
fn build_prefix(item: &FlatItem, items: &[FlatItem], item_index: usize) -> String {
    if item.depth == 0 {
        return String::new();
    }

    let mut parts: Vec<&str> = Vec::new();
    for d in 1..item.depth {
        let mut ancestor_is_last = false;
        for j in (0..item_index).rev() {
            if items[j].depth == d {
                ancestor_is_last = items[j].is_last_sibling;
                break;
            }
            if items[j].depth < d {
                break;
            }
        }
        parts.push(if ancestor_is_last { "    " } else { "│   " });
    }
    parts.push(if item.is_last_sibling { "└── " } else { "├── " });
    parts.concat()
}

/// The explorer view, fully expanded. Open files are marked `*`, unsaved
/// ones `●`.
pub fn render_tree(workspace: &Workspace) -> String {
    let items = workspace.tree().flatten(true);
    let buffers = workspace.buffers();
    let mut out = String::new();

    for (idx, item) in items.iter().enumerate() {
        let suffix = match item.kind {
            NodeKind::Folder if item.depth > 0 => "/",
            _ => "",
        };
        let marker = if buffers.has_unsaved_changes(&item.id) {
            " ●"
        } else if buffers.is_open(&item.id) {
            " *"
        } else {
            ""
        };
        let _ = writeln!(
            out,
            "{}{}{}{}",
            build_prefix(item, &items, idx),
            item.name,
            suffix,
            marker
        );
    }
    out
}

/// Header line and tab strip.
pub fn render_status(workspace: &Workspace) -> String {
    let mut out = format!("{} · {}", workspace.title(), workspace.status());
    let active = workspace.buffers().active_id();
    for buffer in workspace.buffers().iter() {
        let focus = if active == Some(&buffer.file_id) { ">" } else { " " };
        let dirty = if buffer.has_unsaved_changes() { " ●" } else { "" };
        let _ = write!(out, "\n {} {}{}", focus, buffer.title, dirty);
    }
    out
}

/// One line for an event, or `None` for events with nothing to show.
pub fn render_event(event: &Event) -> Option<String> {
    match event {
        Event::Notify(note) => Some(note.to_string()),
        Event::ServerReady(url) => Some(Notification::info(format!("Preview ready at {}", url)).to_string()),
        Event::Saved { .. } => None,
    }
}
