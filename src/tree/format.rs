//! Persisted JSON form of the project tree.
//!
//! ```json
//! { "name": "Root", "items": [
//!     { "folderName": "src", "id": "…", "items": [
//!         { "filename": "App", "fileExtension": "tsx", "content": "…", "id": "…" }
//!     ] }
//! ] }
//! ```
//!
//! Decoding is lenient: a missing or malformed root becomes an empty `Root`
//! folder, and malformed or duplicate items are skipped with a warning.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use super::engine::{ProjectTree, DEFAULT_ROOT_NAME};
use super::node::{join_file_name, validate_name, FileNode, FolderNode, Node, NodeId};
use super::path::TreePath;
use crate::error::Result;

/// Root of a persisted tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct SerializedTree {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<NodeId>,
    pub items: Vec<SerializedNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SerializedNode {
    File(SerializedFile),
    Folder(SerializedFolder),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedFile {
    pub filename: String,
    #[serde(rename = "fileExtension", default)]
    pub file_extension: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SerializedFolder {
    #[serde(rename = "folderName")]
    pub folder_name: String,
    pub items: Vec<SerializedNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<NodeId>,
}

impl SerializedTree {
    /// Snapshot a live tree. Every node carries its id.
    pub fn from_tree(tree: &ProjectTree) -> Self {
        let root = tree.root();
        Self {
            name: root.name.clone(),
            id: Some(root.id.clone()),
            items: root.children.iter().map(SerializedNode::from_node).collect(),
        }
    }

    /// Lenient decode from a JSON string. Invalid JSON yields an empty root.
    pub fn parse(json: &str) -> Self {
        match serde_json::from_str::<Value>(json) {
            Ok(value) => Self::from(value),
            Err(err) => {
                warn!(error = %err, "stored tree is not valid JSON, starting empty");
                Self::empty()
            }
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn empty() -> Self {
        Self {
            name: DEFAULT_ROOT_NAME.to_string(),
            id: None,
            items: Vec::new(),
        }
    }

    /// Build a live tree. Nodes that arrive without an id take the id of the
    /// node at the same path in `previous` (legacy data), or a fresh one.
    pub fn into_tree(self, previous: Option<&ProjectTree>) -> ProjectTree {
        let root_id = self
            .id
            .or_else(|| previous.map(|p| p.root().id.clone()))
            .unwrap_or_else(NodeId::generate);
        let mut root = FolderNode {
            id: root_id,
            name: self.name,
            children: Vec::new(),
        };
        adopt_items(&mut root, self.items, &TreePath::root(), previous);
        ProjectTree::from_root(root)
    }
}

impl From<Value> for SerializedTree {
    fn from(value: Value) -> Self {
        let Value::Object(mut map) = value else {
            warn!("stored tree root is not an object, starting empty");
            return Self::empty();
        };
        let name = map
            .remove("name")
            .or_else(|| map.remove("folderName"))
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| DEFAULT_ROOT_NAME.to_string());
        let id = map.remove("id").and_then(decode_id);
        let items = decode_items(map.remove("items"));
        Self { name, id, items }
    }
}

impl SerializedNode {
    fn from_node(node: &Node) -> Self {
        match node {
            Node::File(file) => SerializedNode::File(SerializedFile {
                filename: file.filename.clone(),
                file_extension: file.extension.clone(),
                content: file.content.clone(),
                id: Some(file.id.clone()),
            }),
            Node::Folder(folder) => SerializedNode::Folder(SerializedFolder {
                folder_name: folder.name.clone(),
                items: folder.children.iter().map(Self::from_node).collect(),
                id: Some(folder.id.clone()),
            }),
        }
    }

    fn decode(value: Value) -> Option<Self> {
        let Value::Object(mut map) = value else {
            return None;
        };
        if let Some(name) = map.get("folderName").and_then(Value::as_str) {
            let folder_name = name.to_string();
            let id = map.remove("id").and_then(decode_id);
            let items = decode_items(map.remove("items"));
            return Some(SerializedNode::Folder(SerializedFolder {
                folder_name,
                items,
                id,
            }));
        }
        serde_json::from_value::<SerializedFile>(Value::Object(map))
            .ok()
            .map(SerializedNode::File)
    }

    fn name(&self) -> String {
        match self {
            SerializedNode::File(f) => join_file_name(&f.filename, &f.file_extension),
            SerializedNode::Folder(f) => f.folder_name.clone(),
        }
    }
}

fn decode_id(value: Value) -> Option<NodeId> {
    match value {
        Value::String(s) if !s.is_empty() => Some(NodeId::from(s)),
        _ => None,
    }
}

fn decode_items(value: Option<Value>) -> Vec<SerializedNode> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };
    items
        .into_iter()
        .filter_map(|item| {
            let decoded = SerializedNode::decode(item);
            if decoded.is_none() {
                warn!("skipping malformed tree item");
            }
            decoded
        })
        .collect()
}

fn adopt_items(
    parent: &mut FolderNode,
    items: Vec<SerializedNode>,
    path: &TreePath,
    previous: Option<&ProjectTree>,
) {
    for item in items {
        let name = item.name();
        if validate_name(&name).is_err() {
            warn!(parent = %path, name = %name, "skipping tree item with invalid name");
            continue;
        }
        if parent.name_taken(&name, None) {
            warn!(parent = %path, name = %name, "skipping duplicate tree item");
            continue;
        }
        let item_path = path.join(&name);
        let node = match item {
            SerializedNode::File(file) => {
                let id = file.id.unwrap_or_else(|| {
                    previous
                        .and_then(|p| p.find_file_by_path(&item_path))
                        .map(|f| f.id.clone())
                        .unwrap_or_else(NodeId::generate)
                });
                Node::File(FileNode {
                    id,
                    filename: file.filename,
                    extension: file.file_extension,
                    content: file.content,
                })
            }
            SerializedNode::Folder(folder) => {
                let id = folder.id.unwrap_or_else(|| {
                    previous
                        .and_then(|p| p.folder_at(&item_path))
                        .map(|f| f.id.clone())
                        .unwrap_or_else(NodeId::generate)
                });
                let mut node = FolderNode {
                    id,
                    name: folder.folder_name,
                    children: Vec::new(),
                };
                adopt_items(&mut node, folder.items, &item_path, previous);
                Node::Folder(node)
            }
        };
        parent.children.push(node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_tree() -> ProjectTree {
        let root = FolderNode::new("Root")
            .with_child(
                FolderNode::new("src")
                    .with_child(FileNode::new("App", "tsx").with_content("app")),
            )
            .with_child(FileNode::new("README", "md"));
        ProjectTree::from_root(root)
    }

    #[test]
    fn snapshot_uses_wire_field_names() {
        let value = serde_json::to_value(SerializedTree::from_tree(&sample_tree())).unwrap();
        assert_eq!(value["name"], "Root");
        assert_eq!(value["items"][0]["folderName"], "src");
        assert_eq!(value["items"][0]["items"][0]["filename"], "App");
        assert_eq!(value["items"][0]["items"][0]["fileExtension"], "tsx");
        assert_eq!(value["items"][0]["items"][0]["content"], "app");
        assert!(value["items"][1]["id"].is_string());
    }

    #[test]
    fn snapshot_then_adopt_keeps_ids() {
        let tree = sample_tree();
        let json = SerializedTree::from_tree(&tree).to_json().unwrap();
        let restored = SerializedTree::parse(&json).into_tree(None);
        assert_eq!(restored, tree);
    }

    #[test]
    fn missing_root_becomes_empty_root() {
        let tree = SerializedTree::from(Value::Null).into_tree(None);
        assert_eq!(tree.root().name, "Root");
        assert!(tree.root().children.is_empty());

        let tree = SerializedTree::parse("not json").into_tree(None);
        assert_eq!(tree.root().name, "Root");
    }

    #[test]
    fn folder_name_alias_on_root() {
        let tree = SerializedTree::from(json!({ "folderName": "app", "items": [] })).into_tree(None);
        assert_eq!(tree.root().name, "app");
    }

    #[test]
    fn malformed_items_are_skipped() {
        let value = json!({
            "name": "Root",
            "items": [
                { "filename": "ok", "fileExtension": "ts", "content": "" },
                { "nonsense": true },
                42,
                { "folderName": "lib", "items": "not an array" }
            ]
        });
        let tree = SerializedTree::from(value).into_tree(None);
        let names: Vec<String> = tree.root().children.iter().map(Node::name).collect();
        assert_eq!(names, vec!["ok.ts", "lib"]);
    }

    #[test]
    fn dot_names_are_skipped() {
        let value = json!({
            "name": "Root",
            "items": [
                { "folderName": "..", "items": [] },
                { "folderName": ".", "items": [] },
                { "filename": ".", "fileExtension": "", "content": "" },
                { "filename": "a/b", "fileExtension": "ts", "content": "" },
                { "filename": ".env", "fileExtension": "", "content": "" }
            ]
        });
        let tree = SerializedTree::from(value).into_tree(None);
        let names: Vec<String> = tree.root().children.iter().map(Node::name).collect();
        assert_eq!(names, vec![".env"]);
    }

    #[test]
    fn duplicate_items_keep_first() {
        let value = json!({
            "name": "Root",
            "items": [
                { "filename": "a", "fileExtension": "ts", "content": "first" },
                { "filename": "a", "fileExtension": "ts", "content": "second" }
            ]
        });
        let tree = SerializedTree::from(value).into_tree(None);
        assert_eq!(tree.root().children.len(), 1);
        assert_eq!(tree.root().children[0].as_file().unwrap().content, "first");
    }

    #[test]
    fn missing_extension_and_content_default_to_empty() {
        let value = json!({ "name": "Root", "items": [ { "filename": "Makefile" } ] });
        let tree = SerializedTree::from(value).into_tree(None);
        let file = tree.root().children[0].as_file().unwrap();
        assert_eq!(file.extension, "");
        assert_eq!(file.content, "");
    }

    #[test]
    fn legacy_items_take_ids_from_previous_tree_by_path() {
        let current = sample_tree();
        let app_id = current.files()[0].1.id.clone();
        let src_id = current.root().children[0].id().clone();

        let legacy = json!({
            "name": "Root",
            "items": [
                { "folderName": "src", "items": [
                    { "filename": "App", "fileExtension": "tsx", "content": "saved" },
                    { "filename": "new", "fileExtension": "ts", "content": "" }
                ] }
            ]
        });
        let adopted = SerializedTree::from(legacy).into_tree(Some(&current));
        assert_eq!(adopted.root().id, current.root().id);
        assert_eq!(adopted.root().children[0].id(), &src_id);
        assert_eq!(adopted.find_file(&app_id).unwrap().content, "saved");
        assert_eq!(adopted.file_ids().len(), 2);
    }
}
