//! The project tree: node model, structural engine, persisted form and
//! template import.

pub mod engine;
pub mod format;
pub mod import;
pub mod node;
pub mod path;

pub use engine::{FlatItem, ProjectTree, DEFAULT_ROOT_NAME};
pub use format::SerializedTree;
pub use import::{BlankTemplate, DirectoryTemplate, TemplateSource};
pub use node::{FileNode, FolderNode, Node, NodeId, NodeKind};
pub use path::TreePath;
