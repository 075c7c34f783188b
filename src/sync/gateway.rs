//! Load/save contract of the persistence backend, with a file-backed and an
//! in-memory implementation.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::tree::SerializedTree;

/// Result type for gateway operations.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    #[error("playground not found: {0}")]
    NotFound(String),
    #[error("invalid playground id: {0:?}")]
    InvalidId(String),
    #[error("io error: {0}")]
    Io(String),
    #[error("malformed record: {0}")]
    Malformed(String),
    #[error("rejected: {0}")]
    Rejected(String),
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        GatewayError::Io(err.to_string())
    }
}

/// A stored playground record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPlayground {
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// The project tree as a JSON string; `None` until the first save.
    #[serde(default)]
    pub content: Option<String>,
}

impl StoredPlayground {
    /// A record with no saved content yet.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            content: None,
        }
    }
}

#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn load(&self, id: &str) -> GatewayResult<StoredPlayground>;

    /// Store `tree` as the playground's content and return the tree as
    /// stored, which the caller adopts as authoritative.
    async fn save(&self, id: &str, tree: SerializedTree) -> GatewayResult<SerializedTree>;
}

// ── File-backed gateway ─────────────────────────────────────────────────

/// One `<id>.json` record per playground under a store directory.
#[derive(Debug, Clone)]
pub struct JsonFileGateway {
    dir: PathBuf,
}

impl JsonFileGateway {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn record_path(&self, id: &str) -> GatewayResult<PathBuf> {
        if id.is_empty() || id.contains(['/', '\\']) || id.starts_with('.') {
            return Err(GatewayError::InvalidId(id.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", id)))
    }

    async fn read_record(&self, id: &str) -> GatewayResult<StoredPlayground> {
        let path = self.record_path(id)?;
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(GatewayError::NotFound(id.to_string()))
            }
            Err(err) => return Err(err.into()),
        };
        serde_json::from_str(&text).map_err(|e| GatewayError::Malformed(e.to_string()))
    }

    async fn write_record(&self, record: &StoredPlayground) -> GatewayResult<()> {
        let path = self.record_path(&record.id)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let text = serde_json::to_string_pretty(record)
            .map_err(|e| GatewayError::Malformed(e.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, text).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl PersistenceGateway for JsonFileGateway {
    async fn load(&self, id: &str) -> GatewayResult<StoredPlayground> {
        self.read_record(id).await
    }

    async fn save(&self, id: &str, tree: SerializedTree) -> GatewayResult<SerializedTree> {
        let mut record = match self.read_record(id).await {
            Ok(record) => record,
            Err(GatewayError::NotFound(_)) => StoredPlayground::new(id, id),
            Err(err) => return Err(err),
        };
        let json = tree
            .to_json()
            .map_err(|e| GatewayError::Malformed(e.to_string()))?;
        record.content = Some(json);
        self.write_record(&record).await?;
        debug!(id, "playground saved");
        Ok(tree)
    }
}

// ── In-memory gateway ───────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryGateway {
    records: Mutex<HashMap<String, StoredPlayground>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: StoredPlayground) {
        self.records.lock().insert(record.id.clone(), record);
    }

    pub fn get(&self, id: &str) -> Option<StoredPlayground> {
        self.records.lock().get(id).cloned()
    }
}

#[async_trait]
impl PersistenceGateway for MemoryGateway {
    async fn load(&self, id: &str) -> GatewayResult<StoredPlayground> {
        self.get(id)
            .ok_or_else(|| GatewayError::NotFound(id.to_string()))
    }

    async fn save(&self, id: &str, tree: SerializedTree) -> GatewayResult<SerializedTree> {
        let json = tree
            .to_json()
            .map_err(|e| GatewayError::Malformed(e.to_string()))?;
        let mut records = self.records.lock();
        let record = records
            .entry(id.to_string())
            .or_insert_with(|| StoredPlayground::new(id, id));
        record.content = Some(json);
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{FileNode, FolderNode, ProjectTree};
    use tempfile::TempDir;

    fn snapshot() -> SerializedTree {
        let root = FolderNode::new("Root").with_child(FileNode::new("index", "html").with_content("<p>"));
        SerializedTree::from_tree(&ProjectTree::from_root(root))
    }

    #[tokio::test]
    async fn file_gateway_missing_record_is_not_found() {
        let dir = TempDir::new().unwrap();
        let gateway = JsonFileGateway::new(dir.path());
        assert_eq!(
            gateway.load("abc").await.unwrap_err(),
            GatewayError::NotFound("abc".into())
        );
    }

    #[tokio::test]
    async fn file_gateway_save_then_load() {
        let dir = TempDir::new().unwrap();
        let gateway = JsonFileGateway::new(dir.path().join("store"));
        let tree = snapshot();
        let stored = gateway.save("abc", tree.clone()).await.unwrap();
        assert_eq!(stored, tree);

        let record = gateway.load("abc").await.unwrap();
        assert_eq!(record.title, "abc");
        assert_eq!(SerializedTree::parse(&record.content.unwrap()), tree);
    }

    #[tokio::test]
    async fn file_gateway_keeps_title() {
        let dir = TempDir::new().unwrap();
        let gateway = JsonFileGateway::new(dir.path());
        gateway
            .write_record(&StoredPlayground::new("abc", "My React App"))
            .await
            .unwrap();
        gateway.save("abc", snapshot()).await.unwrap();
        assert_eq!(gateway.load("abc").await.unwrap().title, "My React App");
    }

    #[tokio::test]
    async fn file_gateway_rejects_traversal_ids() {
        let dir = TempDir::new().unwrap();
        let gateway = JsonFileGateway::new(dir.path());
        assert!(matches!(
            gateway.load("../etc/passwd").await,
            Err(GatewayError::InvalidId(_))
        ));
        assert!(matches!(
            gateway.save("", snapshot()).await,
            Err(GatewayError::InvalidId(_))
        ));
    }

    #[tokio::test]
    async fn file_gateway_malformed_record() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bad.json"), "{ nope").unwrap();
        let gateway = JsonFileGateway::new(dir.path());
        assert!(matches!(
            gateway.load("bad").await,
            Err(GatewayError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn memory_gateway_round_trip() {
        let gateway = MemoryGateway::new();
        assert!(gateway.load("x").await.is_err());
        gateway.save("x", snapshot()).await.unwrap();
        let record = gateway.load("x").await.unwrap();
        assert!(record.content.is_some());
    }
}
