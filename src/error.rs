use thiserror::Error;

/// Workspace-wide result type alias.
pub type Result<T> = std::result::Result<T, AppError>;

/// Workspace error types.
///
/// The `Display` text of every variant is written for people: it is what ends
/// up in the notification shown for a failed operation.
#[derive(Debug, Error)]
pub enum AppError {
    /// A parent path did not resolve to a folder during add/delete/rename.
    #[error("Folder not found: {0}")]
    PathNotFound(String),

    /// A sibling with the same name already exists in the target folder.
    #[error("'{name}' already exists in {parent}")]
    DuplicateName { name: String, parent: String },

    /// The node referenced by identity is not part of the tree.
    #[error("Item not found: {0}")]
    NodeNotFound(String),

    /// A file or folder name that cannot be used (empty, or contains '/').
    #[error("Invalid name: {0:?}")]
    InvalidName(String),

    /// The referenced file has no open buffer.
    #[error("File is not open: {0}")]
    BufferNotOpen(String),

    /// The sandbox filesystem rejected a write or mkdir.
    #[error("Failed to sync {path} to the sandbox: {reason}")]
    SyncWriteFailed { path: String, reason: String },

    /// The persistence gateway rejected a load or save of `path` (a tree
    /// path, or the workspace id for whole-workspace loads).
    #[error("Persistence failed for {path}: {reason}")]
    PersistenceFailed { path: String, reason: String },

    /// The sandbox runtime failed to initialize.
    #[error("Sandbox failed to start: {0}")]
    SessionBootFailed(String),

    /// I/O errors from the local gateway, sandbox or template import.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted document could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration could not be read.
    #[error("Config error: {0}")]
    Config(String),

    /// Invalid path provided by the user.
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// A driver command could not be parsed.
    #[error("Invalid command: {0}")]
    Command(String),
}

impl AppError {
    /// Whether the error came from a structural tree operation.
    ///
    /// Structural errors are detected before any mutation, so the tree is
    /// guaranteed to be unchanged when one is returned.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            AppError::PathNotFound(_)
                | AppError::DuplicateName { .. }
                | AppError::NodeNotFound(_)
                | AppError::InvalidName(_)
        )
    }

    /// Whether the error came from one of the sync channels.
    pub fn is_sync(&self) -> bool {
        matches!(
            self,
            AppError::SyncWriteFailed { .. }
                | AppError::PersistenceFailed { .. }
                | AppError::SessionBootFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::Io(_)));
        assert!(app_err.to_string().contains("file not found"));
    }

    #[test]
    fn duplicate_name_display() {
        let err = AppError::DuplicateName {
            name: "App.tsx".into(),
            parent: "src".into(),
        };
        assert_eq!(err.to_string(), "'App.tsx' already exists in src");
    }

    #[test]
    fn sync_write_failed_names_the_file() {
        let err = AppError::SyncWriteFailed {
            path: "src/index.css".into(),
            reason: "disk full".into(),
        };
        assert_eq!(
            err.to_string(),
            "Failed to sync src/index.css to the sandbox: disk full"
        );
    }

    #[test]
    fn classification() {
        assert!(AppError::PathNotFound("x".into()).is_structural());
        assert!(AppError::NodeNotFound("x".into()).is_structural());
        assert!(!AppError::PathNotFound("x".into()).is_sync());
        assert!(AppError::PersistenceFailed {
            path: "src/App.tsx".into(),
            reason: "down".into()
        }
        .is_sync());
        assert!(AppError::SessionBootFailed("no wasm".into()).is_sync());
        assert!(!AppError::Config("bad".into()).is_structural());
    }

    #[test]
    fn invalid_path_error_display() {
        let err = AppError::InvalidPath("/nonexistent".into());
        assert_eq!(err.to_string(), "Invalid path: /nonexistent");
    }
}
