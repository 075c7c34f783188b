use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::sandbox::{
    ReadyNotifier, SandboxBooter, SandboxError, SandboxResult, SandboxRuntime,
};

/// A sandbox that mirrors the project into a directory on disk.
#[derive(Debug, Clone)]
pub struct LocalDirSandbox {
    root: PathBuf,
}

impl LocalDirSandbox {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a sandbox path onto the mirror directory, refusing anything that
    /// would escape it.
    fn resolve(&self, path: &str) -> SandboxResult<PathBuf> {
        let relative = Path::new(path);
        if path.is_empty() {
            return Err(SandboxError::InvalidPath(path.to_string()));
        }
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => return Err(SandboxError::InvalidPath(path.to_string())),
            }
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl SandboxRuntime for LocalDirSandbox {
    async fn write_file(&self, path: &str, content: &str) -> SandboxResult<()> {
        let target = self.resolve(path)?;
        tokio::fs::write(&target, content).await?;
        debug!(path, bytes = content.len(), "sandbox write");
        Ok(())
    }

    async fn mkdir(&self, path: &str, recursive: bool) -> SandboxResult<()> {
        let target = self.resolve(path)?;
        if recursive {
            tokio::fs::create_dir_all(&target).await?;
        } else {
            match tokio::fs::create_dir(&target).await {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists && target.is_dir() => {}
                Err(err) => return Err(err.into()),
            }
        }
        debug!(path, "sandbox mkdir");
        Ok(())
    }
}

/// Boots a [`LocalDirSandbox`], creating its directory and reporting a
/// `file://` URL as the preview address.
#[derive(Debug, Clone)]
pub struct LocalDirBooter {
    root: PathBuf,
}

impl LocalDirBooter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl SandboxBooter for LocalDirBooter {
    async fn boot(&self, ready: ReadyNotifier) -> SandboxResult<Arc<dyn SandboxRuntime>> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| SandboxError::Boot(format!("{}: {}", self.root.display(), e)))?;
        let root = tokio::fs::canonicalize(&self.root)
            .await
            .unwrap_or_else(|_| self.root.clone());
        info!(root = %root.display(), "local sandbox ready");
        ready.notify(format!("file://{}", root.display()));
        Ok(Arc::new(LocalDirSandbox::new(root)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn write_after_mkdir() {
        let dir = TempDir::new().unwrap();
        let sandbox = LocalDirSandbox::new(dir.path());
        sandbox.mkdir("src/components", true).await.unwrap();
        sandbox
            .write_file("src/components/Button.tsx", "export {}")
            .await
            .unwrap();
        let text = std::fs::read_to_string(dir.path().join("src/components/Button.tsx")).unwrap();
        assert_eq!(text, "export {}");
    }

    #[tokio::test]
    async fn recursive_mkdir_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let sandbox = LocalDirSandbox::new(dir.path());
        sandbox.mkdir("a/b", true).await.unwrap();
        sandbox.mkdir("a/b", true).await.unwrap();
        sandbox.mkdir("a", false).await.unwrap();
        assert!(dir.path().join("a/b").is_dir());
    }

    #[tokio::test]
    async fn write_without_parent_fails() {
        let dir = TempDir::new().unwrap();
        let sandbox = LocalDirSandbox::new(dir.path());
        let err = sandbox.write_file("missing/x.ts", "").await.unwrap_err();
        assert!(matches!(err, SandboxError::NotFound(_)));
    }

    #[tokio::test]
    async fn traversal_is_rejected() {
        let dir = TempDir::new().unwrap();
        let sandbox = LocalDirSandbox::new(dir.path());
        for bad in ["../escape.txt", "/etc/passwd", ""] {
            assert!(matches!(
                sandbox.write_file(bad, "x").await,
                Err(SandboxError::InvalidPath(_))
            ));
        }
    }

    #[tokio::test]
    async fn booter_creates_root_and_reports_url() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("preview");
        let (ready, rx) = ReadyNotifier::detached();
        let runtime = LocalDirBooter::new(&root).boot(ready).await.unwrap();
        assert!(root.is_dir());
        let url = rx.borrow().clone().unwrap();
        assert!(url.starts_with("file://"));
        runtime.write_file("index.html", "<p>").await.unwrap();
        assert!(root.join("index.html").is_file());
    }
}
