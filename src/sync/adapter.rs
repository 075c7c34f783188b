use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use super::gateway::{GatewayError, GatewayResult, PersistenceGateway, StoredPlayground};
use super::sandbox::{SandboxError, SandboxResult, SandboxRuntime};
use super::session::SessionRegistry;
use crate::error::AppError;
use crate::tree::{ProjectTree, SerializedTree, TreePath};

/// Outcome of mirroring one file write. The two channels succeed or fail
/// independently and neither is rolled back when the other fails.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub path: TreePath,
    pub sandbox: SandboxResult<()>,
    /// The tree as stored by the gateway.
    pub persistence: GatewayResult<SerializedTree>,
}

impl SyncReport {
    pub fn is_ok(&self) -> bool {
        self.sandbox.is_ok() && self.persistence.is_ok()
    }

    /// Every failure of the report, as user-facing errors.
    pub fn errors(&self) -> Vec<AppError> {
        let mut errors = Vec::new();
        if let Err(err) = &self.sandbox {
            errors.push(sandbox_error(&self.path, err));
        }
        if let Err(err) = &self.persistence {
            errors.push(persistence_error(&self.path, err));
        }
        errors
    }
}

/// Convert a sandbox failure for `path` into a user-facing error.
pub fn sandbox_error(path: &TreePath, err: &SandboxError) -> AppError {
    match err {
        SandboxError::Boot(reason) => AppError::SessionBootFailed(reason.clone()),
        other => AppError::SyncWriteFailed {
            path: path.to_string(),
            reason: other.to_string(),
        },
    }
}

/// Convert a gateway failure while persisting a change at `path`.
pub fn persistence_error(path: &TreePath, err: &GatewayError) -> AppError {
    AppError::PersistenceFailed {
        path: path.to_string(),
        reason: err.to_string(),
    }
}

/// Mirrors tree mutations of one workspace into the sandbox filesystem and
/// the persistence backend.
///
/// With no session registry the sandbox channel is disabled and always
/// reports success.
#[derive(Clone)]
pub struct SyncAdapter {
    workspace_id: String,
    session: Option<Arc<SessionRegistry>>,
    gateway: Arc<dyn PersistenceGateway>,
}

impl SyncAdapter {
    pub fn new(
        workspace_id: impl Into<String>,
        session: Option<Arc<SessionRegistry>>,
        gateway: Arc<dyn PersistenceGateway>,
    ) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            session,
            gateway,
        }
    }

    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    pub fn session(&self) -> Option<&Arc<SessionRegistry>> {
        self.session.as_ref()
    }

    async fn runtime(&self) -> SandboxResult<Option<Arc<dyn SandboxRuntime>>> {
        match &self.session {
            Some(session) => session.get_or_create_session().await.map(Some),
            None => Ok(None),
        }
    }

    pub async fn load(&self) -> GatewayResult<StoredPlayground> {
        self.gateway.load(&self.workspace_id).await
    }

    /// Write `content` at `path` in the sandbox and, independently, submit
    /// `tree` to the gateway.
    pub async fn write_file(
        &self,
        path: &TreePath,
        content: &str,
        tree: SerializedTree,
    ) -> SyncReport {
        let (sandbox, persistence) =
            futures::join!(self.sandbox_write(path, content), self.persist(tree));
        SyncReport {
            path: path.clone(),
            sandbox,
            persistence,
        }
    }

    /// Write several files and persist one tree holding all of them. The
    /// sandbox writes run concurrently; every report shares the single
    /// persistence outcome. Reports come back in input order.
    pub async fn write_batch(
        &self,
        files: &[(TreePath, String)],
        tree: SerializedTree,
    ) -> Vec<SyncReport> {
        let writes = join_all(
            files
                .iter()
                .map(|(path, content)| self.sandbox_write(path, content)),
        );
        let (sandbox, persistence) = futures::join!(writes, self.persist(tree));
        files
            .iter()
            .zip(sandbox)
            .map(|((path, _), sandbox)| SyncReport {
                path: path.clone(),
                sandbox,
                persistence: persistence.clone(),
            })
            .collect()
    }

    /// Sandbox leg of a write: the parent directory is created before the
    /// write starts.
    pub async fn sandbox_write(&self, path: &TreePath, content: &str) -> SandboxResult<()> {
        let Some(runtime) = self.runtime().await? else {
            return Ok(());
        };
        write_with_parent(runtime.as_ref(), path, content).await
    }

    /// Mirror a new folder into the sandbox.
    pub async fn create_dir(&self, path: &TreePath) -> SandboxResult<()> {
        let Some(runtime) = self.runtime().await? else {
            return Ok(());
        };
        runtime.mkdir(&path.to_relative(), true).await
    }

    /// Submit the whole tree to the gateway.
    pub async fn persist(&self, tree: SerializedTree) -> GatewayResult<SerializedTree> {
        let result = self.gateway.save(&self.workspace_id, tree).await;
        match &result {
            Ok(_) => debug!(id = %self.workspace_id, "tree persisted"),
            Err(err) => warn!(id = %self.workspace_id, error = %err, "persist failed"),
        }
        result
    }

    /// Write every folder and file of `tree` into the sandbox. Folders are
    /// created first, parents before children; files are then written
    /// concurrently. Returns the failures.
    pub async fn mount(&self, tree: &ProjectTree) -> Vec<(TreePath, SandboxError)> {
        let runtime = match self.runtime().await {
            Ok(Some(runtime)) => runtime,
            Ok(None) => return Vec::new(),
            Err(err) => return vec![(TreePath::root(), err)],
        };

        let mut failures = Vec::new();
        for folder in tree.folders() {
            if let Err(err) = runtime.mkdir(&folder.to_relative(), true).await {
                failures.push((folder, err));
            }
        }

        let files = tree.files();
        let writes = files.iter().map(|(path, file)| {
            let runtime = Arc::clone(&runtime);
            async move {
                runtime
                    .write_file(&path.to_relative(), &file.content)
                    .await
                    .map_err(|err| (path.clone(), err))
            }
        });
        failures.extend(join_all(writes).await.into_iter().filter_map(|r| r.err()));
        debug!(files = files.len(), failed = failures.len(), "tree mounted");
        failures
    }
}

async fn write_with_parent(
    runtime: &dyn SandboxRuntime,
    path: &TreePath,
    content: &str,
) -> SandboxResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.is_root()) {
        runtime.mkdir(&parent.to_relative(), true).await?;
    }
    runtime.write_file(&path.to_relative(), content).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::testing::{FlakyGateway, RecordingSandbox, SandboxCall};
    use crate::tree::{FileNode, FolderNode};

    fn adapter(sandbox: &RecordingSandbox, gateway: &FlakyGateway) -> SyncAdapter {
        let registry = SessionRegistry::new(Arc::new(sandbox.clone()));
        SyncAdapter::new("pg-1", Some(Arc::new(registry)), Arc::new(gateway.clone()))
    }

    fn path(s: &str) -> TreePath {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn write_creates_parent_first() {
        let sandbox = RecordingSandbox::new();
        let gateway = FlakyGateway::new();
        let report = adapter(&sandbox, &gateway)
            .write_file(&path("src/App.tsx"), "app", SerializedTree::empty())
            .await;
        assert!(report.is_ok());
        assert_eq!(
            sandbox.calls(),
            vec![
                SandboxCall::Mkdir("src".into()),
                SandboxCall::Write("src/App.tsx".into(), "app".into())
            ]
        );
        assert_eq!(gateway.saves(), 1);
    }

    #[tokio::test]
    async fn root_level_write_skips_mkdir() {
        let sandbox = RecordingSandbox::new();
        let gateway = FlakyGateway::new();
        adapter(&sandbox, &gateway)
            .write_file(&path("index.html"), "<p>", SerializedTree::empty())
            .await;
        assert_eq!(
            sandbox.calls(),
            vec![SandboxCall::Write("index.html".into(), "<p>".into())]
        );
    }

    #[tokio::test]
    async fn channels_fail_independently() {
        let sandbox = RecordingSandbox::new();
        let gateway = FlakyGateway::new();
        sandbox.fail_on("src/App.tsx");
        let report = adapter(&sandbox, &gateway)
            .write_file(&path("src/App.tsx"), "x", SerializedTree::empty())
            .await;
        assert!(report.sandbox.is_err());
        assert!(report.persistence.is_ok());
        let errors = report.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("src/App.tsx"));

        sandbox.recover("src/App.tsx");
        gateway.set_failing(true);
        let report = adapter(&sandbox, &gateway)
            .write_file(&path("src/App.tsx"), "x", SerializedTree::empty())
            .await;
        assert!(report.sandbox.is_ok());
        assert!(matches!(
            report.errors().as_slice(),
            [AppError::PersistenceFailed { path, .. }] if path == "src/App.tsx"
        ));
    }

    #[tokio::test]
    async fn disabled_sandbox_only_persists() {
        let gateway = FlakyGateway::new();
        let adapter = SyncAdapter::new("pg-1", None, Arc::new(gateway.clone()));
        let report = adapter
            .write_file(&path("a.ts"), "", SerializedTree::empty())
            .await;
        assert!(report.is_ok());
        assert_eq!(gateway.saves(), 1);
    }

    #[tokio::test]
    async fn mount_creates_folders_then_files() {
        let sandbox = RecordingSandbox::new();
        let gateway = FlakyGateway::new();
        let root = FolderNode::new("Root")
            .with_child(
                FolderNode::new("src")
                    .with_child(FolderNode::new("lib").with_child(FileNode::new("a", "ts"))),
            )
            .with_child(FileNode::new("index", "html"));
        let tree = ProjectTree::from_root(root);
        let failures = adapter(&sandbox, &gateway).mount(&tree).await;
        assert!(failures.is_empty());
        let calls = sandbox.calls();
        assert_eq!(calls[0], SandboxCall::Mkdir("src".into()));
        assert_eq!(calls[1], SandboxCall::Mkdir("src/lib".into()));
        let mut writes = sandbox.writes();
        writes.sort();
        assert_eq!(writes, vec!["index.html", "src/lib/a.ts"]);
    }

    #[tokio::test]
    async fn batch_persists_once_and_reports_each_file() {
        let sandbox = RecordingSandbox::new();
        let gateway = FlakyGateway::new();
        sandbox.fail_on("b.ts");
        let files = vec![
            (path("a.ts"), "a".to_string()),
            (path("b.ts"), "b".to_string()),
        ];
        let reports = adapter(&sandbox, &gateway)
            .write_batch(&files, SerializedTree::empty())
            .await;
        assert_eq!(gateway.saves(), 1);
        assert_eq!(reports.len(), 2);
        assert!(reports[0].is_ok());
        assert!(reports[1].sandbox.is_err());
        assert!(reports[1].persistence.is_ok());
        assert_eq!(sandbox.content_of("a.ts").as_deref(), Some("a"));
    }

    #[test]
    fn boot_failure_maps_to_session_error() {
        let err = sandbox_error(&path("a.ts"), &SandboxError::Boot("no wasm".into()));
        assert!(matches!(err, AppError::SessionBootFailed(_)));
    }
}
