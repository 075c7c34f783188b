//! Contract of the sandboxed runtime that serves the live preview.
//!
//! The core only ever writes files and creates directories in the sandbox;
//! how the runtime boots or executes code is up to the implementation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;

/// Result type for sandbox operations.
pub type SandboxResult<T> = std::result::Result<T, SandboxError>;

/// Sandbox operation errors. `Clone` so one boot failure can be handed to
/// every caller that was waiting on it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SandboxError {
    #[error("boot failed: {0}")]
    Boot(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid path: {0}")]
    InvalidPath(String),
    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for SandboxError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => SandboxError::NotFound(err.to_string()),
            _ => SandboxError::Io(err.to_string()),
        }
    }
}

/// Filesystem surface of a booted sandbox.
///
/// Paths are `/`-separated and relative to the sandbox's project root.
#[async_trait]
pub trait SandboxRuntime: Send + Sync {
    async fn write_file(&self, path: &str, content: &str) -> SandboxResult<()>;

    async fn mkdir(&self, path: &str, recursive: bool) -> SandboxResult<()>;

    /// Release the runtime. Called only by an explicit session teardown.
    async fn teardown(&self) -> SandboxResult<()> {
        Ok(())
    }
}

/// Starts a sandbox runtime.
#[async_trait]
pub trait SandboxBooter: Send + Sync {
    /// Boot a runtime. The runtime reports its preview URL through `ready`
    /// whenever its dev server comes up.
    async fn boot(&self, ready: ReadyNotifier) -> SandboxResult<Arc<dyn SandboxRuntime>>;
}

/// Last-known preview URL, shared by a session registry and its runtimes.
#[derive(Debug)]
pub(crate) struct ReadyState {
    generation: AtomicU64,
    tx: watch::Sender<Option<String>>,
}

impl ReadyState {
    pub(crate) fn new() -> Arc<Self> {
        let (tx, _rx) = watch::channel(None);
        Arc::new(Self {
            generation: AtomicU64::new(0),
            tx,
        })
    }

    /// A notifier bound to the current boot generation.
    pub(crate) fn notifier(self: &Arc<Self>) -> ReadyNotifier {
        ReadyNotifier {
            generation: self.generation.load(Ordering::SeqCst),
            state: Arc::clone(self),
        }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.tx.subscribe()
    }

    pub(crate) fn current(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    /// Forget the URL and invalidate every notifier handed out so far.
    pub(crate) fn reset(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.tx.send_replace(None);
    }
}

/// Handle a runtime uses to publish its preview URL.
///
/// Only the first URL of a boot is published; notifications from a boot
/// that has since been torn down are dropped.
#[derive(Debug, Clone)]
pub struct ReadyNotifier {
    generation: u64,
    state: Arc<ReadyState>,
}

impl ReadyNotifier {
    /// A notifier not attached to any registry, with its own channel.
    pub fn detached() -> (Self, watch::Receiver<Option<String>>) {
        let state = ReadyState::new();
        let rx = state.subscribe();
        (state.notifier(), rx)
    }

    /// Publish `url`. Returns whether it was accepted.
    pub fn notify(&self, url: impl Into<String>) -> bool {
        if self.state.generation.load(Ordering::SeqCst) != self.generation {
            return false;
        }
        let url = url.into();
        self.state.tx.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(url);
                true
            } else {
                false
            }
        })
    }
}
