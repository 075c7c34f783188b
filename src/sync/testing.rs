//! Test doubles for the sandbox and persistence contracts.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::gateway::{
    GatewayError, GatewayResult, MemoryGateway, PersistenceGateway, StoredPlayground,
};
use super::sandbox::{
    ReadyNotifier, SandboxBooter, SandboxError, SandboxResult, SandboxRuntime,
};
use crate::tree::format::SerializedNode;
use crate::tree::SerializedTree;

/// Booter that counts boots, optionally sleeping and failing the first few.
#[derive(Clone)]
pub struct CountingBooter {
    boots: Arc<AtomicUsize>,
    delay: Duration,
    fail_first: usize,
    url: Option<String>,
    sandboxes: Arc<Mutex<Vec<RecordingSandbox>>>,
}

impl CountingBooter {
    pub fn new(delay: Duration) -> Self {
        Self {
            boots: Arc::new(AtomicUsize::new(0)),
            delay,
            fail_first: 0,
            url: None,
            sandboxes: Arc::default(),
        }
    }

    pub fn failing_first(n: usize) -> Self {
        Self {
            fail_first: n,
            ..Self::new(Duration::ZERO)
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.url = Some(url.to_string());
        self
    }

    pub fn boots(&self) -> usize {
        self.boots.load(Ordering::SeqCst)
    }

    /// The runtime handed out by the `n`th successful boot.
    pub fn sandbox(&self, n: usize) -> Option<RecordingSandbox> {
        self.sandboxes.lock().get(n).cloned()
    }
}

#[async_trait]
impl SandboxBooter for CountingBooter {
    async fn boot(&self, ready: ReadyNotifier) -> SandboxResult<Arc<dyn SandboxRuntime>> {
        let n = self.boots.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if n < self.fail_first {
            return Err(SandboxError::Boot("wasm unavailable".into()));
        }
        if let Some(url) = &self.url {
            ready.notify(url.clone());
        }
        let sandbox = RecordingSandbox::new();
        self.sandboxes.lock().push(sandbox.clone());
        Ok(Arc::new(sandbox))
    }
}

/// One call received by a [`RecordingSandbox`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SandboxCall {
    Mkdir(String),
    Write(String, String),
}

/// Sandbox that records calls and fails writes to chosen paths.
#[derive(Clone, Default)]
pub struct RecordingSandbox {
    calls: Arc<Mutex<Vec<SandboxCall>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    torn_down: Arc<AtomicBool>,
}

impl RecordingSandbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make writes and mkdirs of `path` fail from now on.
    pub fn fail_on(&self, path: &str) {
        self.failing.lock().insert(path.to_string());
    }

    pub fn recover(&self, path: &str) {
        self.failing.lock().remove(path);
    }

    pub fn calls(&self) -> Vec<SandboxCall> {
        self.calls.lock().clone()
    }

    /// Paths written, in call order.
    pub fn writes(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                SandboxCall::Write(path, _) => Some(path.clone()),
                SandboxCall::Mkdir(_) => None,
            })
            .collect()
    }

    /// Last content written to `path`.
    pub fn content_of(&self, path: &str) -> Option<String> {
        self.calls.lock().iter().rev().find_map(|c| match c {
            SandboxCall::Write(p, content) if p == path => Some(content.clone()),
            _ => None,
        })
    }

    pub fn was_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    fn check(&self, path: &str) -> SandboxResult<()> {
        if self.failing.lock().contains(path) {
            return Err(SandboxError::Io("device busy".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl SandboxRuntime for RecordingSandbox {
    async fn write_file(&self, path: &str, content: &str) -> SandboxResult<()> {
        self.check(path)?;
        self.calls
            .lock()
            .push(SandboxCall::Write(path.to_string(), content.to_string()));
        Ok(())
    }

    async fn mkdir(&self, path: &str, _recursive: bool) -> SandboxResult<()> {
        self.check(path)?;
        self.calls.lock().push(SandboxCall::Mkdir(path.to_string()));
        Ok(())
    }

    async fn teardown(&self) -> SandboxResult<()> {
        self.torn_down.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl SandboxBooter for RecordingSandbox {
    async fn boot(&self, _ready: ReadyNotifier) -> SandboxResult<Arc<dyn SandboxRuntime>> {
        Ok(Arc::new(self.clone()))
    }
}

/// Gateway over a [`MemoryGateway`] with switchable failures and a save
/// counter. Can also echo trees back without ids, like a legacy backend.
#[derive(Clone, Default)]
pub struct FlakyGateway {
    inner: Arc<MemoryGateway>,
    fail_saves: Arc<AtomicBool>,
    strip_ids: Arc<AtomicBool>,
    saves: Arc<AtomicUsize>,
}

impl FlakyGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(self, record: StoredPlayground) -> Self {
        self.inner.insert(record);
        self
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_saves.store(failing, Ordering::SeqCst);
    }

    pub fn set_strip_ids(&self, strip: bool) {
        self.strip_ids.store(strip, Ordering::SeqCst);
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn stored(&self, id: &str) -> Option<SerializedTree> {
        self.inner
            .get(id)
            .and_then(|r| r.content)
            .map(|c| SerializedTree::parse(&c))
    }
}

fn strip_ids(items: &mut [SerializedNode]) {
    for item in items {
        match item {
            SerializedNode::File(file) => file.id = None,
            SerializedNode::Folder(folder) => {
                folder.id = None;
                strip_ids(&mut folder.items);
            }
        }
    }
}

#[async_trait]
impl PersistenceGateway for FlakyGateway {
    async fn load(&self, id: &str) -> GatewayResult<StoredPlayground> {
        self.inner.load(id).await
    }

    async fn save(&self, id: &str, tree: SerializedTree) -> GatewayResult<SerializedTree> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(GatewayError::Rejected("database unavailable".into()));
        }
        let mut stored = self.inner.save(id, tree).await?;
        if self.strip_ids.load(Ordering::SeqCst) {
            stored.id = None;
            strip_ids(&mut stored.items);
        }
        Ok(stored)
    }
}
