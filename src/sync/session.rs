use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::sandbox::{ReadyState, SandboxBooter, SandboxResult, SandboxRuntime};

type BootFuture = Shared<BoxFuture<'static, SandboxResult<Arc<dyn SandboxRuntime>>>>;

static GLOBAL: OnceCell<Arc<SessionRegistry>> = OnceCell::new();

struct SessionState {
    /// Bumped by every teardown.
    generation: u64,
    /// In-flight or finished boot of the current generation.
    boot: Option<BootFuture>,
}

/// Owner of the one sandbox runtime shared by every workspace view.
///
/// The runtime is booted lazily on first use. Concurrent callers share the
/// same in-flight boot and all observe its result. A failed boot is
/// forgotten so the next call tries again. Dropping a workspace never tears
/// the runtime down; only [`teardown`](Self::teardown) does.
pub struct SessionRegistry {
    booter: Arc<dyn SandboxBooter>,
    state: Mutex<SessionState>,
    ready: Arc<ReadyState>,
}

impl SessionRegistry {
    pub fn new(booter: Arc<dyn SandboxBooter>) -> Self {
        Self {
            booter,
            state: Mutex::new(SessionState {
                generation: 0,
                boot: None,
            }),
            ready: ReadyState::new(),
        }
    }

    /// Install the process-wide registry. Fails, handing the argument back,
    /// if one is already installed; the first registry lives until exit.
    pub fn install_global(
        registry: Arc<SessionRegistry>,
    ) -> Result<Arc<SessionRegistry>, Arc<SessionRegistry>> {
        GLOBAL
            .try_insert(registry)
            .map(Arc::clone)
            .map_err(|(_, rejected)| rejected)
    }

    /// The process-wide registry, if installed.
    pub fn global() -> Option<Arc<SessionRegistry>> {
        GLOBAL.get().cloned()
    }

    /// Return the shared runtime, booting it if needed.
    pub async fn get_or_create_session(&self) -> SandboxResult<Arc<dyn SandboxRuntime>> {
        let (generation, boot) = {
            let mut state = self.state.lock();
            let generation = state.generation;
            let boot = match &state.boot {
                Some(boot) => boot.clone(),
                None => {
                    info!(generation, "booting sandbox");
                    let booter = Arc::clone(&self.booter);
                    let ready = self.ready.notifier();
                    let boot = async move { booter.boot(ready).await }.boxed().shared();
                    state.boot = Some(boot.clone());
                    boot
                }
            };
            (generation, boot)
        };

        let result = boot.clone().await;
        if let Err(err) = &result {
            let mut state = self.state.lock();
            let same_boot = state.boot.as_ref().is_some_and(|b| b.ptr_eq(&boot));
            if state.generation == generation && same_boot {
                warn!(error = %err, "sandbox boot failed");
                state.boot = None;
            }
        }
        result
    }

    /// The runtime, if a boot has already completed successfully.
    pub fn current(&self) -> Option<Arc<dyn SandboxRuntime>> {
        let state = self.state.lock();
        match state.boot.as_ref()?.peek() {
            Some(Ok(runtime)) => Some(Arc::clone(runtime)),
            _ => None,
        }
    }

    /// Tear the runtime down and forget it and its preview URL. The next
    /// [`get_or_create_session`](Self::get_or_create_session) boots anew.
    ///
    /// A boot still in flight is awaited first, so callers keep sharing it
    /// and the runtime it yields is the one torn down.
    pub async fn teardown(&self) -> SandboxResult<()> {
        let boot = loop {
            let pending = {
                let mut state = self.state.lock();
                let in_flight = state.boot.as_ref().filter(|b| b.peek().is_none()).cloned();
                match in_flight {
                    Some(boot) => boot,
                    None => {
                        state.generation += 1;
                        break state.boot.take();
                    }
                }
            };
            debug!("waiting for in-flight boot before teardown");
            let _ = pending.await;
        };
        self.ready.reset();

        let runtime = boot.and_then(|b| b.peek().and_then(|r| r.as_ref().ok().cloned()));
        match runtime {
            Some(runtime) => {
                info!("tearing down sandbox");
                runtime.teardown().await
            }
            None => Ok(()),
        }
    }

    /// Watch the last-known preview URL.
    pub fn subscribe_ready(&self) -> watch::Receiver<Option<String>> {
        self.ready.subscribe()
    }

    pub fn server_url(&self) -> Option<String> {
        self.ready.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::sandbox::SandboxError;
    use crate::sync::testing::{CountingBooter, RecordingSandbox};
    use std::time::Duration;

    #[tokio::test]
    async fn concurrent_callers_share_one_boot() {
        let booter = CountingBooter::new(Duration::from_millis(20));
        let registry = SessionRegistry::new(Arc::new(booter.clone()));

        let (a, b, c) = tokio::join!(
            registry.get_or_create_session(),
            registry.get_or_create_session(),
            registry.get_or_create_session()
        );
        let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());
        assert_eq!(booter.boots(), 1);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&b, &c));
    }

    #[tokio::test]
    async fn later_calls_reuse_instance() {
        let booter = CountingBooter::new(Duration::ZERO);
        let registry = SessionRegistry::new(Arc::new(booter.clone()));
        let first = registry.get_or_create_session().await.unwrap();
        let second = registry.get_or_create_session().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(booter.boots(), 1);
        assert!(registry.current().is_some());
    }

    #[tokio::test]
    async fn failed_boot_is_retried() {
        let booter = CountingBooter::failing_first(1);
        let registry = SessionRegistry::new(Arc::new(booter.clone()));

        let err = registry.get_or_create_session().await.err().unwrap();
        assert!(matches!(err, SandboxError::Boot(_)));
        assert!(registry.current().is_none());

        assert!(registry.get_or_create_session().await.is_ok());
        assert_eq!(booter.boots(), 2);
    }

    #[tokio::test]
    async fn concurrent_waiters_see_same_failure() {
        let booter = CountingBooter::failing_first(1).with_delay(Duration::from_millis(20));
        let registry = SessionRegistry::new(Arc::new(booter.clone()));
        let (a, b) = tokio::join!(
            registry.get_or_create_session(),
            registry.get_or_create_session()
        );
        assert!(a.is_err());
        assert!(b.is_err());
        assert_eq!(booter.boots(), 1);
    }

    #[tokio::test]
    async fn teardown_resets_instance_and_url() {
        let booter = CountingBooter::new(Duration::ZERO).with_url("http://localhost:5173");
        let registry = SessionRegistry::new(Arc::new(booter.clone()));
        let mut rx = registry.subscribe_ready();

        let first = registry.get_or_create_session().await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().as_deref(), Some("http://localhost:5173"));

        registry.teardown().await.unwrap();
        assert_eq!(registry.server_url(), None);
        assert!(registry.current().is_none());

        let second = registry.get_or_create_session().await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(booter.boots(), 2);
    }

    #[tokio::test]
    async fn teardown_waits_for_in_flight_boot() {
        let booter = CountingBooter::new(Duration::from_millis(50));
        let registry = Arc::new(SessionRegistry::new(Arc::new(booter.clone())));

        let first = tokio::spawn({
            let registry = Arc::clone(&registry);
            async move { registry.get_or_create_session().await.map(|_| ()) }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(booter.boots(), 1);

        registry.teardown().await.unwrap();
        assert!(first.await.unwrap().is_ok());
        assert_eq!(booter.boots(), 1);
        assert!(booter.sandbox(0).unwrap().was_torn_down());
        assert!(registry.current().is_none());

        registry.get_or_create_session().await.unwrap();
        assert_eq!(booter.boots(), 2);
        assert!(!booter.sandbox(1).unwrap().was_torn_down());
    }

    #[tokio::test]
    async fn teardown_without_boot_is_noop() {
        let registry = SessionRegistry::new(Arc::new(CountingBooter::new(Duration::ZERO)));
        assert!(registry.teardown().await.is_ok());
    }

    #[tokio::test]
    async fn teardown_calls_runtime_teardown() {
        let sandbox = RecordingSandbox::new();
        let registry = SessionRegistry::new(Arc::new(sandbox.clone()));
        registry.get_or_create_session().await.unwrap();
        registry.teardown().await.unwrap();
        assert!(sandbox.was_torn_down());
    }
}
