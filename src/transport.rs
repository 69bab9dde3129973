//! The store binding.
//!
//! A [`Binding`] owns the single store handle used by queries and mutations.
//! It is constructed explicitly and passed to its dependents; there is no
//! global instance.
//!
//! # Lifecycle
//!
//! Every connection attempt is a *generation*. [`Binding::connect`] starts
//! generation 1 on the tokio runtime and the binding reports
//! [`Acquire::Pending`] until the connector resolves, then either
//! [`Acquire::Ready`] or [`Acquire::Unavailable`]. The connector runs exactly
//! once per generation. [`Binding::reinitialize`] (for example after the user
//! changes identity) starts a new generation; the result of a superseded
//! attempt is discarded.
//!
//! Nothing here retries. A failed connection stays `Unavailable` until the
//! caller reinitializes.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::store::StoreHandle;

/// Who the binding connects as. Anonymous by default.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Identity(Option<String>);

impl Identity {
    #[must_use]
    pub const fn anonymous() -> Self {
        Self(None)
    }

    #[must_use]
    pub fn named(name: &str) -> Self {
        Self(Some(name.to_string()))
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

/// Builds a store handle for an identity.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, identity: &Identity) -> Result<StoreHandle>;
}

/// A connector that hands out an already constructed store.
pub struct StaticConnector(StoreHandle);

impl StaticConnector {
    #[must_use]
    pub fn new(store: StoreHandle) -> Self {
        Self(store)
    }
}

#[async_trait]
impl Connector for StaticConnector {
    async fn connect(&self, _identity: &Identity) -> Result<StoreHandle> {
        Ok(Arc::clone(&self.0))
    }
}

/// Outcome of asking the binding for its handle.
#[derive(Clone)]
pub enum Acquire {
    /// Connected; calls may be issued.
    Ready(StoreHandle),
    /// Still connecting. Dependents must not issue calls yet.
    Pending,
    /// Connecting failed.
    Unavailable(String),
}

impl Acquire {
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Converts into a handle, failing fast with [`Error::StoreUnavailable`].
    pub fn into_handle(self) -> Result<StoreHandle> {
        match self {
            Self::Ready(handle) => Ok(handle),
            Self::Pending => Err(Error::StoreUnavailable(
                "store binding is still connecting".to_string(),
            )),
            Self::Unavailable(reason) => Err(Error::StoreUnavailable(reason)),
        }
    }
}

impl fmt::Debug for Acquire {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(_) => f.write_str("Ready"),
            Self::Pending => f.write_str("Pending"),
            Self::Unavailable(reason) => f.debug_tuple("Unavailable").field(reason).finish(),
        }
    }
}

/// Value published on the binding's ready signal.
#[derive(Debug, Clone)]
pub struct BindingState {
    generation: u64,
    identity: Identity,
    acquire: Acquire,
}

impl BindingState {
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    #[must_use]
    pub const fn identity(&self) -> &Identity {
        &self.identity
    }

    #[must_use]
    pub const fn acquire(&self) -> &Acquire {
        &self.acquire
    }
}

struct Inner {
    state: watch::Sender<BindingState>,
    connector: Arc<dyn Connector>,
}

/// Explicitly owned handle to the remote store. Cheap to clone.
#[derive(Clone)]
pub struct Binding {
    inner: Arc<Inner>,
}

impl Binding {
    /// Starts connecting through `connector`. Must be called inside a tokio runtime.
    pub fn connect(connector: impl Connector + 'static, identity: Identity) -> Self {
        let (state, _) = watch::channel(BindingState {
            generation: 0,
            identity: identity.clone(),
            acquire: Acquire::Pending,
        });
        let binding = Self {
            inner: Arc::new(Inner {
                state,
                connector: Arc::new(connector),
            }),
        };
        binding.start(identity);
        binding
    }

    /// A binding that is ready from the start with the given store.
    #[must_use]
    pub fn ready(store: StoreHandle) -> Self {
        let (state, _) = watch::channel(BindingState {
            generation: 1,
            identity: Identity::anonymous(),
            acquire: Acquire::Ready(Arc::clone(&store)),
        });
        Self {
            inner: Arc::new(Inner {
                state,
                connector: Arc::new(StaticConnector::new(store)),
            }),
        }
    }

    /// Current state without waiting.
    #[must_use]
    pub fn acquire(&self) -> Acquire {
        self.inner.state.borrow().acquire.clone()
    }

    /// The handle if ready, otherwise [`Error::StoreUnavailable`].
    pub fn handle(&self) -> Result<StoreHandle> {
        self.acquire().into_handle()
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.inner.state.borrow().generation
    }

    #[must_use]
    pub fn identity(&self) -> Identity {
        self.inner.state.borrow().identity.clone()
    }

    /// Ready signal. The receiver sees every generation change and outcome.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<BindingState> {
        self.inner.state.subscribe()
    }

    /// Waits until the current generation leaves `Pending`.
    pub async fn wait_ready(&self) -> Result<StoreHandle> {
        let mut rx = self.subscribe();
        let acquire = rx
            .wait_for(|state| !state.acquire.is_pending())
            .await
            .map_err(|_| Error::StoreUnavailable("store binding was dropped".to_string()))?
            .acquire
            .clone();
        acquire.into_handle()
    }

    /// Starts a new generation connecting as `identity`.
    ///
    /// Dependents observe `Pending` until it resolves. Returns the new
    /// generation number.
    pub fn reinitialize(&self, identity: Identity) -> u64 {
        self.start(identity)
    }

    fn start(&self, identity: Identity) -> u64 {
        let mut generation = 0;
        self.inner.state.send_modify(|state| {
            state.generation += 1;
            state.identity = identity.clone();
            state.acquire = Acquire::Pending;
            generation = state.generation;
        });
        debug!(generation, identity = ?identity.name(), "connecting store binding");

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let outcome = inner.connector.connect(&identity).await;
            inner.state.send_if_modified(move |state| {
                if state.generation != generation {
                    debug!(generation, current = state.generation, "discarding superseded connection");
                    return false;
                }
                state.acquire = match outcome {
                    Ok(handle) => {
                        debug!(generation, "store binding ready");
                        Acquire::Ready(handle)
                    }
                    Err(e) => {
                        warn!(generation, error = %e, "store binding unavailable");
                        Acquire::Unavailable(e.to_string())
                    }
                };
                true
            });
        });

        generation
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("Binding")
            .field("generation", &state.generation)
            .field("acquire", &state.acquire)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    struct Failing;

    #[async_trait]
    impl Connector for Failing {
        async fn connect(&self, _identity: &Identity) -> Result<StoreHandle> {
            Err(Error::RemoteCallFailed("connection refused".to_string()))
        }
    }

    /// Connects only once released, counting attempts.
    struct Gated {
        release: Arc<Notify>,
        attempts: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Connector for Gated {
        async fn connect(&self, _identity: &Identity) -> Result<StoreHandle> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            self.release.notified().await;
            Ok(Arc::new(InMemoryStore::new()))
        }
    }

    #[test]
    fn test_ready_binding_without_runtime() {
        let binding = Binding::ready(Arc::new(InMemoryStore::new()));
        assert!(binding.acquire().is_ready());
        assert!(binding.handle().is_ok());
        assert_eq!(binding.generation(), 1);
    }

    #[tokio::test]
    async fn test_pending_until_connected() {
        let release = Arc::new(Notify::new());
        let attempts = Arc::new(AtomicUsize::new(0));
        let binding = Binding::connect(
            Gated {
                release: release.clone(),
                attempts: attempts.clone(),
            },
            Identity::anonymous(),
        );

        assert!(binding.acquire().is_pending());
        assert!(matches!(binding.handle(), Err(Error::StoreUnavailable(_))));

        release.notify_one();
        binding.wait_ready().await.expect("should connect");
        assert!(binding.acquire().is_ready());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connect_failure_is_unavailable() {
        let binding = Binding::connect(Failing, Identity::anonymous());
        let result = binding.wait_ready().await;

        assert!(matches!(result, Err(Error::StoreUnavailable(ref reason)) if reason.contains("refused")));
        assert!(matches!(binding.acquire(), Acquire::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_reinitialize_switches_identity() {
        let binding = Binding::ready(Arc::new(InMemoryStore::new()));
        let generation = binding.reinitialize(Identity::named("Ana"));

        assert_eq!(generation, 2);
        assert_eq!(binding.identity(), Identity::named("Ana"));
        binding.wait_ready().await.expect("should reconnect");
        assert_eq!(binding.generation(), 2);
    }

    #[tokio::test]
    async fn test_superseded_generation_is_discarded() {
        let release = Arc::new(Notify::new());
        let attempts = Arc::new(AtomicUsize::new(0));
        let binding = Binding::connect(
            Gated {
                release: release.clone(),
                attempts: attempts.clone(),
            },
            Identity::anonymous(),
        );
        while attempts.load(Ordering::SeqCst) < 1 {
            tokio::task::yield_now().await;
        }

        binding.reinitialize(Identity::named("Ben"));
        while attempts.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }

        // Release the first attempt only; the binding must stay pending.
        release.notify_one();
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert!(binding.acquire().is_pending());
        assert_eq!(binding.generation(), 2);

        release.notify_one();
        binding.wait_ready().await.expect("second attempt connects");
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
