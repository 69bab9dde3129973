//! Read operations backed by the entity cache.
//!
//! A [`Query`] ties a cache key to the store call that fills it. It can be
//! used three ways:
//!
//! 1. [`Query::read`] returns the current state right away, starting a fetch
//!    if the key is absent or stale.
//! 2. [`Query::get`] waits for fresh data.
//! 3. As a [`SubscriptionSource`], its stream emits a new [`QueryResult`]
//!    whenever the key changes, so a view never polls.
//!
//! Queries stay inert while the store binding is pending: nothing is fetched
//! and the state is [`QueryState::Idle`] (or whatever is already cached).
//! Once the binding becomes ready, subscribed queries read again on their
//! own.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use futures::StreamExt;
//! use hearth::prelude::*;
//! use hearth::store::memory::InMemoryStore;
//!
//! # async fn demo() {
//! let client = BlogClient::new(Binding::ready(Arc::new(InMemoryStore::new())));
//! let mut posts = client.posts().stream();
//!
//! while let Some(result) = posts.next().await {
//!     if let Some(posts) = result.data() {
//!         println!("{} posts", posts.len());
//!     }
//! }
//! # }
//! ```

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::{self, BoxStream};
use futures::{FutureExt, StreamExt};
use tokio::sync::watch;

use super::cache::{CacheEventKind, EntityCache, FetchStatus, Snapshot};
use super::key::QueryKey;
use crate::error::{Error, Result};
use crate::model::{Post, PostId};
use crate::store::StoreHandle;
use crate::subscription::{SubscriptionId, SubscriptionSource};
use crate::transport::{Acquire, Binding, BindingState};

/// The state of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryState<T> {
    /// Not fetching: the store binding is not ready or the query is disabled.
    Idle,
    /// A fetch is in flight.
    Loading {
        /// Data from before the fetch started, if any.
        previous: Option<T>,
    },
    /// Query succeeded with data.
    Success {
        /// The data returned by the query.
        data: T,
        /// Whether the data is stale and about to be refetched.
        is_stale: bool,
    },
    /// Query failed with an error.
    Error {
        error: Error,
        /// Data from the last successful fetch, if any.
        previous: Option<T>,
    },
}

impl<T> From<Snapshot<T>> for QueryState<T> {
    fn from(snapshot: Snapshot<T>) -> Self {
        match (snapshot.status, snapshot.value) {
            (FetchStatus::Ready, Some(data)) => Self::Success {
                data,
                is_stale: snapshot.is_stale,
            },
            (FetchStatus::Ready | FetchStatus::Loading, previous) => Self::Loading { previous },
            (FetchStatus::Error(error), previous) => Self::Error { error, previous },
        }
    }
}

/// A query result containing the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult<T> {
    /// The current state of the query.
    pub state: QueryState<T>,
}

impl<T> QueryResult<T> {
    /// Returns the best data available: fresh, stale, or left over from
    /// before a refetch or failure.
    pub const fn data(&self) -> Option<&T> {
        match &self.state {
            QueryState::Success { data, .. } => Some(data),
            QueryState::Loading { previous } | QueryState::Error { previous, .. } => {
                previous.as_ref()
            }
            QueryState::Idle => None,
        }
    }

    pub const fn error(&self) -> Option<&Error> {
        match &self.state {
            QueryState::Error { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Returns `true` if the query is not fetching because it is inert.
    pub const fn is_idle(&self) -> bool {
        matches!(self.state, QueryState::Idle)
    }

    /// Returns `true` if the query is currently loading.
    pub const fn is_loading(&self) -> bool {
        matches!(self.state, QueryState::Loading { .. })
    }

    /// Returns `true` if the query succeeded.
    pub const fn is_success(&self) -> bool {
        matches!(self.state, QueryState::Success { .. })
    }

    /// Returns `true` if the query failed.
    pub const fn is_error(&self) -> bool {
        matches!(self.state, QueryState::Error { .. })
    }

    /// Returns `true` if the query data is stale.
    pub const fn is_stale(&self) -> bool {
        matches!(self.state, QueryState::Success { is_stale: true, .. })
    }
}

impl<T> From<QueryState<T>> for QueryResult<T> {
    fn from(state: QueryState<T>) -> Self {
        Self { state }
    }
}

type Fetcher<V> = Arc<dyn Fn(StoreHandle) -> BoxFuture<'static, Result<V>> + Send + Sync>;

/// All posts, in store order.
pub type PostsQuery = Query<Vec<Post>>;

/// One post with its comments.
pub type PostQuery = Query<Post>;

/// A cached read of one [`QueryKey`].
pub struct Query<V> {
    key: QueryKey,
    fetcher: Fetcher<V>,
    enabled: bool,
    binding: Binding,
    cache: Arc<EntityCache>,
}

impl<V> Clone for Query<V> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            fetcher: Arc::clone(&self.fetcher),
            enabled: self.enabled,
            binding: self.binding.clone(),
            cache: Arc::clone(&self.cache),
        }
    }
}

impl Query<Vec<Post>> {
    /// The post listing. No client-side filtering or ordering is applied.
    #[must_use]
    pub fn list_posts(binding: Binding, cache: Arc<EntityCache>) -> Self {
        Self::new(
            QueryKey::AllPosts,
            |store: StoreHandle| async move { store.get_all_posts().await }.boxed(),
            binding,
            cache,
        )
    }
}

impl Query<Post> {
    /// A single post. Fails with [`Error::NotFound`] for unknown ids; an empty
    /// id leaves the query disabled.
    #[must_use]
    pub fn get_post(id: PostId, binding: Binding, cache: Arc<EntityCache>) -> Self {
        let enabled = !id.is_empty();
        let fetch_id = id.clone();
        let query = Self::new(
            QueryKey::Post(id),
            move |store: StoreHandle| {
                let id = fetch_id.clone();
                async move { store.get_post(&id).await }.boxed()
            },
            binding,
            cache,
        );
        Self { enabled, ..query }
    }
}

impl<V> Query<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a query for `key` filled by `fetcher`.
    pub fn new<F>(key: QueryKey, fetcher: F, binding: Binding, cache: Arc<EntityCache>) -> Self
    where
        F: Fn(StoreHandle) -> BoxFuture<'static, Result<V>> + Send + Sync + 'static,
    {
        Self {
            key,
            fetcher: Arc::new(fetcher),
            enabled: true,
            binding,
            cache,
        }
    }

    #[must_use]
    pub const fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Whether the query would fetch right now.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled && self.binding.acquire().is_ready()
    }

    /// Current state, starting a fetch if the key is absent or stale and the
    /// binding is ready.
    #[must_use]
    pub fn read(&self) -> QueryResult<V> {
        if !self.enabled {
            return QueryState::Idle.into();
        }
        match self.binding.acquire() {
            Acquire::Ready(store) => {
                let fetcher = Arc::clone(&self.fetcher);
                let snapshot = self.cache.read(&self.key, move || fetcher(store));
                QueryState::from(snapshot).into()
            }
            Acquire::Pending => self.current(),
            Acquire::Unavailable(reason) => QueryState::Error {
                error: Error::StoreUnavailable(reason),
                previous: self.cached_value(),
            }
            .into(),
        }
    }

    /// Current state without starting a fetch.
    #[must_use]
    pub fn current(&self) -> QueryResult<V> {
        if !self.enabled {
            return QueryState::Idle.into();
        }
        self.cache
            .peek::<V>(&self.key)
            .map_or(QueryState::Idle, QueryState::from)
            .into()
    }

    /// Waits for the binding, then returns fresh data.
    pub async fn get(&self) -> Result<V> {
        if !self.enabled {
            return Err(Error::NotFound(PostId::default()));
        }
        let store = self.binding.wait_ready().await?;
        let fetcher = Arc::clone(&self.fetcher);
        self.cache.fetch(&self.key, move || fetcher(store)).await
    }

    fn cached_value(&self) -> Option<V> {
        self.cache.peek::<V>(&self.key).and_then(|s| s.value)
    }
}

impl<V> SubscriptionSource for Query<V>
where
    V: Clone + Send + Sync + 'static,
{
    type Output = QueryResult<V>;

    fn stream(&self) -> BoxStream<'static, Self::Output> {
        let state = Watch {
            events: self.cache.subscribe_key(&self.key),
            binding: self.binding.subscribe(),
            query: self.clone(),
            phase: Phase::Read,
        };

        stream::unfold(state, |mut state| async move {
            loop {
                match state.phase {
                    Phase::Read => {
                        state.phase = Phase::Watch;
                        let result = state.query.read();
                        return Some((result, state));
                    }
                    Phase::Watch => {
                        tokio::select! {
                            event = state.events.next() => match event {
                                Some(CacheEventKind::Invalidated) => state.phase = Phase::Read,
                                Some(CacheEventKind::Updated) => {
                                    let result = state.query.current();
                                    // Stored stale: it raced an invalidation, so read again.
                                    if result.is_stale() {
                                        state.phase = Phase::Read;
                                    }
                                    return Some((result, state));
                                }
                                None => return None,
                            },
                            changed = state.binding.changed() => {
                                if changed.is_err() {
                                    return None;
                                }
                                state.phase = Phase::Read;
                            }
                        }
                    }
                }
            }
        })
        .boxed()
    }

    fn id(&self) -> SubscriptionId {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        SubscriptionId::of::<Self>(hasher.finish())
    }
}

impl<V> Hash for Query<V> {
    fn hash<H>(&self, hasher: &mut H)
    where
        H: Hasher,
    {
        self.key.hash(hasher);
    }
}

/// Internal state of a query subscription.
struct Watch<V> {
    query: Query<V>,
    events: BoxStream<'static, CacheEventKind>,
    binding: watch::Receiver<BindingState>,
    phase: Phase,
}

#[derive(Clone, Copy)]
enum Phase {
    Read,
    Watch,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryStore;

    fn ready_cache() -> (Binding, Arc<EntityCache>) {
        (
            Binding::ready(Arc::new(InMemoryStore::new())),
            Arc::new(EntityCache::new()),
        )
    }

    #[test]
    fn test_query_state_from_snapshot() {
        let ready = Snapshot {
            status: FetchStatus::Ready,
            value: Some(1),
            version: 1,
            is_stale: true,
        };
        assert_eq!(
            QueryState::from(ready),
            QueryState::Success {
                data: 1,
                is_stale: true
            }
        );

        let loading = Snapshot {
            status: FetchStatus::Loading,
            value: Some(1),
            version: 1,
            is_stale: true,
        };
        assert_eq!(
            QueryState::from(loading),
            QueryState::Loading { previous: Some(1) }
        );

        let failed: Snapshot<i32> = Snapshot {
            status: FetchStatus::Error(Error::RemoteCallFailed("boom".to_string())),
            value: None,
            version: 0,
            is_stale: false,
        };
        assert!(matches!(QueryState::from(failed), QueryState::Error { previous: None, .. }));
    }

    #[test]
    fn test_query_result_predicates() {
        let idle: QueryResult<i32> = QueryState::Idle.into();
        assert!(idle.is_idle());
        assert_eq!(idle.data(), None);

        let loading: QueryResult<i32> = QueryState::Loading { previous: Some(3) }.into();
        assert!(loading.is_loading());
        assert_eq!(loading.data(), Some(&3));

        let success: QueryResult<i32> = QueryState::Success {
            data: 42,
            is_stale: false,
        }
        .into();
        assert!(success.is_success());
        assert!(!success.is_stale());
        assert_eq!(success.data(), Some(&42));

        let error: QueryResult<i32> = QueryState::Error {
            error: Error::NotFound("p1".into()),
            previous: None,
        }
        .into();
        assert!(error.is_error());
        assert!(error.error().is_some_and(Error::is_not_found));
    }

    #[test]
    fn test_query_id_consistency() {
        let (binding, cache) = ready_cache();
        let query1 = Query::get_post("p1".into(), binding.clone(), cache.clone());
        let query2 = Query::get_post("p1".into(), binding.clone(), cache.clone());
        let query3 = Query::get_post("p2".into(), binding.clone(), cache.clone());
        let posts = Query::list_posts(binding, cache);

        assert_eq!(query1.id(), query2.id());
        assert_ne!(query1.id(), query3.id());
        assert_ne!(query1.id(), posts.id());
    }

    #[tokio::test]
    async fn test_empty_post_id_is_inert() {
        let (binding, cache) = ready_cache();
        let query = Query::get_post(PostId::default(), binding, cache.clone());

        assert!(!query.is_enabled());
        assert!(query.read().is_idle());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_get_unknown_post_is_not_found() {
        let (binding, cache) = ready_cache();
        let query = Query::get_post("missing".into(), binding, cache);

        let result = query.get().await;
        assert_eq!(result, Err(Error::NotFound("missing".into())));
        assert!(query.current().is_error());
    }
}
