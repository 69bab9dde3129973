//! Keyed entity cache with explicit invalidation.
//!
//! Each [`QueryKey`] maps to one entry holding the last fetched value, a
//! version counter and the fetch status. The cache guarantees at most one
//! fetch in flight per key: concurrent readers share it through a
//! [`Shared`] future and all of them observe the same outcome.
//!
//! Invalidation never drops the value. A stale entry keeps serving its
//! previous value (flagged as stale) while the next read refetches it. If an
//! entry is invalidated while a fetch is already in flight, that fetch is
//! superseded: the next reader starts a new one instead of joining it, and
//! the old result is stored only if nothing newer has landed, and then as
//! stale.
//!
//! Fetches run on spawned tokio tasks, so a reader that goes away does not
//! cancel them. A fetch that never resolves leaves its key loading for good;
//! timeouts belong to the store transport.

use std::any::Any;
use std::sync::Arc;

use dashmap::DashMap;
use futures::FutureExt;
use futures::StreamExt;
use futures::future::{BoxFuture, Shared};
use futures::stream::BoxStream;
use tokio::sync::broadcast;
use tokio::time::{Duration, Instant};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{debug, trace, warn};

use super::config::QueryConfig;
use super::key::QueryKey;
use crate::error::{Error, Result};

type SharedFetch<V> = Shared<BoxFuture<'static, Result<V>>>;

/// Fetch status of a cache entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    /// The last fetch succeeded (or the value was written directly).
    Ready,
    /// A fetch is in flight.
    Loading,
    /// The last fetch failed. The next read retries.
    Error(Error),
}

/// What a reader sees for a key at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot<V> {
    pub status: FetchStatus,
    /// Last known value, kept across invalidation and failed refetches.
    pub value: Option<V>,
    /// Number of values written to this entry so far.
    pub version: u64,
    pub is_stale: bool,
}

impl<V> Snapshot<V> {
    /// Fresh data that can be used without refetching.
    pub const fn is_ready(&self) -> bool {
        matches!(self.status, FetchStatus::Ready) && self.value.is_some() && !self.is_stale
    }

    pub const fn is_loading(&self) -> bool {
        matches!(self.status, FetchStatus::Loading)
    }

    pub const fn error(&self) -> Option<&Error> {
        match &self.status {
            FetchStatus::Error(e) => Some(e),
            _ => None,
        }
    }
}

/// Kind of change announced for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEventKind {
    /// The entry was marked stale; readers should read again.
    Invalidated,
    /// A fetch finished or a value was written.
    Updated,
}

/// Change notification broadcast by [`EntityCache::subscribe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEvent {
    pub key: QueryKey,
    pub kind: CacheEventKind,
}

struct Entry<V> {
    value: Option<V>,
    version: u64,
    /// Bumped by every invalidation.
    generation: u64,
    /// Generation the stored value was fetched under.
    value_generation: Option<u64>,
    stale: bool,
    status: FetchStatus,
    touched: Instant,
    /// The current fetch and the generation it started under.
    inflight: Option<(u64, SharedFetch<V>)>,
}

impl<V: Clone> Entry<V> {
    fn new() -> Self {
        Self {
            value: None,
            version: 0,
            generation: 0,
            value_generation: None,
            stale: false,
            status: FetchStatus::Loading,
            touched: Instant::now(),
            inflight: None,
        }
    }

    fn is_fresh(&self, stale_time: Option<Duration>) -> bool {
        matches!(self.status, FetchStatus::Ready)
            && self.value.is_some()
            && !self.stale
            && stale_time.is_none_or(|limit| self.touched.elapsed() <= limit)
    }

    fn snapshot(&self) -> Snapshot<V> {
        Snapshot {
            status: self.status.clone(),
            value: self.value.clone(),
            version: self.version,
            is_stale: self.stale,
        }
    }
}

/// Type-erased operations on an entry, so keys can be managed without
/// knowing their value type.
trait Slot: Send + Sync {
    fn invalidate(&mut self);
    fn is_expired(&self, cache_time: Duration) -> bool;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<V: Clone + Send + Sync + 'static> Slot for Entry<V> {
    fn invalidate(&mut self) {
        self.generation += 1;
        self.stale = true;
    }

    fn is_expired(&self, cache_time: Duration) -> bool {
        self.inflight.is_none() && self.touched.elapsed() > cache_time
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

enum Lookup<V> {
    Fresh(Snapshot<V>),
    Joined(Snapshot<V>, SharedFetch<V>),
    Started(Snapshot<V>, SharedFetch<V>),
}

/// Client-side store of fetched entities.
///
/// The cache is meant to be shared as `Arc<EntityCache>`; reading methods
/// that may start a fetch take `self: &Arc<Self>` and must run inside a tokio
/// runtime.
pub struct EntityCache {
    entries: DashMap<QueryKey, Box<dyn Slot>>,
    events: broadcast::Sender<CacheEvent>,
    config: QueryConfig,
}

impl EntityCache {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(QueryConfig::default())
    }

    #[must_use]
    pub fn with_config(config: QueryConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            entries: DashMap::new(),
            events,
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Reads `key`, starting a fetch when needed.
    ///
    /// - Fresh entry: returned as is, status [`FetchStatus::Ready`].
    /// - Fetch in flight: status [`FetchStatus::Loading`] with the last known value.
    /// - Absent, stale or failed entry: `fetcher` is called to start a fetch
    ///   and the entry goes to `Loading`.
    ///
    /// `fetcher` is called with the entry locked and must only build the
    /// future, not touch the cache.
    pub fn read<V, F>(self: &Arc<Self>, key: &QueryKey, fetcher: F) -> Snapshot<V>
    where
        V: Clone + Send + Sync + 'static,
        F: FnOnce() -> BoxFuture<'static, Result<V>>,
    {
        match self.lookup(key, fetcher) {
            Lookup::Fresh(snapshot) | Lookup::Joined(snapshot, _) => snapshot,
            Lookup::Started(snapshot, fetch) => {
                tokio::spawn(fetch);
                snapshot
            }
        }
    }

    /// Returns fresh data for `key`, joining or starting its single fetch.
    pub async fn fetch<V, F>(self: &Arc<Self>, key: &QueryKey, fetcher: F) -> Result<V>
    where
        V: Clone + Send + Sync + 'static,
        F: FnOnce() -> BoxFuture<'static, Result<V>>,
    {
        let fetch = match self.lookup(key, fetcher) {
            Lookup::Fresh(snapshot) => {
                if let Some(value) = snapshot.value {
                    return Ok(value);
                }
                return Err(Error::RemoteCallFailed(format!("no value cached for {key}")));
            }
            Lookup::Joined(_, fetch) => fetch,
            Lookup::Started(_, fetch) => {
                tokio::spawn(fetch.clone());
                fetch
            }
        };
        fetch.await
    }

    /// Current snapshot of `key` without starting a fetch.
    #[must_use]
    pub fn peek<V>(&self, key: &QueryKey) -> Option<Snapshot<V>>
    where
        V: Clone + Send + Sync + 'static,
    {
        let slot = self.entries.get(key)?;
        slot.as_any()
            .downcast_ref::<Entry<V>>()
            .map(Entry::snapshot)
    }

    /// Replaces the value of `key` and marks it fresh.
    pub fn write<V>(&self, key: &QueryKey, value: V)
    where
        V: Clone + Send + Sync + 'static,
    {
        {
            let mut slot = self
                .entries
                .entry(key.clone())
                .or_insert_with(|| Box::new(Entry::<V>::new()));
            if !slot.as_any().is::<Entry<V>>() {
                warn!(%key, "replacing cache entry of a different type");
                *slot = Box::new(Entry::<V>::new());
            }
            if let Some(entry) = slot.as_any_mut().downcast_mut::<Entry<V>>() {
                entry.value = Some(value);
                entry.value_generation = Some(entry.generation);
                entry.version += 1;
                entry.stale = false;
                entry.status = FetchStatus::Ready;
                entry.touched = Instant::now();
            }
        }
        trace!(%key, "cache write");
        self.notify(key, CacheEventKind::Updated);
    }

    /// Marks `key` stale, keeping its value. Returns whether an entry existed.
    ///
    /// Subscribers are notified either way so that views waiting on the key
    /// read it again.
    pub fn invalidate(&self, key: &QueryKey) -> bool {
        let found = self
            .entries
            .get_mut(key)
            .map(|mut slot| slot.invalidate())
            .is_some();
        debug!(%key, found, "invalidated cache key");
        self.notify(key, CacheEventKind::Invalidated);
        found
    }

    /// Marks every entry stale.
    pub fn invalidate_all(&self) {
        let keys: Vec<QueryKey> = self
            .entries
            .iter_mut()
            .map(|mut slot| {
                slot.value_mut().invalidate();
                slot.key().clone()
            })
            .collect();
        debug!(count = keys.len(), "invalidated all cache keys");
        for key in &keys {
            self.notify(key, CacheEventKind::Invalidated);
        }
    }

    /// Drops entries untouched for longer than `cache_time` with no fetch in
    /// flight. Returns how many were removed.
    pub fn collect_garbage(&self) -> usize {
        let cache_time = self.config.cache_time;
        let before = self.entries.len();
        self.entries.retain(|_, slot| !slot.is_expired(cache_time));
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, "collected cache entries");
        }
        removed
    }

    #[must_use]
    pub fn contains(&self, key: &QueryKey) -> bool {
        self.entries.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Receives a [`CacheEvent`] for every change to any key.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    /// Change notifications for one key. Dropping the stream unsubscribes.
    ///
    /// If the subscriber falls behind and misses events, an
    /// [`CacheEventKind::Invalidated`] is emitted in their place so the view
    /// reads the key again.
    #[must_use]
    pub fn subscribe_key(&self, key: &QueryKey) -> BoxStream<'static, CacheEventKind> {
        let key = key.clone();
        BroadcastStream::new(self.subscribe())
            .filter_map(move |event| {
                let kind = match event {
                    Ok(event) if event.key == key => Some(event.kind),
                    Ok(_) => None,
                    Err(BroadcastStreamRecvError::Lagged(_)) => Some(CacheEventKind::Invalidated),
                };
                futures::future::ready(kind)
            })
            .boxed()
    }

    fn notify(&self, key: &QueryKey, kind: CacheEventKind) {
        // No receivers is fine.
        let _ = self.events.send(CacheEvent {
            key: key.clone(),
            kind,
        });
    }

    fn lookup<V, F>(self: &Arc<Self>, key: &QueryKey, fetcher: F) -> Lookup<V>
    where
        V: Clone + Send + Sync + 'static,
        F: FnOnce() -> BoxFuture<'static, Result<V>>,
    {
        let mut slot = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| Box::new(Entry::<V>::new()));
        if !slot.as_any().is::<Entry<V>>() {
            warn!(%key, "replacing cache entry of a different type");
            *slot = Box::new(Entry::<V>::new());
        }
        let Some(entry) = slot.as_any_mut().downcast_mut::<Entry<V>>() else {
            return Lookup::Fresh(Snapshot {
                status: FetchStatus::Loading,
                value: None,
                version: 0,
                is_stale: false,
            });
        };

        if entry.is_fresh(self.config.stale_time) {
            return Lookup::Fresh(entry.snapshot());
        }
        if let Some((fetch_generation, fetch)) = &entry.inflight {
            if *fetch_generation == entry.generation {
                trace!(%key, "joining in-flight fetch");
                return Lookup::Joined(entry.snapshot(), fetch.clone());
            }
            debug!(%key, superseded = fetch_generation, "in-flight fetch predates invalidation");
        }

        let generation = entry.generation;
        let cache = Arc::clone(self);
        let fetch_key = key.clone();
        let future = fetcher();
        let fetch = async move {
            let result = future.await;
            cache.complete(&fetch_key, generation, &result);
            result
        }
        .boxed()
        .shared();

        entry.inflight = Some((generation, fetch.clone()));
        entry.status = FetchStatus::Loading;
        debug!(%key, generation, "starting fetch");
        Lookup::Started(entry.snapshot(), fetch)
    }

    fn complete<V>(&self, key: &QueryKey, generation: u64, result: &Result<V>)
    where
        V: Clone + Send + Sync + 'static,
    {
        let applied = self.entries.get_mut(key).is_some_and(|mut slot| {
            let Some(entry) = slot.as_any_mut().downcast_mut::<Entry<V>>() else {
                return false;
            };
            if entry
                .inflight
                .as_ref()
                .is_some_and(|(fetch_generation, _)| *fetch_generation == generation)
            {
                entry.inflight = None;
            }
            // A newer fetch is running or has already landed.
            let superseded = entry.inflight.is_some()
                || entry.value_generation.is_some_and(|landed| landed > generation);
            if superseded {
                debug!(%key, generation, "dropping superseded fetch result");
                return false;
            }
            match result {
                Ok(value) => {
                    entry.value = Some(value.clone());
                    entry.value_generation = Some(generation);
                    entry.version += 1;
                    entry.status = FetchStatus::Ready;
                    entry.stale = entry.generation != generation;
                    entry.touched = Instant::now();
                    debug!(%key, version = entry.version, stale = entry.stale, "fetch completed");
                }
                Err(e) => {
                    entry.status = FetchStatus::Error(e.clone());
                    debug!(%key, error = %e, "fetch failed");
                }
            }
            true
        });
        if applied {
            self.notify(key, CacheEventKind::Updated);
        }
    }
}

impl Default for EntityCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EntityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityCache")
            .field("entries", &self.entries.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
