// Shared fixtures for the integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use hearth::prelude::*;
use hearth::store::memory::InMemoryStore;
use hearth::transport::Connector;
use tokio::sync::{Notify, watch};
use tokio::time::{Duration, timeout};

/// In-memory store that counts every remote call it receives.
///
/// Reads can be held: a held read takes its snapshot of the store right away
/// but does not answer until [`CountingStore::release_reads`].
pub struct CountingStore {
    inner: InMemoryStore,
    gets: AtomicUsize,
    lists: AtomicUsize,
    writes: AtomicUsize,
    reads_open: watch::Sender<bool>,
}

impl Default for CountingStore {
    fn default() -> Self {
        Self {
            inner: InMemoryStore::new(),
            gets: AtomicUsize::new(0),
            lists: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            reads_open: watch::channel(true).0,
        }
    }
}

impl CountingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn hold_reads(&self) {
        self.reads_open.send_replace(false);
    }

    pub fn release_reads(&self) {
        self.reads_open.send_replace(true);
    }

    async fn answer_read(&self) {
        let mut open = self.reads_open.subscribe();
        let _ = open.wait_for(|open| *open).await;
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn lists(&self) -> usize {
        self.lists.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.gets() + self.lists() + self.writes()
    }

    fn wrote(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PostStore for CountingStore {
    async fn create_post(&self, title: &str, content: &str, author_name: &str) -> Result<PostId> {
        self.wrote();
        self.inner.create_post(title, content, author_name).await
    }

    async fn get_post(&self, id: &PostId) -> Result<Post> {
        let post = self.inner.get_post(id).await;
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.answer_read().await;
        post
    }

    async fn get_all_posts(&self) -> Result<Vec<Post>> {
        let posts = self.inner.get_all_posts().await;
        self.lists.fetch_add(1, Ordering::SeqCst);
        self.answer_read().await;
        posts
    }

    async fn update_post(&self, id: &PostId, title: &str, content: &str) -> Result<()> {
        self.wrote();
        self.inner.update_post(id, title, content).await
    }

    async fn delete_post(&self, id: &PostId) -> Result<()> {
        self.wrote();
        self.inner.delete_post(id).await
    }

    async fn like_post(&self, id: &PostId) -> Result<()> {
        self.wrote();
        self.inner.like_post(id).await
    }

    async fn add_comment(&self, post_id: &PostId, author_name: &str, content: &str) -> Result<()> {
        self.wrote();
        self.inner.add_comment(post_id, author_name, content).await
    }
}

/// Connector that holds the connection until released.
pub struct GatedConnector {
    pub gate: Arc<Notify>,
    store: StoreHandle,
}

impl GatedConnector {
    pub fn new(store: StoreHandle) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        (
            Self {
                gate: Arc::clone(&gate),
                store,
            },
            gate,
        )
    }
}

#[async_trait]
impl Connector for GatedConnector {
    async fn connect(&self, _identity: &Identity) -> Result<StoreHandle> {
        self.gate.notified().await;
        Ok(Arc::clone(&self.store))
    }
}

/// Connector whose every attempt fails.
pub struct RefusingConnector;

#[async_trait]
impl Connector for RefusingConnector {
    async fn connect(&self, _identity: &Identity) -> Result<StoreHandle> {
        Err(Error::RemoteCallFailed("connection refused".to_string()))
    }
}

/// Routes crate logs to the test output. Set `RUST_LOG=hearth=debug` to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A client bound to a fresh counting store.
pub fn counting_client() -> (BlogClient, Arc<CountingStore>) {
    init_tracing();
    let store = CountingStore::new();
    let client = BlogClient::new(Binding::ready(store.clone()));
    (client, store)
}

/// Yields until `done` holds, giving spawned fetches a chance to run.
pub async fn settle(done: impl Fn() -> bool) {
    timeout(Duration::from_secs(1), async {
        while !done() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition reached in time");
}

/// Pulls results until one carries fresh data.
pub async fn next_success<T>(stream: &mut BoxStream<'static, QueryResult<T>>) -> QueryResult<T> {
    timeout(Duration::from_secs(1), async {
        loop {
            match stream.next().await {
                Some(result) if result.is_success() && !result.is_stale() => return result,
                Some(_) => {}
                None => panic!("query stream ended"),
            }
        }
    })
    .await
    .expect("query stream produced no fresh data in time")
}
