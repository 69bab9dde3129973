//! In-process store backend.
//!
//! Implements the store-side semantics of [`PostStore`]: sequential ids
//! (`p1`, `p2`, ...), strictly increasing nanosecond timestamps, append-only
//! comments and non-idempotent deletes.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::trace;

use super::PostStore;
use crate::error::{Error, Result};
use crate::model::{Comment, Post, PostId, Timestamp};

#[derive(Debug, Default)]
struct Inner {
    posts: Vec<Post>,
    last_stamp: i64,
}

impl Inner {
    /// Wall-clock nanoseconds, bumped when needed so stamps never repeat.
    fn stamp(&mut self) -> Timestamp {
        let now = Timestamp::now().as_nanos().max(self.last_stamp + 1);
        self.last_stamp = now;
        Timestamp::from_nanos(now)
    }

    fn find_mut(&mut self, id: &PostId) -> Result<&mut Post> {
        self.posts
            .iter_mut()
            .find(|post| &post.id == id)
            .ok_or_else(|| Error::NotFound(id.clone()))
    }
}

/// A [`PostStore`] that keeps posts in memory.
#[derive(Debug)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
    next_id: AtomicU64,
    owner: String,
}

impl InMemoryStore {
    /// Creates an empty store whose posts are owned by an anonymous caller.
    #[must_use]
    pub fn new() -> Self {
        Self::with_owner("anonymous")
    }

    /// Creates an empty store that records `owner` on every created post.
    #[must_use]
    pub fn with_owner(owner: impl Into<String>) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            next_id: AtomicU64::new(1),
            owner: owner.into(),
        }
    }

    /// Number of posts currently stored.
    pub async fn len(&self) -> usize {
        self.inner.read().await.posts.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PostStore for InMemoryStore {
    async fn create_post(&self, title: &str, content: &str, author_name: &str) -> Result<PostId> {
        let id = PostId::new(format!("p{}", self.next_id.fetch_add(1, Ordering::Relaxed)));
        let mut inner = self.inner.write().await;
        let publication_date = inner.stamp();
        inner.posts.push(Post {
            id: id.clone(),
            title: title.to_string(),
            content: content.to_string(),
            owner: self.owner.clone(),
            author_name: author_name.to_string(),
            likes: 0,
            publication_date,
            comments: Vec::new(),
        });
        trace!(%id, "created post");
        Ok(id)
    }

    async fn get_post(&self, id: &PostId) -> Result<Post> {
        let inner = self.inner.read().await;
        inner
            .posts
            .iter()
            .find(|post| &post.id == id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.clone()))
    }

    async fn get_all_posts(&self) -> Result<Vec<Post>> {
        Ok(self.inner.read().await.posts.clone())
    }

    async fn update_post(&self, id: &PostId, title: &str, content: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let post = inner.find_mut(id)?;
        post.title = title.to_string();
        post.content = content.to_string();
        Ok(())
    }

    async fn delete_post(&self, id: &PostId) -> Result<()> {
        let mut inner = self.inner.write().await;
        let index = inner
            .posts
            .iter()
            .position(|post| &post.id == id)
            .ok_or_else(|| Error::NotFound(id.clone()))?;
        inner.posts.remove(index);
        trace!(%id, "deleted post");
        Ok(())
    }

    async fn like_post(&self, id: &PostId) -> Result<()> {
        let mut inner = self.inner.write().await;
        let post = inner.find_mut(id)?;
        post.likes = post.likes.saturating_add(1);
        Ok(())
    }

    async fn add_comment(&self, post_id: &PostId, author_name: &str, content: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let timestamp = inner.stamp();
        let post = inner.find_mut(post_id)?;
        post.comments.push(Comment {
            content: content.to_string(),
            author_name: author_name.to_string(),
            timestamp,
        });
        Ok(())
    }
}
