//! The remote post store contract.
//!
//! The store is an external collaborator: the client only relies on the
//! operations below and the errors they report. Wire encoding is up to each
//! backend.
//!
//! - [`memory::InMemoryStore`] keeps everything in process and is what the
//!   tests run against.
//! - [`http::HttpStore`] (feature `http`) talks JSON over HTTP.

#[cfg(feature = "http")]
pub mod http;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Post, PostId};

/// Shared handle to a connected store.
pub type StoreHandle = Arc<dyn PostStore>;

/// Remote operations on posts and comments.
///
/// Every call that names a post fails with [`Error::NotFound`](crate::Error::NotFound)
/// when the id does not resolve. Transport failures are reported as
/// [`Error::RemoteCallFailed`](crate::Error::RemoteCallFailed).
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Creates a post and returns the id the store assigned to it.
    async fn create_post(&self, title: &str, content: &str, author_name: &str) -> Result<PostId>;

    async fn get_post(&self, id: &PostId) -> Result<Post>;

    /// Returns every post, in whatever order the store keeps them.
    async fn get_all_posts(&self) -> Result<Vec<Post>>;

    async fn update_post(&self, id: &PostId, title: &str, content: &str) -> Result<()>;

    /// Removes the post and its comments. Deleting twice fails the second time.
    async fn delete_post(&self, id: &PostId) -> Result<()>;

    /// Increments the like count by exactly one.
    async fn like_post(&self, id: &PostId) -> Result<()>;

    /// Appends a comment stamped with the store's clock.
    async fn add_comment(&self, post_id: &PostId, author_name: &str, content: &str) -> Result<()>;
}
