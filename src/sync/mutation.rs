//! Write operations: call the store, then invalidate.
//!
//! Every mutation follows the same steps:
//!
//! 1. Validate the input locally. Required text fields must be non-blank
//!    after trimming; the trimmed values are what gets sent.
//! 2. Take the store handle. A binding that is not ready fails immediately
//!    with [`Error::StoreUnavailable`].
//! 3. Make exactly one remote call.
//! 4. On success only, invalidate the affected cache keys.
//!
//! Nothing is applied to the cache optimistically, so a failed call leaves
//! the cache exactly as it was and needs no rollback.
//!
//! | Operation        | Invalidates                     |
//! |------------------|---------------------------------|
//! | [`create_post`]  | `AllPosts`                      |
//! | [`update_post`]  | `AllPosts`, `Post(id)`          |
//! | [`delete_post`]  | `AllPosts`, `Post(id)`          |
//! | [`like_post`]    | `AllPosts`, `Post(id)`          |
//! | [`add_comment`]  | `AllPosts`, `Post(post_id)`     |
//!
//! [`create_post`]: Mutations::create_post
//! [`update_post`]: Mutations::update_post
//! [`delete_post`]: Mutations::delete_post
//! [`like_post`]: Mutations::like_post
//! [`add_comment`]: Mutations::add_comment

use std::sync::Arc;

use tracing::{debug, warn};

use super::cache::EntityCache;
use super::key::QueryKey;
use crate::error::{Error, Result};
use crate::model::PostId;
use crate::store::StoreHandle;
use crate::transport::Binding;

/// Returns `value` trimmed, or [`Error::ValidationFailed`] if nothing is left.
fn required(field: &'static str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::ValidationFailed { field });
    }
    Ok(trimmed.to_string())
}

/// Input for [`Mutations::create_post`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub author_name: String,
}

impl NewPost {
    pub fn new(title: impl Into<String>, content: impl Into<String>, author_name: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            author_name: author_name.into(),
        }
    }

    /// Trimmed copy, or the first blank field.
    pub fn validate(&self) -> Result<Self> {
        Ok(Self {
            title: required("title", &self.title)?,
            content: required("content", &self.content)?,
            author_name: required("author_name", &self.author_name)?,
        })
    }
}

/// Input for [`Mutations::update_post`]. Author and owner cannot change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostEdit {
    pub title: String,
    pub content: String,
}

impl PostEdit {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
        }
    }

    pub fn validate(&self) -> Result<Self> {
        Ok(Self {
            title: required("title", &self.title)?,
            content: required("content", &self.content)?,
        })
    }
}

/// Input for [`Mutations::add_comment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub author_name: String,
    pub content: String,
}

impl NewComment {
    pub fn new(author_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            author_name: author_name.into(),
            content: content.into(),
        }
    }

    pub fn validate(&self) -> Result<Self> {
        Ok(Self {
            author_name: required("author_name", &self.author_name)?,
            content: required("content", &self.content)?,
        })
    }
}

/// The state of a mutation, for views that show progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationState<T> {
    /// Mutation is idle (not yet started).
    Idle,
    /// Mutation is in progress.
    Loading,
    /// Mutation succeeded with a result.
    Success(T),
    /// Mutation failed with an error.
    Error(Error),
}

impl<T> MutationState<T> {
    /// Returns the result data if the mutation succeeded, otherwise `None`.
    pub const fn data(&self) -> Option<&T> {
        match self {
            Self::Success(data) => Some(data),
            _ => None,
        }
    }

    pub const fn error(&self) -> Option<&Error> {
        match self {
            Self::Error(e) => Some(e),
            _ => None,
        }
    }

    /// Returns `true` if the mutation is currently loading.
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// Returns `true` if the mutation succeeded.
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns `true` if the mutation failed.
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl<T> Default for MutationState<T> {
    fn default() -> Self {
        Self::Idle
    }
}

impl<T> From<Result<T>> for MutationState<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::Success(data),
            Err(e) => Self::Error(e),
        }
    }
}

/// Runs mutations against the store binding and keeps the cache consistent.
#[derive(Debug, Clone)]
pub struct Mutations {
    binding: Binding,
    cache: Arc<EntityCache>,
}

impl Mutations {
    #[must_use]
    pub const fn new(binding: Binding, cache: Arc<EntityCache>) -> Self {
        Self { binding, cache }
    }

    /// Creates a post and returns its store-assigned id.
    pub async fn create_post(&self, post: &NewPost) -> Result<PostId> {
        let post = post.validate()?;
        self.run("create_post", &[QueryKey::AllPosts], |store| async move {
            store
                .create_post(&post.title, &post.content, &post.author_name)
                .await
        })
        .await
    }

    /// Changes title and content of an existing post.
    pub async fn update_post(&self, id: &PostId, edit: &PostEdit) -> Result<()> {
        let edit = edit.validate()?;
        let target = id.clone();
        self.run("update_post", &QueryKey::affected_by(id), |store| async move {
            store.update_post(&target, &edit.title, &edit.content).await
        })
        .await
    }

    /// Deletes a post and its comments.
    pub async fn delete_post(&self, id: &PostId) -> Result<()> {
        let target = id.clone();
        self.run("delete_post", &QueryKey::affected_by(id), |store| async move {
            store.delete_post(&target).await
        })
        .await
    }

    /// Adds one like.
    pub async fn like_post(&self, id: &PostId) -> Result<()> {
        let target = id.clone();
        self.run("like_post", &QueryKey::affected_by(id), |store| async move {
            store.like_post(&target).await
        })
        .await
    }

    /// Appends a comment to the post's thread.
    pub async fn add_comment(&self, post_id: &PostId, comment: &NewComment) -> Result<()> {
        let comment = comment.validate()?;
        let target = post_id.clone();
        self.run("add_comment", &QueryKey::affected_by(post_id), |store| async move {
            store
                .add_comment(&target, &comment.author_name, &comment.content)
                .await
        })
        .await
    }

    async fn run<O, F, Fut>(&self, name: &'static str, invalidates: &[QueryKey], call: F) -> Result<O>
    where
        F: FnOnce(StoreHandle) -> Fut,
        Fut: Future<Output = Result<O>>,
    {
        let store = self.binding.handle()?;
        match call(store).await {
            Ok(output) => {
                for key in invalidates {
                    self.cache.invalidate(key);
                }
                debug!(mutation = name, "mutation succeeded");
                Ok(output)
            }
            Err(e) => {
                warn!(mutation = name, error = %e, "mutation failed");
                Err(e)
            }
        }
    }
}
