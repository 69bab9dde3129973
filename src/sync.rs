//! Cached queries and invalidating mutations.
//!
//! This module keeps views consistent with the remote store, in the spirit of
//! SWR or TanStack Query.
//!
//! # Features
//!
//! - **Entity cache**: keyed entries with per-key fetch deduplication and
//!   explicit invalidation
//! - **Queries**: list all posts, get one post; readable on demand or as a
//!   subscription stream
//! - **Mutations**: create, update, delete, like, comment; each invalidates
//!   the keys it affects once the store confirms it
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hearth::prelude::*;
//! use hearth::store::memory::InMemoryStore;
//!
//! # async fn demo() -> hearth::Result<()> {
//! let client = BlogClient::new(Binding::ready(Arc::new(InMemoryStore::new())));
//!
//! let id = client
//!     .mutations()
//!     .create_post(&NewPost::new("Trip to the lake", "We had fun", "Ana"))
//!     .await?;
//! client.mutations().like_post(&id).await?;
//!
//! let post = client.post(id).get().await?;
//! assert_eq!(post.likes, 1);
//! # Ok(())
//! # }
//! ```

mod cache;
mod client;
mod config;
mod key;
pub mod mutation;
pub mod query;

pub use cache::{CacheEvent, CacheEventKind, EntityCache, FetchStatus, Snapshot};
pub use client::BlogClient;
pub use config::QueryConfig;
pub use key::QueryKey;
pub use mutation::{MutationState, Mutations, NewComment, NewPost, PostEdit};
pub use query::{PostQuery, PostsQuery, Query, QueryResult, QueryState};
