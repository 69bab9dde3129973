//! # Hearth - family blog data synchronization
//!
//! Hearth is the client-side data layer of a family blog: authors publish
//! posts, readers like and comment on them. It fetches posts through a
//! local cache, runs mutations against the remote store, and keeps every open
//! view consistent by invalidating exactly the cache keys a mutation
//! affects.
//!
//! ## Architecture
//!
//! From the leaves up:
//!
//! 1. **Store** ([`store::PostStore`]): the remote contract. Ships with an
//!    in-memory backend and, with the `http` feature, a JSON-over-HTTP one.
//! 2. **Binding** ([`transport::Binding`]): the explicitly owned store handle,
//!    with a ready signal. Queries wait for it; mutations fail fast without it.
//! 3. **Cache** ([`sync::EntityCache`]): keyed entries, one in-flight fetch per
//!    key, invalidation that keeps the last value visible.
//! 4. **Queries** ([`sync::Query`]): list posts and get one post, readable on
//!    demand or as a subscription stream.
//! 5. **Mutations** ([`sync::Mutations`]): create, update, delete, like,
//!    comment. Each one validates, calls the store once, then invalidates.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hearth::prelude::*;
//! use hearth::store::memory::InMemoryStore;
//!
//! # async fn demo() -> hearth::Result<()> {
//! let client = BlogClient::new(Binding::ready(Arc::new(InMemoryStore::new())));
//!
//! client
//!     .mutations()
//!     .create_post(&NewPost::new("Trip to the lake", "We had fun", "Ana"))
//!     .await?;
//!
//! let mut posts = client.posts().get().await?;
//! sort_newest_first(&mut posts);
//! for post in &posts {
//!     println!("{} by {} on {}", post.title, post.author_name, post.publication_date.format_date());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! The crate logs through [`tracing`]. Install a subscriber in the
//! application to see cache and binding activity.

pub mod config;
pub mod error;
pub mod model;
pub mod prelude;
pub mod store;
pub mod subscription;
pub mod sync;
pub mod transport;

pub use error::{Error, Result};
