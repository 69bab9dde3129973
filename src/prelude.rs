//! Prelude module for convenient imports.
//!
//! ```
//! use hearth::prelude::*;
//! ```
//!
//! # What's included
//!
//! - [`BlogClient`] - Binding, cache, queries and mutations in one place
//! - [`Query`], [`QueryResult`], [`QueryState`] - Reading posts
//! - [`Mutations`] and its inputs - Changing posts
//! - [`Binding`], [`Identity`] - The store connection
//! - [`SubscriptionSource`] - Streaming query updates
//! - The blog model types

pub use crate::error::{Error, Result};
pub use crate::model::{Comment, Post, PostId, Timestamp, sort_newest_first};
pub use crate::store::{PostStore, StoreHandle};
pub use crate::subscription::SubscriptionSource;
pub use crate::sync::{
    BlogClient, MutationState, Mutations, NewComment, NewPost, PostEdit, Query, QueryKey,
    QueryResult, QueryState,
};
pub use crate::transport::{Acquire, Binding, Identity};
