use std::sync::Arc;

use super::cache::EntityCache;
use super::config::QueryConfig;
use super::mutation::Mutations;
use super::query::{PostQuery, PostsQuery, Query};
use crate::model::PostId;
use crate::transport::{Binding, Identity};

/// Entry point for views: one binding, one cache, and the queries and
/// mutations built on them.
///
/// Clones share the same binding and cache.
#[derive(Debug, Clone)]
pub struct BlogClient {
    binding: Binding,
    cache: Arc<EntityCache>,
    mutations: Mutations,
}

impl BlogClient {
    #[must_use]
    pub fn new(binding: Binding) -> Self {
        Self::with_config(binding, QueryConfig::default())
    }

    #[must_use]
    pub fn with_config(binding: Binding, config: QueryConfig) -> Self {
        let cache = Arc::new(EntityCache::with_config(config));
        Self {
            mutations: Mutations::new(binding.clone(), Arc::clone(&cache)),
            binding,
            cache,
        }
    }

    /// Connects to the configured HTTP store. Must be called inside a tokio runtime.
    #[cfg(feature = "http")]
    #[must_use]
    pub fn connect(config: &crate::config::ClientConfig) -> Self {
        let identity = config.identity();
        let connector = crate::store::http::HttpConnector::new(config.clone());
        Self::new(Binding::connect(connector, identity))
    }

    #[must_use]
    pub const fn binding(&self) -> &Binding {
        &self.binding
    }

    #[must_use]
    pub const fn cache(&self) -> &Arc<EntityCache> {
        &self.cache
    }

    #[must_use]
    pub const fn mutations(&self) -> &Mutations {
        &self.mutations
    }

    /// The post listing query.
    #[must_use]
    pub fn posts(&self) -> PostsQuery {
        Query::list_posts(self.binding.clone(), Arc::clone(&self.cache))
    }

    /// The query for one post.
    #[must_use]
    pub fn post(&self, id: impl Into<PostId>) -> PostQuery {
        Query::get_post(id.into(), self.binding.clone(), Arc::clone(&self.cache))
    }

    /// Reconnects as `identity` and marks every cached entry stale, since
    /// data fetched under the previous identity may no longer apply.
    /// Returns the new binding generation.
    pub fn reinitialize(&self, identity: Identity) -> u64 {
        let generation = self.binding.reinitialize(identity);
        self.cache.invalidate_all();
        generation
    }
}
