use std::time::Duration;

/// Configuration for cache and query behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryConfig {
    /// How long fetched data counts as fresh.
    ///
    /// `None` keeps data fresh until a mutation invalidates it. With a
    /// duration, older entries are refetched on their next read while the
    /// previous value stays visible.
    pub stale_time: Option<Duration>,

    /// How long an idle entry is retained before [`collect_garbage`] drops it.
    ///
    /// [`collect_garbage`]: super::EntityCache::collect_garbage
    pub cache_time: Duration,

    /// Buffer size of the cache change notification channel.
    pub event_capacity: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            stale_time: None,
            cache_time: Duration::from_secs(5 * 60), // 5 minutes
            event_capacity: 100,
        }
    }
}

impl QueryConfig {
    /// Creates a configuration with the given stale and cache times.
    #[must_use]
    pub const fn new(stale_time: Option<Duration>, cache_time: Duration) -> Self {
        Self {
            stale_time,
            cache_time,
            event_capacity: 100,
        }
    }

    #[must_use]
    pub const fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}
