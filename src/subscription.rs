//! Subscription sources.
//!
//! A view keeps itself current by consuming a [`SubscriptionSource`] stream:
//! queries emit a new state every time their cache key changes. Dropping the
//! stream unsubscribes. Any fetch it started still completes and populates
//! the cache for later readers.

use std::any::TypeId;

use futures::stream::BoxStream;

/// Identifies a subscription by source type and a hash of its configuration.
///
/// Two sources with the same id produce the same stream, so a view can skip
/// resubscribing when its source set has not changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    type_id: TypeId,
    hash: u64,
}

impl SubscriptionId {
    #[must_use]
    pub fn of<T: 'static>(hash: u64) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            hash,
        }
    }
}

/// A source of values a view can subscribe to.
pub trait SubscriptionSource: Send {
    type Output;

    /// Opens a new stream of values.
    fn stream(&self) -> BoxStream<'static, Self::Output>;

    fn id(&self) -> SubscriptionId;
}
