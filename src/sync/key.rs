use std::fmt;

use crate::model::PostId;

/// Semantic cache key for a query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    /// The full post listing.
    AllPosts,
    /// A single post by id.
    Post(PostId),
}

impl QueryKey {
    #[must_use]
    pub fn post(id: impl Into<PostId>) -> Self {
        Self::Post(id.into())
    }

    /// Keys a mutation touching `id` has to invalidate.
    #[must_use]
    pub fn affected_by(id: &PostId) -> [Self; 2] {
        [Self::AllPosts, Self::Post(id.clone())]
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllPosts => f.write_str("posts"),
            Self::Post(id) => write!(f, "post/{id}"),
        }
    }
}
