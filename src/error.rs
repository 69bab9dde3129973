use thiserror::Error;

use crate::model::PostId;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by queries, mutations and store backends.
///
/// The type is `Clone` because a single in-flight fetch delivers its outcome
/// to every reader waiting on the same key.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// There is no usable store binding (still connecting, or connecting failed).
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// The post id does not resolve to an existing post.
    #[error("Post `{0}` not found")]
    NotFound(PostId),

    /// A required field was empty after trimming whitespace.
    #[error("Validation failed: `{field}` must not be blank")]
    ValidationFailed { field: &'static str },

    /// Transport or protocol failure, distinct from a semantic not-found.
    #[error("Remote call failed: {0}")]
    RemoteCallFailed(String),
}

impl Error {
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::RemoteCallFailed(format!("cannot encode/decode JSON: {err}"))
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::RemoteCallFailed(err.to_string())
    }
}

#[cfg(feature = "http")]
impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::StoreUnavailable(format!("invalid store url: {err}"))
    }
}
