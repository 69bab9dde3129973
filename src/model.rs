//! Blog entities as the store delivers them.

mod timestamp;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, PickFirst, serde_as};

pub use timestamp::Timestamp;

/// Default excerpt length used by post listings.
pub const DEFAULT_EXCERPT_CHARS: usize = 150;

/// Store-generated post identifier. Opaque; never parsed by the client.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(String);

impl PostId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PostId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PostId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A reader comment. Immutable once the store appends it.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub content: String,
    pub author_name: String,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub timestamp: Timestamp,
}

/// A blog post with its comment thread.
///
/// `author_name`, `owner` and `publication_date` never change after creation.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub owner: String,
    pub author_name: String,
    pub likes: u64,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub publication_date: Timestamp,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl Post {
    /// Returns the first `max_chars` characters of the content followed by
    /// `...`, or the whole content if it already fits.
    #[must_use]
    pub fn excerpt(&self, max_chars: usize) -> String {
        if self.content.chars().count() <= max_chars {
            return self.content.clone();
        }
        let head: String = self.content.chars().take(max_chars).collect();
        format!("{}...", head.trim())
    }
}

/// Orders posts by publication date, newest first.
pub fn sort_newest_first(posts: &mut [Post]) {
    posts.sort_by(|a, b| b.publication_date.cmp(&a.publication_date));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(id: &str, published: i64, content: &str) -> Post {
        Post {
            id: PostId::from(id),
            title: format!("title {id}"),
            content: content.to_string(),
            owner: "owner".to_string(),
            author_name: "Ana".to_string(),
            likes: 0,
            publication_date: Timestamp::from_nanos(published),
            comments: vec![],
        }
    }

    #[test]
    fn test_post_deserializes_string_publication_date() {
        let json = r#"{
            "id": "p1",
            "title": "Trip to the lake",
            "content": "We had fun",
            "owner": "aaaaa-aa",
            "authorName": "Ana",
            "likes": 2,
            "publicationDate": "1700000000000000000",
            "comments": [
                {"content": "Nice!", "authorName": "Ben", "timestamp": 1700000001000000000}
            ]
        }"#;

        let post: Post = serde_json::from_str(json).expect("should deserialize");
        assert_eq!(post.id.as_str(), "p1");
        assert_eq!(post.author_name, "Ana");
        assert_eq!(post.likes, 2);
        assert_eq!(post.publication_date.as_nanos(), 1_700_000_000_000_000_000);
        assert_eq!(post.comments.len(), 1);
        assert_eq!(post.comments[0].author_name, "Ben");
        assert_eq!(
            post.comments[0].timestamp.as_nanos(),
            1_700_000_001_000_000_000
        );
    }

    #[test]
    fn test_post_missing_comments_defaults_empty() {
        let json = r#"{
            "id": "p2", "title": "t", "content": "c", "authorName": "Ana",
            "likes": 0, "publicationDate": 5
        }"#;
        let post: Post = serde_json::from_str(json).expect("should deserialize");
        assert!(post.comments.is_empty());
        assert!(post.owner.is_empty());
    }

    #[test]
    fn test_excerpt() {
        let short = post("a", 0, "We had fun");
        assert_eq!(short.excerpt(DEFAULT_EXCERPT_CHARS), "We had fun");

        let long = post("b", 0, "We had fun at the lake");
        assert_eq!(long.excerpt(7), "We had...");
    }

    #[test]
    fn test_sort_newest_first() {
        let mut posts = vec![post("old", 1, ""), post("new", 3, ""), post("mid", 2, "")];
        sort_newest_first(&mut posts);
        let ids: Vec<_> = posts.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[test]
    fn test_post_id_conversions() {
        let id = PostId::from("p1");
        assert_eq!(id, PostId::new("p1".to_string()));
        assert_eq!(id.to_string(), "p1");
        assert!(!id.is_empty());
        assert!(PostId::default().is_empty());
    }
}
