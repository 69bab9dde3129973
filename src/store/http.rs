//! JSON-over-HTTP store backend.
//!
//! | Operation       | Request                         |
//! |-----------------|---------------------------------|
//! | `create_post`   | `POST /posts` → `{"id": ...}`   |
//! | `get_all_posts` | `GET /posts`                    |
//! | `get_post`      | `GET /posts/{id}`               |
//! | `update_post`   | `PUT /posts/{id}`               |
//! | `delete_post`   | `DELETE /posts/{id}`            |
//! | `like_post`     | `POST /posts/{id}/like`         |
//! | `add_comment`   | `POST /posts/{id}/comments`     |
//!
//! A `404` on a request that names a post maps to [`Error::NotFound`]; every
//! other failure is [`Error::RemoteCallFailed`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, header};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use super::{PostStore, StoreHandle};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::model::{Post, PostId};
use crate::transport::{Connector, Identity};

/// Header carrying the caller identity, when there is one.
pub const IDENTITY_HEADER: &str = "x-hearth-identity";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePostBody<'a> {
    title: &'a str,
    content: &'a str,
    author_name: &'a str,
}

#[derive(Deserialize)]
struct CreatedPost {
    id: PostId,
}

#[derive(Serialize)]
struct UpdatePostBody<'a> {
    title: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddCommentBody<'a> {
    author_name: &'a str,
    content: &'a str,
}

/// A [`PostStore`] reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: Client,
    base: Url,
}

impl HttpStore {
    pub fn new(base_url: &str, identity: &Identity, timeout: Option<Duration>) -> Result<Self> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let mut headers = header::HeaderMap::new();
        if let Some(name) = identity.name() {
            let value = header::HeaderValue::from_str(name)
                .map_err(|e| Error::StoreUnavailable(format!("invalid identity header: {e}")))?;
            headers.insert(IDENTITY_HEADER, value);
        }

        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| Error::StoreUnavailable(e.to_string()))?;

        Ok(Self { client, base })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let path = segments
            .iter()
            .map(|segment| urlencoding::encode(segment))
            .collect::<Vec<_>>()
            .join("/");
        Ok(self.base.join(&path)?)
    }

    fn post_endpoint(&self, id: &PostId, rest: Option<&str>) -> Result<Url> {
        match rest {
            Some(rest) => self.endpoint(&["posts", id.as_str(), rest]),
            None => self.endpoint(&["posts", id.as_str()]),
        }
    }
}

/// Maps a response status onto the store error taxonomy.
fn check_status(status: StatusCode, id: Option<&PostId>) -> Result<()> {
    match (status, id) {
        (StatusCode::NOT_FOUND, Some(id)) => Err(Error::NotFound(id.clone())),
        (status, _) if status.is_success() => Ok(()),
        (status, _) => Err(Error::RemoteCallFailed(format!("store responded {status}"))),
    }
}

fn checked(response: Response, id: Option<&PostId>) -> Result<Response> {
    check_status(response.status(), id)?;
    Ok(response)
}

#[async_trait]
impl PostStore for HttpStore {
    async fn create_post(&self, title: &str, content: &str, author_name: &str) -> Result<PostId> {
        let url = self.endpoint(&["posts"])?;
        let body = CreatePostBody {
            title,
            content,
            author_name,
        };
        let response = self.client.post(url).json(&body).send().await?;
        let created: CreatedPost = checked(response, None)?.json().await?;
        debug!(id = %created.id, "store created post");
        Ok(created.id)
    }

    async fn get_post(&self, id: &PostId) -> Result<Post> {
        let url = self.post_endpoint(id, None)?;
        let response = self.client.get(url).send().await?;
        Ok(checked(response, Some(id))?.json().await?)
    }

    async fn get_all_posts(&self) -> Result<Vec<Post>> {
        let url = self.endpoint(&["posts"])?;
        let response = self.client.get(url).send().await?;
        Ok(checked(response, None)?.json().await?)
    }

    async fn update_post(&self, id: &PostId, title: &str, content: &str) -> Result<()> {
        let url = self.post_endpoint(id, None)?;
        let body = UpdatePostBody { title, content };
        let response = self.client.put(url).json(&body).send().await?;
        checked(response, Some(id)).map(drop)
    }

    async fn delete_post(&self, id: &PostId) -> Result<()> {
        let url = self.post_endpoint(id, None)?;
        let response = self.client.delete(url).send().await?;
        checked(response, Some(id)).map(drop)
    }

    async fn like_post(&self, id: &PostId) -> Result<()> {
        let url = self.post_endpoint(id, Some("like"))?;
        let response = self.client.post(url).send().await?;
        checked(response, Some(id)).map(drop)
    }

    async fn add_comment(&self, post_id: &PostId, author_name: &str, content: &str) -> Result<()> {
        let url = self.post_endpoint(post_id, Some("comments"))?;
        let body = AddCommentBody {
            author_name,
            content,
        };
        let response = self.client.post(url).json(&body).send().await?;
        checked(response, Some(post_id)).map(drop)
    }
}

/// Builds an [`HttpStore`] from a [`ClientConfig`] for each binding generation.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    config: ClientConfig,
}

impl HttpConnector {
    #[must_use]
    pub const fn new(config: ClientConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn connect(&self, identity: &Identity) -> Result<StoreHandle> {
        let store = HttpStore::new(
            &self.config.store_url,
            identity,
            self.config.request_timeout(),
        )?;
        Ok(Arc::new(store))
    }
}
