//! Remote file store client
//!
//! A small REST contract over HTTPS:
//!
//! - `GET  /identity` returns `{ "login": ... }` for the bearer token
//! - `GET  /container/{ref}` is 200 when the container exists, 404 otherwise
//! - `POST /containers` with `{ "name", "private": true }` creates one
//! - `GET  /container/{ref}/contents/{file}` returns `{ "content", "sha" }`
//!   with base64 content, 404 when absent
//! - `PUT  /container/{ref}/contents/{file}` with `{ "message", "content",
//!   "sha"? }` returns `{ "sha" }`; a stale `sha` is a conflict

use crate::config::USER_AGENT;
use crate::error::SyncError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};

pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// A file as stored remotely: decoded text plus its version token
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteFile {
    pub content: String,
    pub sha: String,
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Validate the token, returning the account handle
    async fn identity(&self, token: &str) -> SyncResult<String>;

    async fn container_exists(&self, token: &str, container: &str) -> SyncResult<bool>;

    /// Create a private, empty container
    async fn create_container(&self, token: &str, container: &str) -> SyncResult<()>;

    async fn get_file(&self, token: &str, container: &str, path: &str)
        -> SyncResult<Option<RemoteFile>>;

    /// Conditional write. `sha` must match the current version when the
    /// file exists. Returns the new version token.
    async fn put_file(
        &self,
        token: &str,
        container: &str,
        path: &str,
        content: &str,
        message: &str,
        sha: Option<&str>,
    ) -> SyncResult<String>;
}

pub fn encode_content(text: &str) -> String {
    STANDARD.encode(text.as_bytes())
}

/// Decode base64 content, tolerating the line breaks some servers insert
pub fn decode_content(encoded: &str) -> SyncResult<String> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact)
        .map_err(|e| SyncError::Decode(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| SyncError::Decode(e.to_string()))
}

#[derive(Deserialize)]
struct IdentityResponse {
    login: String,
}

#[derive(Serialize)]
struct CreateContainerRequest<'a> {
    name: &'a str,
    private: bool,
}

#[derive(Deserialize)]
struct FileResponse {
    content: String,
    sha: String,
}

#[derive(Serialize)]
struct PutFileRequest<'a> {
    message: &'a str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Deserialize)]
struct PutFileResponse {
    sha: String,
}

/// Map a non-success status to a sync error
async fn status_error(response: Response, what: &str) -> SyncError {
    let status = response.status();
    let message = response.text().await.unwrap_or_default();

    match status {
        StatusCode::UNAUTHORIZED => SyncError::BadCredential,
        StatusCode::FORBIDDEN => SyncError::PermissionDenied(what.to_string()),
        StatusCode::NOT_FOUND => SyncError::NotFound(what.to_string()),
        StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED | StatusCode::UNPROCESSABLE_ENTITY => {
            SyncError::Conflict
        }
        other => SyncError::UnexpectedStatus {
            status: other.as_u16(),
            message,
        },
    }
}

/// `RemoteStore` over HTTP with reqwest
#[derive(Clone)]
pub struct HttpRemoteStore {
    client: Client,
    base_url: String,
}

impl HttpRemoteStore {
    pub fn new(base_url: &str) -> SyncResult<Self> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, request: RequestBuilder, token: &str) -> RequestBuilder {
        request
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json")
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn identity(&self, token: &str) -> SyncResult<String> {
        let response = self
            .authed(self.client.get(self.url("/identity")), token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response, "identity").await);
        }

        let identity: IdentityResponse = response.json().await?;
        tracing::debug!("Remote identity: {}", identity.login);
        Ok(identity.login)
    }

    async fn container_exists(&self, token: &str, container: &str) -> SyncResult<bool> {
        let response = self
            .authed(
                self.client.get(self.url(&format!("/container/{}", container))),
                token,
            )
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(status_error(response, container).await),
        }
    }

    async fn create_container(&self, token: &str, container: &str) -> SyncResult<()> {
        let response = self
            .authed(self.client.post(self.url("/containers")), token)
            .json(&CreateContainerRequest {
                name: container,
                private: true,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response, container).await);
        }

        tracing::info!("Created remote container {}", container);
        Ok(())
    }

    async fn get_file(
        &self,
        token: &str,
        container: &str,
        path: &str,
    ) -> SyncResult<Option<RemoteFile>> {
        let response = self
            .authed(
                self.client
                    .get(self.url(&format!("/container/{}/contents/{}", container, path))),
                token,
            )
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            status if !status.is_success() => return Err(status_error(response, path).await),
            _ => {}
        }

        let file: FileResponse = response.json().await?;
        Ok(Some(RemoteFile {
            content: decode_content(&file.content)?,
            sha: file.sha,
        }))
    }

    async fn put_file(
        &self,
        token: &str,
        container: &str,
        path: &str,
        content: &str,
        message: &str,
        sha: Option<&str>,
    ) -> SyncResult<String> {
        let response = self
            .authed(
                self.client
                    .put(self.url(&format!("/container/{}/contents/{}", container, path))),
                token,
            )
            .json(&PutFileRequest {
                message,
                content: encode_content(content),
                sha,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(status_error(response, path).await);
        }

        let written: PutFileResponse = response.json().await?;
        Ok(written.sha)
    }
}
