//! Transport abstraction over the host's authenticated fetch capability.
//!
//! The loader never talks to `reqwest` directly: everything goes through
//! the [`Transport`] trait so the host environment decides how requests
//! are authenticated (plain GET for public artifact URLs, bearer-token
//! GET inside a restricted host) and tests substitute an in-memory stub.

use async_trait::async_trait;

use crate::DatasetError;

/// A raw chunk response: the HTTP status and the body text.
///
/// Status classification (retry, auth, missing) happens in the fetcher;
/// the transport only moves bytes.
#[derive(Debug, Clone)]
pub struct ChunkResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

/// Fetch capability supplied by the host environment.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetches the artifact at `path` (relative to the dataset base).
    ///
    /// # Errors
    ///
    /// Returns an error only for network-level failures (connection
    /// refused, timeout). Non-2xx statuses are *responses*, not errors.
    async fn get(&self, path: &str) -> Result<ChunkResponse, DatasetError>;

    /// Lightweight existence probe (no body) used during dataset root
    /// resolution.
    ///
    /// # Errors
    ///
    /// Returns an error for network-level failures.
    async fn probe(&self, path: &str) -> Result<bool, DatasetError>;
}

/// [`Transport`] over HTTP(S) via `reqwest`, with optional bearer-token
/// authentication.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl HttpTransport {
    /// Creates a transport rooted at `base_url` (e.g., the artifact
    /// container URL).
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            bearer_token: None,
        }
    }

    /// Attaches a bearer token to every request.
    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, path: &str) -> Result<ChunkResponse, DatasetError> {
        let url = self.url(path);
        log::debug!("GET {url}");
        let response = self.authorize(self.client.get(&url)).send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(ChunkResponse { status, body })
    }

    async fn probe(&self, path: &str) -> Result<bool, DatasetError> {
        let url = self.url(path);
        log::debug!("HEAD {url}");
        let response = self.authorize(self.client.head(&url)).send().await?;
        Ok(response.status().is_success())
    }
}
