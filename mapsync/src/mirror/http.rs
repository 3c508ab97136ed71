//! HTTP client abstraction for testability

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};

use super::types::MirrorError;

/// Default overall timeout for a single archive request (5 minutes).
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Default connect timeout.
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Streaming response body.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, MirrorError>> + Send>>;

/// Response headers the race engine validates, plus the unread body.
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw `Content-Type` header, if present.
    pub content_type: Option<String>,
    /// Declared `Content-Length`, if present.
    pub content_length: Option<u64>,
    /// Body chunks, read lazily.
    pub body: BodyStream,
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

/// Trait for async HTTP GET operations.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling scripted HTTP clients in tests.
pub trait AsyncHttpClient: Send + Sync + 'static {
    /// Issues a GET request and returns once headers are available.
    ///
    /// Non-2xx statuses are returned as responses, not errors; only
    /// connection-level failures produce `Err`.
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<HttpResponse, MirrorError>>;
}

/// Real HTTP client implementation using reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a new ReqwestClient with default configuration.
    pub fn new() -> Result<Self, MirrorError> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a new ReqwestClient with a custom overall request timeout.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, MirrorError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
            .user_agent(concat!("mapsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| MirrorError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

impl AsyncHttpClient for ReqwestClient {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<HttpResponse, MirrorError>> {
        Box::pin(async move {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| MirrorError::Transport(format!("Request failed: {}", e)))?;

            let status = response.status().as_u16();
            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            let content_length = response.content_length();

            let body = response.bytes_stream().map(|chunk| {
                chunk.map_err(|e| MirrorError::Transport(format!("Failed to read body: {}", e)))
            });

            Ok(HttpResponse {
                status,
                content_type,
                content_length,
                body: Box::pin(body),
            })
        })
    }
}
