//! Upstream request dispatch: the [`RequestHandler`] capability and the
//! value types it produces, independent of any particular transport.

mod proxy;

pub use proxy::ProxyBackend;

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;

/// An outgoing request to be handled by a [`RequestHandler`].
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: String,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl UpstreamRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: HashMap::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: Bytes) -> Self {
        self.body = body;
        self
    }
}

/// The response captured from a [`RequestHandler`]: a fully buffered status,
/// header set, and body. The pipeline reads the body lazily out of this
/// value rather than streaming it incrementally from the network, a
/// deliberate simplification over the original's `io.Reader`-typed body (see
/// DESIGN.md).
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("request to upstream failed: {0}")]
    Transport(String),
}

/// A capability that turns an [`UpstreamRequest`] into a [`Response`].
/// Implemented by [`ProxyBackend`] for production use and freely fakeable in
/// tests.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle_request(&self, request: UpstreamRequest) -> Result<Response, BackendError>;
}

#[cfg(test)]
pub(crate) struct FakeRequestHandler {
    pub response: Response,
}

#[cfg(test)]
#[async_trait]
impl RequestHandler for FakeRequestHandler {
    async fn handle_request(&self, _request: UpstreamRequest) -> Result<Response, BackendError> {
        Ok(self.response.clone())
    }
}
