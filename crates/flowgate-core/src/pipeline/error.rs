use bytes::Bytes;

use crate::backend::BackendError;
use crate::transform::TransformError;

/// An upstream response whose status code was not in the configured set of
/// acceptable codes. Carries the body so a caller can forward it verbatim to
/// the client instead of losing the original upstream error payload.
#[derive(Debug, Clone)]
pub struct HTTPError {
    pub status: u16,
    pub body: Bytes,
}

impl std::fmt::Display for HTTPError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HTTP {}", self.status)
    }
}

impl std::error::Error for HTTPError {}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("cannot get next request from iterator: {0}")]
    Iterator(String),
    #[error("cannot get response from backend: {0}")]
    Backend(#[from] BackendError),
    #[error("unexpected upstream status: {0}")]
    UnexpectedStatus(#[source] HTTPError),
    #[error("transformation failed: {0}")]
    Transform(#[from] TransformError),
    #[error("transformer task panicked or was cancelled")]
    Cancelled,
}
