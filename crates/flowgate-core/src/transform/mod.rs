//! Turns a stream of raw response-body pages into a rendered output format,
//! writing incrementally to a caller-supplied writer.

pub mod csv;
pub mod pdf;

pub use self::csv::{CSVTransformer, CSVTransformerConfig};
pub use pdf::{PDFTransformer, PDFTransformerConfig};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncWrite;
use tokio::sync::mpsc;

use crate::tablify::TablifyError;

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("cannot tabulate page: {0}")]
    Tablify(#[from] TablifyError),
    #[error("cannot write output: {0}")]
    Io(#[from] std::io::Error),
    #[error("renderer failed: {0}")]
    Renderer(String),
}

/// One participant in the transformation pipeline: consumes pages from
/// `pages` (closed when the producer side is done or cancelled) and writes
/// the rendered representation to `writer` incrementally.
#[async_trait]
pub trait DataTransformer: Send + Sync {
    async fn transform(
        &self,
        pages: mpsc::Receiver<Bytes>,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<(), TransformError>;
}
