//! Orchestrates one client request into a stream of backend requests whose
//! responses are transformed and written out incrementally.
//!
//! [`TransformerHandler::handle`] runs a producer (the backend request loop)
//! and a consumer (the [`crate::transform::DataTransformer`]) concurrently
//! over a bounded channel, cancelling the still-running side the moment
//! either one fails. See SPEC_FULL.md §5 for the concurrency model this
//! implements.

mod error;
mod flush;
mod iterator;

pub use error::{HTTPError, PipelineError};
pub use flush::{FlushInterval, FlushWriter};
pub use iterator::{DirectRequestIterator, RequestIterator};

use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::backend::{RequestHandler, UpstreamRequest};
use crate::transform::DataTransformer;

/// Configures which upstream statuses are treated as successful and how a
/// backend error is handled.
pub struct TransformerHandlerConfig {
    /// Upstream status codes considered successful; defaults to `[200]`.
    pub success_http_status_codes: Vec<u16>,
    /// Called with a backend error; returning `true` skips to the next
    /// iteration without examining any response (see DESIGN.md's resolution
    /// of the backend-error `proceed` semantics), returning `false`
    /// terminates the pipeline with that error.
    pub error_handler: Arc<dyn Fn(&crate::backend::BackendError) -> bool + Send + Sync>,
    /// Zero disables periodic flushing, negative flushes after every write,
    /// positive is a periodic interval in milliseconds.
    pub flush_interval_millis: i64,
}

impl Default for TransformerHandlerConfig {
    fn default() -> Self {
        Self {
            success_http_status_codes: vec![200],
            error_handler: Arc::new(|_| false),
            flush_interval_millis: 0,
        }
    }
}

/// Drives requests through a backend and a transformer concurrently for one
/// client request.
pub struct TransformerHandler {
    transformer: Arc<dyn DataTransformer>,
    request_iterator: Arc<dyn RequestIterator>,
    backend: Arc<dyn RequestHandler>,
    config: TransformerHandlerConfig,
}

impl TransformerHandler {
    pub fn new(
        transformer: Arc<dyn DataTransformer>,
        request_iterator: Arc<dyn RequestIterator>,
        backend: Arc<dyn RequestHandler>,
        config: TransformerHandlerConfig,
    ) -> Self {
        Self {
            transformer,
            request_iterator,
            backend,
            config,
        }
    }

    /// Runs the producer/consumer pipeline for `initial_request`, writing the
    /// transformed output to `writer`.
    pub async fn handle(
        &self,
        initial_request: UpstreamRequest,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<(), PipelineError> {
        let mut flush_writer = FlushWriter::new(
            ChannelSink(writer),
            FlushInterval::from(self.config.flush_interval_millis),
        );

        // A capacity-1 channel is the closest stable-tokio approximation of
        // a zero-capacity rendezvous channel: the producer blocks until the
        // consumer has started receiving the previous page, so at most one
        // page is ever buffered in flight.
        let (tx, rx) = mpsc::channel::<Bytes>(1);

        // Both sides run concurrently; a failure on either side cancels the
        // other (futures_util::try_join! drops the still-pending future the
        // moment one resolves to `Err`), while success waits for both to
        // finish, matching the producer/consumer join in the system this
        // mirrors.
        let transform_fut = async {
            self.transformer
                .transform(rx, &mut flush_writer)
                .await
                .map_err(PipelineError::from)
        };
        let produce_fut = self.produce(initial_request, tx);

        futures_util::try_join!(transform_fut, produce_fut)?;

        flush_writer.stop().await.map_err(|e| {
            PipelineError::Transform(crate::transform::TransformError::Io(e))
        })?;
        Ok(())
    }

    async fn produce(
        &self,
        initial_request: UpstreamRequest,
        tx: mpsc::Sender<Bytes>,
    ) -> Result<(), PipelineError> {
        let mut request = initial_request;
        let mut prev_data: Option<Bytes> = None;

        loop {
            let next = self
                .request_iterator
                .next(&request, prev_data.as_deref())
                .map_err(|e| PipelineError::Iterator(e.to_string()))?;
            let Some(next_request) = next else {
                break;
            };
            request = next_request;

            let response = match self.backend.handle_request(request.clone()).await {
                Ok(response) => response,
                Err(err) => {
                    if (self.config.error_handler)(&err) {
                        prev_data = Some(Bytes::new());
                        continue;
                    }
                    return Err(PipelineError::Backend(err));
                }
            };

            if !self
                .config
                .success_http_status_codes
                .contains(&response.status)
            {
                return Err(PipelineError::UnexpectedStatus(HTTPError {
                    status: response.status,
                    body: response.body,
                }));
            }

            prev_data = Some(response.body.clone());
            if tx.send(response.body).await.is_err() {
                // the transformer side ended (successfully or by erroring);
                // either way there is nothing left to produce for.
                break;
            }
        }
        drop(tx);
        Ok(())
    }
}

/// Adapts a borrowed `&mut dyn AsyncWrite` into an owned value so it can be
/// wrapped by [`FlushWriter`], which needs to move its inner writer into a
/// background task.
struct ChannelSink<'a>(&'a mut (dyn AsyncWrite + Send + Unpin));

impl AsyncWrite for ChannelSink<'_> {
    fn poll_write(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> std::task::Poll<std::io::Result<usize>> {
        std::pin::Pin::new(&mut *self.0).poll_write(cx, buf)
    }
    fn poll_flush(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        std::pin::Pin::new(&mut *self.0).poll_flush(cx)
    }
    fn poll_shutdown(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        std::pin::Pin::new(&mut *self.0).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, FakeRequestHandler, Response};
    use crate::tablify::{JSONTablifier, JSONTablifierConfig, NoOpRemapper};
    use crate::transform::{CSVTransformer, CSVTransformerConfig};

    fn handler() -> TransformerHandler {
        let tablifier = Arc::new(JSONTablifier::new(
            Arc::new(NoOpRemapper),
            JSONTablifierConfig::default(),
        ));
        let transformer = Arc::new(CSVTransformer::new(tablifier, CSVTransformerConfig::default()));
        let backend = Arc::new(FakeRequestHandler {
            response: Response {
                status: 200,
                headers: Default::default(),
                body: Bytes::from_static(br#"{"name": ["a","b"]}"#),
            },
        });
        TransformerHandler::new(
            transformer,
            Arc::new(DirectRequestIterator),
            backend,
            TransformerHandlerConfig::default(),
        )
    }

    #[tokio::test]
    async fn single_request_pipeline_writes_transformed_output() {
        let handler = handler();
        let mut output = Vec::new();
        handler
            .handle(UpstreamRequest::new("GET", "http://upstream/x"), &mut output)
            .await
            .unwrap();
        let text = String::from_utf8(output).unwrap();
        assert!(text.contains('a'));
        assert!(text.contains('b'));
    }

    #[tokio::test]
    async fn unexpected_status_surfaces_as_http_error_with_body() {
        let tablifier = Arc::new(JSONTablifier::new(
            Arc::new(NoOpRemapper),
            JSONTablifierConfig::default(),
        ));
        let transformer = Arc::new(CSVTransformer::new(tablifier, CSVTransformerConfig::default()));
        let backend = Arc::new(FakeRequestHandler {
            response: Response {
                status: 500,
                headers: Default::default(),
                body: Bytes::from_static(b"boom"),
            },
        });
        let handler = TransformerHandler::new(
            transformer,
            Arc::new(DirectRequestIterator),
            backend,
            TransformerHandlerConfig::default(),
        );
        let mut output = Vec::new();
        let err = handler
            .handle(UpstreamRequest::new("GET", "http://upstream/x"), &mut output)
            .await
            .unwrap_err();
        match err {
            PipelineError::UnexpectedStatus(http_err) => {
                assert_eq!(http_err.status, 500);
                assert_eq!(http_err.body, Bytes::from_static(b"boom"));
            }
            other => panic!("expected UnexpectedStatus, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn backend_error_with_proceed_skips_to_next_iteration() {
        struct FailingBackend;
        #[async_trait::async_trait]
        impl RequestHandler for FailingBackend {
            async fn handle_request(
                &self,
                _request: UpstreamRequest,
            ) -> Result<Response, BackendError> {
                Err(BackendError::Transport("connection refused".to_string()))
            }
        }

        let tablifier = Arc::new(JSONTablifier::new(
            Arc::new(NoOpRemapper),
            JSONTablifierConfig::default(),
        ));
        let transformer = Arc::new(CSVTransformer::new(tablifier, CSVTransformerConfig::default()));
        let config = TransformerHandlerConfig {
            error_handler: Arc::new(|_| true),
            ..TransformerHandlerConfig::default()
        };
        let handler = TransformerHandler::new(
            transformer,
            Arc::new(DirectRequestIterator),
            Arc::new(FailingBackend),
            config,
        );
        let mut output = Vec::new();
        handler
            .handle(UpstreamRequest::new("GET", "http://upstream/x"), &mut output)
            .await
            .unwrap();
        assert!(output.is_empty());
    }
}
