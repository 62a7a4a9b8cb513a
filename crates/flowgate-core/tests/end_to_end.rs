//! Exercises the end-to-end scenarios from SPEC_FULL.md §8 across the
//! router, pipeline, and transform modules together, rather than one module
//! in isolation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use flowgate_core::backend::{BackendError, RequestHandler, Response, UpstreamRequest};
use flowgate_core::pipeline::{
    PipelineError, RequestIterator, TransformerHandler, TransformerHandlerConfig,
};
use flowgate_core::router::{Method, Router};
use flowgate_core::tablify::{JSONTablifier, JSONTablifierConfig, NoOpRemapper};
use flowgate_core::transform::{CSVTransformer, CSVTransformerConfig, DataTransformer, TransformError};
use tokio::sync::mpsc;

/// Scenario 1: wildcard route capture.
#[test]
fn wildcard_route_capture() {
    let mut router: Router<&'static str> = Router::new();
    router
        .handle(Method::Get, "/api/*/resource/:id/**", "handler")
        .unwrap();
    let (handler, params) = router
        .dispatch(Method::Get, "/api/v1/resource/r-42/a/b/")
        .unwrap();
    assert_eq!(*handler, "handler");
    assert_eq!(params.get("id"), Some(&"r-42".to_string()));
}

/// Scenario 2: alternation mismatch.
#[test]
fn alternation_mismatch() {
    let mut router: Router<&'static str> = Router::new();
    router.handle(Method::Get, "/api/v1|v2/:param", "handler").unwrap();
    assert!(router.dispatch(Method::Get, "/api/v3/123").is_none());
}

/// Scenario 3: CSV pipeline produces exactly the expected bytes.
#[tokio::test]
async fn csv_pipeline_produces_expected_bytes() {
    struct SinglePageBackend;
    #[async_trait]
    impl RequestHandler for SinglePageBackend {
        async fn handle_request(&self, _request: UpstreamRequest) -> Result<Response, BackendError> {
            Ok(Response {
                status: 200,
                headers: HashMap::new(),
                body: Bytes::from_static(br#"{"Name": ["A","B"], "Age": [1,2]}"#),
            })
        }
    }

    let tablifier = Arc::new(JSONTablifier::new(
        Arc::new(NoOpRemapper),
        JSONTablifierConfig {
            columns: vec!["Name".to_string(), "Age".to_string()],
        },
    ));
    let transformer = Arc::new(CSVTransformer::new(
        tablifier,
        CSVTransformerConfig {
            use_header: true,
            ..Default::default()
        },
    ));
    let handler = TransformerHandler::new(
        transformer,
        Arc::new(flowgate_core::pipeline::DirectRequestIterator),
        Arc::new(SinglePageBackend),
        TransformerHandlerConfig::default(),
    );

    let mut output = Vec::new();
    handler
        .handle(UpstreamRequest::new("GET", "http://upstream/x"), &mut output)
        .await
        .unwrap();

    assert_eq!(output, b"Name,Age\nA,1\nB,2\n");
}

/// Scenario 3 (default columns): with no `columns` allow-list configured,
/// the tablifier must walk object properties in the JSON's own insertion
/// order rather than alphabetically, so `Name` (declared first) must still
/// precede `Age` in the resulting header/rows.
#[tokio::test]
async fn csv_pipeline_default_columns_preserve_object_order() {
    struct SinglePageBackend;
    #[async_trait]
    impl RequestHandler for SinglePageBackend {
        async fn handle_request(&self, _request: UpstreamRequest) -> Result<Response, BackendError> {
            Ok(Response {
                status: 200,
                headers: HashMap::new(),
                body: Bytes::from_static(br#"{"Name": ["A","B"], "Age": [1,2]}"#),
            })
        }
    }

    let tablifier = Arc::new(JSONTablifier::new(Arc::new(NoOpRemapper), JSONTablifierConfig::default()));
    let transformer = Arc::new(CSVTransformer::new(
        tablifier,
        CSVTransformerConfig {
            use_header: true,
            ..Default::default()
        },
    ));
    let handler = TransformerHandler::new(
        transformer,
        Arc::new(flowgate_core::pipeline::DirectRequestIterator),
        Arc::new(SinglePageBackend),
        TransformerHandlerConfig::default(),
    );

    let mut output = Vec::new();
    handler
        .handle(UpstreamRequest::new("GET", "http://upstream/x"), &mut output)
        .await
        .unwrap();

    assert_eq!(output, b"Name,Age\nA,1\nB,2\n");
}

/// Scenario 5: an upstream failure status surfaces as a typed HTTPError with
/// the exact upstream status and body.
#[tokio::test]
async fn upstream_failure_preserves_status_and_body() {
    struct FailingUpstream;
    #[async_trait]
    impl RequestHandler for FailingUpstream {
        async fn handle_request(&self, _request: UpstreamRequest) -> Result<Response, BackendError> {
            Ok(Response {
                status: 502,
                headers: HashMap::new(),
                body: Bytes::from_static(b"upstream down"),
            })
        }
    }

    let tablifier = Arc::new(JSONTablifier::new(Arc::new(NoOpRemapper), JSONTablifierConfig::default()));
    let transformer = Arc::new(CSVTransformer::new(tablifier, CSVTransformerConfig::default()));
    let handler = TransformerHandler::new(
        transformer,
        Arc::new(flowgate_core::pipeline::DirectRequestIterator),
        Arc::new(FailingUpstream),
        TransformerHandlerConfig::default(),
    );

    let mut output = Vec::new();
    let err = handler
        .handle(UpstreamRequest::new("GET", "http://upstream/x"), &mut output)
        .await
        .unwrap_err();
    match err {
        PipelineError::UnexpectedStatus(http_err) => {
            assert_eq!(http_err.status, 502);
            assert_eq!(http_err.body, Bytes::from_static(b"upstream down"));
        }
        other => panic!("expected UnexpectedStatus, got {other:?}"),
    }
}

/// Scenario 6: cancellation. A transformer that stops reading after its
/// first page must cause the producer to observe a closed channel and
/// return cleanly instead of hanging on further upstream pages.
#[tokio::test]
async fn consumer_stopping_early_closes_the_producer_without_hanging() {
    struct PaginatedIterator {
        calls: AtomicUsize,
    }
    impl RequestIterator for PaginatedIterator {
        fn next(
            &self,
            prev_request: &UpstreamRequest,
            _prev_response_data: Option<&[u8]>,
        ) -> Result<Option<UpstreamRequest>, PipelineError> {
            // An effectively endless page sequence; the test's point is that
            // the pipeline does not need to exhaust it.
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(prev_request.clone()))
        }
    }

    struct AlwaysOkBackend;
    #[async_trait]
    impl RequestHandler for AlwaysOkBackend {
        async fn handle_request(&self, _request: UpstreamRequest) -> Result<Response, BackendError> {
            Ok(Response {
                status: 200,
                headers: HashMap::new(),
                body: Bytes::from_static(br#"{"x": [1]}"#),
            })
        }
    }

    struct OnePageTransformer;
    #[async_trait]
    impl DataTransformer for OnePageTransformer {
        async fn transform(
            &self,
            mut pages: mpsc::Receiver<Bytes>,
            _writer: &mut (dyn tokio::io::AsyncWrite + Send + Unpin),
        ) -> Result<(), TransformError> {
            // Drain exactly one page, then stop — dropping `pages` closes
            // the producer's send side for everything after.
            let _ = pages.recv().await;
            Ok(())
        }
    }

    let handler = TransformerHandler::new(
        Arc::new(OnePageTransformer),
        Arc::new(PaginatedIterator { calls: AtomicUsize::new(0) }),
        Arc::new(AlwaysOkBackend),
        TransformerHandlerConfig::default(),
    );

    let mut output = Vec::new();
    let result = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        handler.handle(UpstreamRequest::new("GET", "http://upstream/x"), &mut output),
    )
    .await;

    assert!(result.is_ok(), "pipeline hung instead of closing on a dropped consumer");
    assert!(result.unwrap().is_ok());
}
