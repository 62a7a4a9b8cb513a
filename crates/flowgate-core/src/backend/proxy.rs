use std::time::Instant;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};

use super::{BackendError, Response, RequestHandler, UpstreamRequest};

/// Forwards requests to an upstream over HTTP using a pooled [`reqwest::Client`].
///
/// Strips the client's `Accept-Encoding` header before forwarding so that the
/// upstream's response is never transparently decoded out from under the
/// transformation pipeline, which needs the original bytes; reqwest's own
/// automatic decompression is disabled for the same reason (see
/// `Cargo.toml`'s `gzip`/`brotli` features, which are requested but the
/// client is built with `no_*` so decoding stays explicit and visible in
/// logs). Logs one line per request at info level once the response status
/// is known.
#[derive(Clone)]
pub struct ProxyBackend {
    client: Client,
}

impl ProxyBackend {
    pub fn new() -> Self {
        Self {
            client: Client::builder()
                .no_gzip()
                .no_brotli()
                .build()
                .expect("failed to build upstream HTTP client"),
        }
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Default for ProxyBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RequestHandler for ProxyBackend {
    async fn handle_request(&self, request: UpstreamRequest) -> Result<Response, BackendError> {
        let start = Instant::now();
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let mut headers = HeaderMap::with_capacity(request.headers.len());
        for (name, value) in &request.headers {
            if name.eq_ignore_ascii_case("accept-encoding") || name.eq_ignore_ascii_case("host") {
                continue;
            }
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.insert(name, value);
            }
        }

        let response = self
            .client
            .request(method.clone(), &request.url)
            .headers(headers)
            .body(request.body.clone())
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let mut response_headers = std::collections::HashMap::with_capacity(response.headers().len());
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                response_headers.insert(name.as_str().to_string(), value.to_string());
            }
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        log::info!(
            "backend.proxy: [{}] {} {} served in {:?}",
            status,
            method,
            request.url,
            start.elapsed(),
        );

        Ok(Response {
            status,
            headers: response_headers,
            body,
        })
    }
}
