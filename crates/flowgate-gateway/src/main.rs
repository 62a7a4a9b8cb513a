//! Flowgate gateway binary entry point.
//!
//! Loads a route table from disk, starts an `actix-web` server that
//! dispatches every request through that table, and forwards matched proxy
//! routes to their upstream, optionally transforming the response body via a
//! [`flowgate_core::pipeline::TransformerHandler`]. Static routes are
//! answered directly without contacting any upstream.

mod bootstrap;
mod logging;
mod streaming;

use std::collections::HashMap;
use std::sync::Arc;

use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use bytes::Bytes;
use flowgate_core::backend::{RequestHandler, UpstreamRequest};
use flowgate_core::config::{ProxyRouteConfig, StaticRouteConfig, TransformerConfig};
use flowgate_core::path::NamedParameters;
use flowgate_core::router::{substitution::ColonTemplate, Method};
use futures_util::stream::{self, StreamExt};
use log::{error, info};
use tokio::signal;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use bootstrap::{AppState, RouteAction};
use streaming::ChannelWriter;

/// Backpressure depth between the pipeline producer and the actix response
/// body stream; kept small since the pipeline itself already rendezvous on a
/// capacity-1 channel between its own producer and transformer.
const RESPONSE_CHANNEL_CAPACITY: usize = 8;

/// Seconds actix-web waits for in-flight connections to drain after a
/// shutdown signal before forcing them closed (§10.5's grace period).
const SHUTDOWN_GRACE_SECS: u64 = 30;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    logging::configure_logger();

    let config_path = bootstrap::config_path();
    let config = match bootstrap::load_config(&config_path) {
        Ok(config) => config,
        Err(err) => {
            error!("failed to load configuration from '{config_path}': {err}");
            std::process::exit(1);
        }
    };

    let listen_address = config.listen_address.clone();
    let state = match bootstrap::build_app_state(&config) {
        Ok(state) => Arc::new(state),
        Err(err) => {
            error!("failed to build route table: {err}");
            std::process::exit(1);
        }
    };

    info!("flowgate-gateway listening on {listen_address}");

    let read_timeout = std::time::Duration::from_secs(config.read_timeout_secs);
    let server = HttpServer::new(move || {
        let state = state.clone();
        App::new()
            .app_data(web::Data::new(state))
            .default_service(web::route().to(dispatch))
    })
    .client_request_timeout(read_timeout)
    .bind(&listen_address)?
    .shutdown_timeout(SHUTDOWN_GRACE_SECS)
    .run();

    let result = tokio::select! {
        result = server => result,
        _ = signal::ctrl_c() => {
            info!("received shutdown signal, stopping server...");
            Ok(())
        }
    };

    match &result {
        Ok(()) => info!("server stopped gracefully"),
        Err(e) => error!("server error: {e}"),
    }
    result
}

async fn dispatch(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<Arc<AppState>>,
) -> HttpResponse {
    let Some(method) = Method::parse(req.method().as_str()) else {
        return HttpResponse::MethodNotAllowed().finish();
    };
    let path = req.path();

    let Some((action, params)) = state.router.dispatch(method, path) else {
        return HttpResponse::NotFound().finish();
    };

    match action {
        RouteAction::Static(route) => answer_static(route),
        RouteAction::Proxy(route) => answer_proxy(route, &params, &req, body, state.backend.clone()).await,
    }
}

fn answer_static(route: &StaticRouteConfig) -> HttpResponse {
    let mut response = HttpResponse::build(
        actix_web::http::StatusCode::from_u16(route.response_code)
            .unwrap_or(actix_web::http::StatusCode::OK),
    );
    for (name, value) in &route.response_headers {
        response.insert_header((name.as_str(), value.as_str()));
    }
    match &route.body {
        Some(body) => response.body(body.clone()),
        None => response.finish(),
    }
}

async fn answer_proxy(
    route: &ProxyRouteConfig,
    params: &NamedParameters,
    req: &HttpRequest,
    body: web::Bytes,
    backend: Arc<dyn RequestHandler>,
) -> HttpResponse {
    let upstream_path = ColonTemplate::new(&route.upstream_path_template).render(params);
    let upstream_url = format!(
        "{}{}",
        route.upstream_url.trim_end_matches('/'),
        upstream_path
    );

    let mut headers = HashMap::new();
    for (name, value) in req.headers() {
        if let Ok(value) = value.to_str() {
            headers.insert(name.as_str().to_string(), value.to_string());
        }
    }

    let upstream_request = UpstreamRequest::new(route.method.clone(), upstream_url)
        .with_headers(headers)
        .with_body(Bytes::copy_from_slice(&body));

    match bootstrap::build_transformer_handler(route, backend.clone()) {
        Ok(Some(handler)) => stream_transformed(route, handler, upstream_request).await,
        Ok(None) => forward_untransformed(route, backend, upstream_request).await,
        Err(err) => {
            error!("cannot build transformer for route '{}': {err}", route.path_template);
            HttpResponse::InternalServerError().finish()
        }
    }
}

async fn forward_untransformed(
    route: &ProxyRouteConfig,
    backend: Arc<dyn RequestHandler>,
    upstream_request: UpstreamRequest,
) -> HttpResponse {
    match backend.handle_request(upstream_request).await {
        Ok(response) => {
            let mut builder = HttpResponse::build(
                actix_web::http::StatusCode::from_u16(response.status)
                    .unwrap_or(actix_web::http::StatusCode::BAD_GATEWAY),
            );
            for (name, value) in &response.headers {
                builder.insert_header((name.as_str(), value.as_str()));
            }
            for (name, value) in &route.response_headers {
                builder.insert_header((name.as_str(), value.as_str()));
            }
            builder.body(response.body)
        }
        Err(err) => {
            error!("upstream request for route '{}' failed: {err}", route.path_template);
            HttpResponse::InternalServerError().finish()
        }
    }
}

/// Streams a transformed response, but first waits for either the pipeline's
/// initial page or its failure before committing to a 200 status: an
/// upstream error discovered before any page was produced should still reach
/// the client with its real status and body (§7, §8 scenario 5), which is
/// only possible if no bytes have been written to the response yet.
async fn stream_transformed(
    route: &ProxyRouteConfig,
    handler: flowgate_core::pipeline::TransformerHandler,
    upstream_request: UpstreamRequest,
) -> HttpResponse {
    let (tx, mut rx) = mpsc::channel::<Bytes>(RESPONSE_CHANNEL_CAPACITY);
    let route_template = route.path_template.clone();

    let mut task = tokio::spawn(async move {
        let mut writer = ChannelWriter::new(tx);
        handler.handle(upstream_request, &mut writer).await
    });

    let first_chunk = tokio::select! {
        biased;
        chunk = rx.recv() => Some(chunk),
        result = &mut task => {
            return finish_without_streaming(&route_template, result);
        }
    };

    let first_chunk = match first_chunk {
        Some(Some(bytes)) => bytes,
        Some(None) => return finish_without_streaming(&route_template, task.await),
        None => unreachable!("select! always resolves one branch"),
    };

    let content_type = match &route.transformer {
        Some(TransformerConfig::Csv { .. }) => "text/csv",
        Some(TransformerConfig::Pdf { .. }) => "application/pdf",
        None => "application/octet-stream",
    };

    // The response is committed to 200 from here on; a failure discovered by
    // `task` after this point can only be logged, not reflected in the
    // already-sent status.
    tokio::spawn(async move {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!("pipeline for route '{route_template}' failed mid-stream: {err}"),
            Err(join_err) => error!("pipeline for route '{route_template}' panicked mid-stream: {join_err}"),
        }
    });

    let mut builder = HttpResponse::Ok();
    builder.content_type(content_type);
    for (name, value) in &route.response_headers {
        builder.insert_header((name.as_str(), value.as_str()));
    }
    let body = stream::once(async move { Ok::<_, std::io::Error>(first_chunk) })
        .chain(ReceiverStream::new(rx).map(Ok::<_, std::io::Error>));
    builder.streaming(body)
}

/// Builds the client-facing response for a pipeline that finished (or
/// panicked) before producing any page, so its status and body can still be
/// reported directly instead of behind an already-committed 200 stream.
fn finish_without_streaming(
    route_template: &str,
    result: Result<Result<(), flowgate_core::pipeline::PipelineError>, tokio::task::JoinError>,
) -> HttpResponse {
    match result {
        Ok(Ok(())) => HttpResponse::Ok().finish(),
        Ok(Err(flowgate_core::pipeline::PipelineError::UnexpectedStatus(http_err))) => {
            error!("pipeline for route '{route_template}' saw upstream status {}", http_err.status);
            HttpResponse::build(
                actix_web::http::StatusCode::from_u16(http_err.status)
                    .unwrap_or(actix_web::http::StatusCode::BAD_GATEWAY),
            )
            .body(http_err.body)
        }
        Ok(Err(err)) => {
            error!("pipeline for route '{route_template}' failed: {err}");
            HttpResponse::InternalServerError().finish()
        }
        Err(join_err) => {
            error!("pipeline for route '{route_template}' panicked: {join_err}");
            HttpResponse::InternalServerError().finish()
        }
    }
}
