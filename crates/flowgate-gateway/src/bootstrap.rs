//! Loads configuration from disk, validates it, and wires it into a
//! dispatchable [`Router`].
//!
//! Factory selection (§10.4) is an ordinary `match` over each config enum's
//! `name` tag rather than a dynamic reflective registry, since the config
//! schema already carries a closed, typed set of names.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use flowgate_core::backend::{ProxyBackend, RequestHandler};
use flowgate_core::config::{
    ProxyRouteConfig, RemapperConfig, ServerConfig, StaticRouteConfig, TablifierConfig,
    TransformerConfig,
};
use flowgate_core::pipeline::{DirectRequestIterator, TransformerHandler, TransformerHandlerConfig};
use flowgate_core::router::{Method, Router, RouterError};
use flowgate_core::tablify::{JSONTablifier, NoOpRemapper, Remapper, Tablifier};
use flowgate_core::transform::{CSVTransformer, DataTransformer, PDFTransformer};
use log::{info, warn};

const DEFAULT_CONFIG_PATH: &str = "./config.json";

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("cannot read configuration file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("configuration is invalid:\n{}", .0.join("\n"))]
    Invalid(Vec<String>),
    #[error("cannot build route table: {0}")]
    Router(#[from] RouterError),
    #[error("unsupported remapper '{0}'")]
    UnsupportedRemapper(String),
    #[error("invalid PDF template: {0}")]
    InvalidTemplate(String),
}

/// What a matched route does once dispatched.
pub enum RouteAction {
    Proxy(ProxyRouteConfig),
    Static(StaticRouteConfig),
}

/// Everything the HTTP layer needs to answer a request.
pub struct AppState {
    pub router: Router<RouteAction>,
    pub backend: Arc<dyn RequestHandler>,
}

/// Reads the configuration path from `FLOWGATE_CONFIG_PATH`, defaulting to
/// `./config.json`, per §6's CLI surface.
pub fn config_path() -> String {
    std::env::var("FLOWGATE_CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
}

pub fn load_config(path: &str) -> Result<ServerConfig, BootstrapError> {
    let raw = fs::read(Path::new(path)).map_err(|source| BootstrapError::Read {
        path: path.to_string(),
        source,
    })?;
    let config: ServerConfig = serde_json::from_slice(&raw)?;
    let problems = config.validate();
    if !problems.is_empty() {
        return Err(BootstrapError::Invalid(problems));
    }
    Ok(config)
}

pub fn build_app_state(config: &ServerConfig) -> Result<AppState, BootstrapError> {
    let mut router: Router<RouteAction> = Router::new();
    for route in &config.proxy_routes {
        let method = Method::parse(&route.method).expect("validated by ServerConfig::validate");
        router.handle(method, &route.path_template, RouteAction::Proxy(route.clone()))?;
        info!("registered proxy route {} {}", route.method, route.path_template);
    }
    for route in &config.static_routes {
        let method = Method::parse(&route.method).expect("validated by ServerConfig::validate");
        router.handle(method, &route.path_template, RouteAction::Static(route.clone()))?;
        info!("registered static route {} {}", route.method, route.path_template);
    }
    Ok(AppState {
        router,
        backend: Arc::new(ProxyBackend::new()),
    })
}

/// Builds the `TransformerHandler` for a proxy route that names a
/// transformer, or `None` if the route forwards the upstream body
/// untransformed.
pub fn build_transformer_handler(
    route: &ProxyRouteConfig,
    backend: Arc<dyn RequestHandler>,
) -> Result<Option<TransformerHandler>, BootstrapError> {
    let Some(transformer_config) = &route.transformer else {
        return Ok(None);
    };
    let transformer = build_transformer(transformer_config)?;
    let config = TransformerHandlerConfig {
        success_http_status_codes: route.success_http_status_codes.clone(),
        flush_interval_millis: route.flush_interval_millis,
        ..TransformerHandlerConfig::default()
    };
    Ok(Some(TransformerHandler::new(
        transformer,
        Arc::new(DirectRequestIterator),
        backend,
        config,
    )))
}

fn build_transformer(
    config: &TransformerConfig,
) -> Result<Arc<dyn DataTransformer>, BootstrapError> {
    match config {
        TransformerConfig::Csv { options, tablifier } => {
            let tablifier = build_tablifier(tablifier)?;
            Ok(Arc::new(CSVTransformer::new(tablifier, options.clone())))
        }
        TransformerConfig::Pdf { options, remapper } => {
            let remapper = build_remapper(remapper.as_ref())?;
            let transformer = PDFTransformer::new(remapper, options.clone())
                .map_err(|e| BootstrapError::InvalidTemplate(e.to_string()))?;
            Ok(Arc::new(transformer))
        }
    }
}

fn build_tablifier(config: &TablifierConfig) -> Result<Arc<dyn Tablifier>, BootstrapError> {
    match config {
        TablifierConfig::Json { columns, remapper } => {
            let remapper = build_remapper(remapper.as_ref())?;
            Ok(Arc::new(JSONTablifier::new(
                remapper,
                flowgate_core::tablify::JSONTablifierConfig {
                    columns: columns.clone(),
                },
            )))
        }
    }
}

fn build_remapper(config: Option<&RemapperConfig>) -> Result<Arc<dyn Remapper>, BootstrapError> {
    match config {
        None | Some(RemapperConfig::NoOp) => Ok(Arc::new(NoOpRemapper)),
        Some(RemapperConfig::Kazaam { .. }) => {
            warn!("remapper 'kazaam' was requested but is not implemented by this build");
            Err(BootstrapError::UnsupportedRemapper("kazaam".to_string()))
        }
    }
}
