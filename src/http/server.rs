//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the gate middleware and the proxy handler
//! - Wire up layers (request ID, tracing, body limit)
//! - Forward allowed requests to the upstream application
//! - Swap runtime state when the configuration is reloaded
//! - Serve the admin API on its own listener

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{
        header,
        uri::{Authority, PathAndQuery, Scheme},
        HeaderMap, Request, StatusCode, Uri,
    },
    middleware,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::admin::setup_admin_router;
use crate::config::GateConfig;
use crate::gate::{Gate, Responder};
use crate::http::middleware::gate_middleware;
use crate::http::request::{request_id, UuidRequestId};
use crate::observability::metrics;
use crate::security::Secret;

/// Hop-by-hop headers never forwarded upstream.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Error building runtime state from a configuration.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("invalid upstream url '{0}'")]
    InvalidUrl(String),
}

/// Where the token signing secret comes from.
#[derive(Debug, Clone)]
pub enum SecretSource {
    /// Read the variable named in `session.secret_env` on every (re)load.
    Env,
    /// A fixed secret, mostly for tests and embedding.
    Fixed(Secret),
}

impl SecretSource {
    pub fn resolve(&self, config: &GateConfig) -> Secret {
        match self {
            Self::Env => Secret::from_env(&config.session.secret_env),
            Self::Fixed(secret) => secret.clone(),
        }
    }
}

/// Upstream application address.
#[derive(Debug, Clone)]
pub struct Upstream {
    scheme: Scheme,
    authority: Authority,
}

impl Upstream {
    pub fn parse(url: &str) -> Result<Self, UpstreamError> {
        let invalid = || UpstreamError::InvalidUrl(url.to_string());
        let uri = Uri::from_str(url).map_err(|_| invalid())?;
        let scheme = uri.scheme().cloned().ok_or_else(invalid)?;
        if scheme != Scheme::HTTP {
            return Err(invalid());
        }
        let authority = uri.authority().cloned().ok_or_else(invalid)?;
        Ok(Self { scheme, authority })
    }

    /// Absolute upstream URI for an incoming request target.
    pub fn uri_for(&self, path_and_query: Option<&PathAndQuery>) -> Result<Uri, axum::http::Error> {
        Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path_and_query.map(|pq| pq.as_str()).unwrap_or("/"))
            .build()
    }
}

/// Everything derived from one configuration; swapped whole on reload.
pub struct GateRuntime {
    pub config: GateConfig,
    pub gate: Gate,
    pub responder: Responder,
    pub upstream: Upstream,
}

impl GateRuntime {
    pub fn build(config: GateConfig, secret: &Secret) -> Result<Self, UpstreamError> {
        let upstream = Upstream::parse(&config.upstream.url)?;
        let gate = Gate::from_config(&config, secret);
        let responder = Responder::new(&config.session, gate.sign_in_path());
        Ok(Self {
            config,
            gate,
            responder,
            upstream,
        })
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<ArcSwap<GateRuntime>>,
    pub client: Client<HttpConnector, Body>,
}

/// HTTP server for the gate.
pub struct HttpServer {
    state: AppState,
    router: Router,
    secret_source: SecretSource,
}

impl HttpServer {
    /// Create a server reading the signing secret from the environment.
    pub fn new(config: GateConfig) -> Result<Self, UpstreamError> {
        Self::with_secret_source(config, SecretSource::Env)
    }

    pub fn with_secret_source(
        config: GateConfig,
        secret_source: SecretSource,
    ) -> Result<Self, UpstreamError> {
        let secret = secret_source.resolve(&config);
        let runtime = GateRuntime::build(config, &secret)?;

        let mut connector = HttpConnector::new();
        connector.set_nodelay(true);
        let client = Client::builder(TokioExecutor::new()).build(connector);

        let state = AppState {
            runtime: Arc::new(ArcSwap::from_pointee(runtime)),
            client,
        };
        let router = Self::build_router(state.clone());

        Ok(Self {
            state,
            router,
            secret_source,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        let max_body = state.runtime.load().config.security.max_body_size;
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .layer(middleware::from_fn_with_state(state.clone(), gate_middleware))
            .layer(RequestBodyLimitLayer::new(max_body))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<GateConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Gate listening");

        self.start_background(config_updates, &shutdown);

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server over TLS.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        config_updates: mpsc::UnboundedReceiver<GateConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, "Gate listening (TLS)");

        self.start_background(config_updates, &shutdown);

        let handle = axum_server::Handle::new();
        let signal_handle = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            tracing::info!("Shutdown signal received");
            signal_handle.graceful_shutdown(Some(Duration::from_secs(10)));
        });

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Spawn the config reload loop and, if enabled, the admin API.
    fn start_background(
        &self,
        mut config_updates: mpsc::UnboundedReceiver<GateConfig>,
        shutdown: &broadcast::Receiver<()>,
    ) {
        let runtime = self.state.runtime.clone();
        let source = self.secret_source.clone();
        tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                let secret = source.resolve(&config);
                match GateRuntime::build(config, &secret) {
                    Ok(next) => {
                        runtime.store(Arc::new(next));
                        tracing::info!("Configuration reloaded, decision cache reset");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Rejected reloaded configuration");
                    }
                }
            }
        });

        let admin = self.state.runtime.load().config.admin.clone();
        if admin.enabled {
            let router = setup_admin_router(self.state.clone());
            let mut shutdown = shutdown.resubscribe();
            tokio::spawn(async move {
                let listener = match TcpListener::bind(&admin.bind_address).await {
                    Ok(listener) => listener,
                    Err(e) => {
                        tracing::error!(address = %admin.bind_address, error = %e, "Failed to bind admin listener");
                        return;
                    }
                };
                tracing::info!(address = %admin.bind_address, "Admin API listening");
                let served = axum::serve(listener, router.into_make_service())
                    .with_graceful_shutdown(async move {
                        let _ = shutdown.recv().await;
                    })
                    .await;
                if let Err(e) = served {
                    tracing::error!(error = %e, "Admin API stopped with error");
                }
            });
        }
    }
}

/// Forward an allowed request to the upstream application.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let runtime = state.runtime.load_full();
    let request_id = request_id(request.headers()).to_string();

    let (mut parts, body) = request.into_parts();
    parts.uri = match runtime.upstream.uri_for(parts.uri.path_and_query()) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Failed to build upstream URI");
            metrics::record_upstream_error("uri");
            return (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response();
        }
    };
    strip_hop_by_hop(&mut parts.headers);

    tracing::debug!(request_id = %request_id, uri = %parts.uri, "Forwarding request");

    let timeout = Duration::from_secs(runtime.config.timeouts.request_secs);
    match tokio::time::timeout(timeout, state.client.request(Request::from_parts(parts, body))).await {
        Ok(Ok(response)) => {
            let (mut parts, body) = response.into_parts();
            strip_hop_by_hop(&mut parts.headers);
            Response::from_parts(parts, Body::new(body))
        }
        Ok(Err(e)) => {
            tracing::error!(request_id = %request_id, error = %e, "Upstream error");
            metrics::record_upstream_error("connect");
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
        Err(_) => {
            tracing::warn!(request_id = %request_id, timeout = ?timeout, "Upstream timed out");
            metrics::record_upstream_error("timeout");
            (StatusCode::GATEWAY_TIMEOUT, "Upstream timed out").into_response()
        }
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    // Headers named in Connection are hop-by-hop as well.
    let named: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();
    for name in &named {
        headers.remove(name.as_str());
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}
