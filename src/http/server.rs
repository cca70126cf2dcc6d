//! HTTP server setup and the request pipeline wiring.
//!
//! # Responsibilities
//! - Create the Axum router with the gate's control endpoints
//! - Wire up the pipeline middleware in orchestration order
//! - Bind the server to a listener and serve until shutdown
//! - Forward allowed requests to the upstream application server
//!
//! # Pipeline order (outermost first)
//! ```text
//! request id → trace → concurrency limit → timeout → body limit
//!     → tenant resolution (static assets skip)
//!     → security headers
//!     → rate limit
//!     → session guard
//!     → control endpoints / upstream forward
//! ```

use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{
        uri::{Authority, PathAndQuery, Scheme, Uri},
        HeaderValue, Request, StatusCode,
    },
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer, map_request_body::MapRequestBodyLayer, timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tower_http::ServiceBuilderExt;

use crate::config::schema::EdgeConfig;
use crate::http::control;
use crate::http::pipeline;
use crate::http::request::{request_id, MakeRequestUuid};
use crate::observability::metrics;
use crate::security::access::{AccessGate, FeaturePolicy, HttpSecurityStateStore};
use crate::security::rate_limit::RateLimiter;
use crate::security::session::SessionAuthenticator;
use crate::security::stepup::StepUpManager;
use crate::tenancy::directory::DirectoryStore;

/// Application state injected into middleware and handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<EdgeConfig>,
    pub directory: Arc<DirectoryStore>,
    pub limiter: Arc<RateLimiter>,
    pub sessions: Arc<SessionAuthenticator>,
    pub stepup: Arc<StepUpManager>,
    pub gate: Arc<AccessGate>,
    /// Data-plane client: streams forwards to the application server.
    pub client: Client<HttpConnector, Body>,
    /// Control-plane client: JSON calls to the auth/internal services.
    pub internal: reqwest::Client,
}

/// The edge gate HTTP server.
pub struct EdgeServer {
    router: Router,
    config: Arc<EdgeConfig>,
    directory: Arc<DirectoryStore>,
}

impl EdgeServer {
    /// Create a new server with the given configuration.
    pub fn new(config: EdgeConfig) -> Self {
        let config = Arc::new(config);

        let directory = Arc::new(DirectoryStore::open(Path::new(
            &config.tenancy.directory_path,
        )));
        let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        let sessions = Arc::new(SessionAuthenticator::new(&config.session));
        let stepup = Arc::new(StepUpManager::new(
            &config.stepup,
            config.environment.is_production(),
        ));

        let internal = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        let store = Arc::new(HttpSecurityStateStore::new(
            internal.clone(),
            config.upstream.internal_api_base.clone(),
        ));
        let gate = Arc::new(AccessGate::new(
            FeaturePolicy::from_config(&config.access),
            store,
            stepup.clone(),
        ));

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.timeouts.connect_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        let state = AppState {
            config: config.clone(),
            directory: directory.clone(),
            limiter,
            sessions,
            stepup,
            gate,
            client,
            internal,
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            directory,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &EdgeConfig, state: AppState) -> Router {
        Router::new()
            .route("/edge/healthz", get(control::healthz))
            .route("/api/auth/pin/verify", post(control::pin_verify))
            .route("/internal/access/{feature}", get(control::access_check))
            .fallback(forward_upstream)
            .with_state(state.clone())
            .layer(
                ServiceBuilder::new()
                    .set_x_request_id(MakeRequestUuid)
                    .layer(TraceLayer::new_for_http())
                    .propagate_x_request_id()
                    .layer(GlobalConcurrencyLimitLayer::new(
                        config.listener.max_connections,
                    ))
                    .layer(RequestBodyLimitLayer::new(config.listener.max_body_size))
                    // The body-limit layer rewraps the request body as
                    // `Limited<Body>`; map it back to `Body` so the axum
                    // `from_fn` middleware below still type-checks (the
                    // limit remains enforced by the wrapped stream).
                    .layer(MapRequestBodyLayer::new(Body::new))
                    .layer(TimeoutLayer::new(Duration::from_secs(
                        config.timeouts.request_secs,
                    )))
                    .layer(middleware::from_fn_with_state(
                        state.clone(),
                        pipeline::tenant_resolution,
                    ))
                    .layer(middleware::from_fn_with_state(
                        state.clone(),
                        pipeline::security_headers,
                    ))
                    .layer(middleware::from_fn_with_state(
                        state.clone(),
                        pipeline::rate_limit,
                    ))
                    .layer(middleware::from_fn_with_state(
                        state,
                        pipeline::session_guard,
                    )),
            )
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            environment = ?self.config.environment,
            "Edge gate starting"
        );

        // Tenant directory refresh happens out of band; the watcher
        // guard must live as long as the server.
        let _watcher = match self.directory.clone().watch() {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                tracing::warn!(error = %e, "Tenant directory watcher unavailable, snapshot is static");
                None
            }
        };

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("Edge gate stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &EdgeConfig {
        &self.config
    }
}

/// Forward a request that passed every gate to the application server.
async fn forward_upstream(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let id = request_id(request.headers()).to_string();
    let path = request.uri().path().to_string();

    tracing::debug!(
        request_id = %id,
        method = %method,
        path = %path,
        "Forwarding request upstream"
    );

    let authority = match Authority::from_str(&state.config.upstream.app_address) {
        Ok(authority) => authority,
        Err(e) => {
            tracing::error!(error = %e, "Invalid upstream address");
            metrics::record_request(&method, 502, start);
            return (StatusCode::BAD_GATEWAY, "Upstream unavailable").into_response();
        }
    };

    let (mut parts, body) = request.into_parts();
    let original_host = parts.headers.get("host").cloned();

    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Some(authority);
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    parts.uri = match Uri::from_parts(uri_parts) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build upstream URI");
            metrics::record_request(&method, 502, start);
            return (StatusCode::BAD_GATEWAY, "Upstream unavailable").into_response();
        }
    };

    // Forwarding headers: the application still needs the original
    // host (tenant subdomain) and the caller address.
    if let Ok(value) = HeaderValue::from_str(&addr.ip().to_string()) {
        parts.headers.insert("x-forwarded-for", value);
    }
    parts
        .headers
        .insert("x-forwarded-proto", HeaderValue::from_static("http"));
    if let Some(host) = original_host {
        parts.headers.insert("x-forwarded-host", host);
    }

    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => {
            let status = response.status();
            metrics::record_request(&method, status.as_u16(), start);
            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(request_id = %id, error = %e, "Upstream error");
            metrics::record_request(&method, 502, start);
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}
