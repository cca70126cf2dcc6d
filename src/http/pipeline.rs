//! The per-request gate pipeline.
//!
//! # Responsibilities
//! - Sequence the gate stages for every inbound request: tenant
//!   resolution → security headers → rate limit → session guard
//! - Short-circuit on the first rejecting stage; a denial is final
//!
//! # Design Decisions
//! - Each stage is an axum middleware so the ordering is visible in one
//!   place (`http::server::build_router`) instead of scattered branches
//! - The pipeline completes synchronously before any forwarding happens;
//!   nothing here defers work past the gate decision

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{
        header::{HeaderValue, LOCATION},
        uri::{PathAndQuery, Uri},
        Request, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::server::AppState;
use crate::observability::metrics;
use crate::tenancy::resolver::{resolve, ResolutionAction};

/// Host the request was addressed to, with the Host header taking
/// priority over the URI authority (HTTP/2).
fn request_host(request: &Request<Body>) -> Option<String> {
    request
        .headers()
        .get("host")
        .and_then(|h| h.to_str().ok())
        .map(|h| h.to_string())
        .or_else(|| request.uri().authority().map(|a| a.to_string()))
}

/// Swap the request path, keeping the original query string.
fn rewrite_request_path(request: &mut Request<Body>, new_path: &str) {
    let path_and_query = match request.uri().query() {
        Some(query) => format!("{new_path}?{query}"),
        None => new_path.to_string(),
    };

    let mut parts = request.uri().clone().into_parts();
    match path_and_query.parse::<PathAndQuery>() {
        Ok(pq) => parts.path_and_query = Some(pq),
        Err(_) => return, // keep the original path over producing a broken URI
    }
    if let Ok(uri) = Uri::from_parts(parts) {
        *request.uri_mut() = uri;
    }
}

fn path_is_protected(state: &AppState, path: &str) -> bool {
    state
        .config
        .session
        .protected_prefixes
        .iter()
        .any(|p| path.starts_with(p.as_str()))
}

/// Stage 1: tenant resolution.
///
/// Static asset paths skip resolution entirely. Everything else is
/// resolved against the current directory snapshot; rewrite and
/// not-found decisions mutate the request path and continue, redirects
/// terminate here.
pub async fn tenant_resolution(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if state.config.assets.is_static(&path) {
        return next.run(request).await;
    }

    let Some(host) = request_host(&request) else {
        // Host-less requests cannot belong to a store; let the platform
        // answer them.
        return next.run(request).await;
    };

    let directory = state.directory.snapshot();
    let decision = resolve(
        &host,
        &path,
        request.uri().query(),
        &directory,
        &state.config.tenancy,
        &state.config.assets,
        state.config.environment,
    );
    metrics::record_resolution(decision.action.as_str());

    match decision.action {
        ResolutionAction::Pass => next.run(request).await,
        ResolutionAction::Rewrite => {
            let destination = decision.destination.unwrap_or(path);
            tracing::debug!(host = %host, destination = %destination, "Rewriting custom domain request");
            rewrite_request_path(&mut request, &destination);
            next.run(request).await
        }
        ResolutionAction::Redirect => {
            let destination = decision.destination.unwrap_or_else(|| "/".to_string());
            match HeaderValue::from_str(&destination) {
                Ok(location) => {
                    let mut response = StatusCode::PERMANENT_REDIRECT.into_response();
                    response.headers_mut().insert(LOCATION, location);
                    response
                }
                Err(_) => StatusCode::BAD_REQUEST.into_response(),
            }
        }
        ResolutionAction::NotFound => {
            let destination = decision
                .destination
                .unwrap_or_else(|| state.config.tenancy.store_not_found_path.clone());
            tracing::info!(host = %host, "Unknown store, routing to not-found page");
            rewrite_request_path(&mut request, &destination);
            next.run(request).await
        }
    }
}

/// Stage 2: static security response headers.
pub async fn security_headers(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    crate::security::headers::apply_security_headers(
        response.headers_mut(),
        &state.config.security_headers,
        state.config.environment.is_production(),
    );
    response
}

/// Stage 3: fixed-window rate limiting for API and auth prefixes.
pub async fn rate_limit(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(category) = state.limiter.categorize(request.uri().path()) else {
        return next.run(request).await;
    };

    let decision = state.limiter.check(addr.ip(), category);
    let limit = HeaderValue::from(decision.limit);
    let remaining = HeaderValue::from(decision.remaining);

    if decision.allowed {
        let mut response = next.run(request).await;
        let headers = response.headers_mut();
        headers.insert("x-ratelimit-limit", limit);
        headers.insert("x-ratelimit-remaining", remaining);
        return response;
    }

    tracing::warn!(
        client = %addr.ip(),
        category = category.as_str(),
        "Rate limit exceeded"
    );
    metrics::record_rate_limited(category.as_str());

    // Machine-readable denial: API callers get headers, not a page.
    let mut response = Response::new(Body::from("Rate limit exceeded"));
    *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", limit);
    headers.insert("x-ratelimit-remaining", remaining);
    headers.insert(
        "retry-after",
        HeaderValue::from(decision.retry_after.as_secs()),
    );
    response
}

/// Stage 4: session guard for protected route prefixes.
///
/// Unauthenticated callers are redirected to sign-in with the original
/// destination as `callbackUrl` so they land back where they started.
pub async fn session_guard(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if !path_is_protected(&state, path) {
        return next.run(request).await;
    }

    match state.sessions.authenticate(request.headers()) {
        Ok(session) => {
            request.extensions_mut().insert(session);
            next.run(request).await
        }
        Err(e) => {
            tracing::debug!(path = %path, reason = %e, "Redirecting unauthenticated request to sign-in");
            metrics::record_auth_redirect();
            signin_redirect(&state, &request)
        }
    }
}

fn signin_redirect(state: &AppState, request: &Request<Body>) -> Response {
    let callback = match request.uri().query() {
        Some(query) => format!("{}?{}", request.uri().path(), query),
        None => request.uri().path().to_string(),
    };
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("callbackUrl", &callback)
        .finish();
    let destination = format!("{}?{}", state.config.session.signin_path, query);

    match HeaderValue::from_str(&destination) {
        Ok(location) => {
            let mut response = StatusCode::TEMPORARY_REDIRECT.into_response();
            response.headers_mut().insert(LOCATION, location);
            response
        }
        Err(_) => StatusCode::UNAUTHORIZED.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[test]
    fn rewrite_keeps_the_query_string() {
        let mut req = request("http://acme.vayva.shop/products?page=2");
        rewrite_request_path(&mut req, "/store/tn_acme/products");
        assert_eq!(req.uri().path(), "/store/tn_acme/products");
        assert_eq!(req.uri().query(), Some("page=2"));
    }

    #[test]
    fn rewrite_without_query() {
        let mut req = request("http://acme.vayva.shop/");
        rewrite_request_path(&mut req, "/store-not-found");
        assert_eq!(req.uri().path(), "/store-not-found");
        assert_eq!(req.uri().query(), None);
    }

    #[test]
    fn host_header_wins_over_authority() {
        let req = Request::builder()
            .uri("http://authority.example/x")
            .header("host", "header.example")
            .body(Body::empty())
            .unwrap();
        assert_eq!(request_host(&req).as_deref(), Some("header.example"));
    }
}
