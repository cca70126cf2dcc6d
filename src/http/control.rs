//! Control endpoints hosted by the gate itself.
//!
//! Two small surfaces live here rather than upstream because they need
//! the gate's credential primitives:
//!
//! - `POST /api/auth/pin/verify` forwards the PIN to the auth service
//!   and, on success, issues the step-up cookie on the response. The
//!   gate signs step-up tokens, so the cookie has to be set here.
//! - `GET /internal/access/{feature}` runs the feature access gate for
//!   upstream business handlers and returns the decision as JSON.

use axum::{
    extract::{Path, State},
    http::{header::SET_COOKIE, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::http::server::AppState;
use crate::security::session::cookie_value;

/// Liveness probe.
pub async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
pub struct PinVerifyRequest {
    pub pin: String,
}

/// Auth service response for a successful PIN verification.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PinVerifyUpstream {
    tenant_id: String,
    credential_version: u32,
}

/// Verify a PIN against the auth service and issue the step-up cookie.
///
/// The gate never sees whether the PIN was right beyond the upstream
/// status code, and never stores anything: the cookie is the only
/// artifact.
pub async fn pin_verify(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<PinVerifyRequest>,
) -> Response {
    let session = match state.sessions.authenticate(&headers) {
        Ok(session) => session,
        Err(_) => {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "UNAUTHENTICATED" })),
            )
                .into_response();
        }
    };

    let url = format!("{}/v1/auth/pin/verify", state.config.upstream.auth_base);
    let upstream = state
        .internal
        .post(&url)
        .json(&json!({ "pin": body.pin, "userId": session.user_id }))
        .send()
        .await;

    let response = match upstream {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "PIN verification upstream unreachable");
            return (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "Verification service unavailable" })),
            )
                .into_response();
        }
    };

    if !response.status().is_success() {
        // Pass the upstream's answer through (wrong PIN, locked, ...).
        let status = StatusCode::from_u16(response.status().as_u16())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        let body = response
            .json::<serde_json::Value>()
            .await
            .unwrap_or_else(|_| json!({ "error": "PIN verification failed" }));
        return (status, Json(body)).into_response();
    }

    let verified: PinVerifyUpstream = match response.json().await {
        Ok(verified) => verified,
        Err(e) => {
            tracing::error!(error = %e, "PIN verification upstream returned an unreadable body");
            return (
                StatusCode::BAD_GATEWAY,
                Json(json!({ "error": "Verification service unavailable" })),
            )
                .into_response();
        }
    };

    let token = match state
        .stepup
        .issue(&verified.tenant_id, verified.credential_version)
    {
        Ok(token) => token,
        Err(e) => {
            tracing::error!(error = %e, "Failed to issue step-up credential");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let cookie = state.stepup.cookie(&token);
    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            tracing::info!(tenant = %verified.tenant_id, user = %session.user_id, "Step-up credential issued");
            let mut response = Json(json!({ "verified": true })).into_response();
            response.headers_mut().insert(SET_COOKIE, value);
            response
        }
        Err(_) => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

/// Run the feature access gate for a tenant.
///
/// Callers (upstream business handlers) forward the original request's
/// cookies and name the tenant explicitly via `X-Tenant-Id`.
pub async fn access_check(
    State(state): State<AppState>,
    Path(feature): Path<String>,
    headers: HeaderMap,
) -> Response {
    let tenant = headers
        .get("x-tenant-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let Some(tenant) = tenant else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "X-Tenant-Id header required" })),
        )
            .into_response();
    };

    let stepup_token = cookie_value(&headers, state.stepup.cookie_name());
    let result = state
        .gate
        .check(&tenant, &feature, stepup_token.as_deref())
        .await;

    Json(result).into_response()
}
