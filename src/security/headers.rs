//! Static security response headers.
//!
//! These are deployment configuration, not computed state: the same
//! fixed set is attached to every response that makes it past tenant
//! resolution. HSTS is only meaningful behind TLS, so it is limited to
//! production.

use axum::http::header::{
    HeaderMap, HeaderName, HeaderValue, CONTENT_SECURITY_POLICY, REFERRER_POLICY,
    STRICT_TRANSPORT_SECURITY, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS,
};

use crate::config::schema::SecurityHeadersConfig;

fn insert(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}

/// Attach the configured security headers to a response header map.
pub fn apply_security_headers(
    headers: &mut HeaderMap,
    config: &SecurityHeadersConfig,
    production: bool,
) {
    if !config.enabled {
        return;
    }

    insert(headers, CONTENT_SECURITY_POLICY, &config.content_security_policy);
    insert(headers, X_FRAME_OPTIONS, &config.frame_options);
    insert(headers, X_CONTENT_TYPE_OPTIONS, "nosniff");
    insert(headers, REFERRER_POLICY, &config.referrer_policy);
    insert(
        headers,
        HeaderName::from_static("permissions-policy"),
        &config.permissions_policy,
    );

    if production {
        insert(
            headers,
            STRICT_TRANSPORT_SECURITY,
            &format!("max-age={}; includeSubDomains", config.hsts_max_age_secs),
        );
    }
}
