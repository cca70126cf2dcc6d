//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the edge
//! gate. All types derive Serde traits for deserialization from config
//! files, and every section has a default so a minimal config boots a
//! development instance.

use serde::{Deserialize, Serialize};

/// Root configuration for the edge gate.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EdgeConfig {
    /// Deployment environment (affects cookie flags, HSTS, redirects).
    pub environment: Environment,

    /// Listener configuration (bind address, connection limits).
    pub listener: ListenerConfig,

    /// Upstream application and control-plane addresses.
    pub upstream: UpstreamConfig,

    /// Tenant routing: root domain, reserved names, directory file.
    pub tenancy: TenancyConfig,

    /// Static asset prefixes that bypass the pipeline.
    pub assets: AssetConfig,

    /// Fixed-window rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Session cookie names, signing secret, protected routes.
    pub session: SessionConfig,

    /// Step-up (PIN) credential settings.
    pub stepup: StepUpConfig,

    /// Feature sensitivity table for the access gate.
    pub access: AccessConfig,

    /// Static security response headers.
    pub security_headers: SecurityHeadersConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// Maximum request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
            max_body_size: 2 * 1024 * 1024,
        }
    }
}

/// Upstream addresses the gate forwards to and consults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Application server the gate forwards allowed requests to.
    pub app_address: String,

    /// Base URL of the auth service (PIN verification).
    pub auth_base: String,

    /// Base URL of the platform internal API (tenant security state).
    pub internal_api_base: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            app_address: "127.0.0.1:3000".to_string(),
            auth_base: "http://127.0.0.1:3011".to_string(),
            internal_api_base: "http://127.0.0.1:3010".to_string(),
        }
    }
}

/// Tenant routing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TenancyConfig {
    /// Platform root domain; stores live on subdomains of it.
    pub root_domain: String,

    /// Subdomains that are never tenant lookups.
    pub reserved_subdomains: Vec<String>,

    /// Path to the tenant directory file (hot reloaded).
    pub directory_path: String,

    /// Page path unknown store subdomains are rewritten to.
    pub store_not_found_path: String,
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            root_domain: "vayva.shop".to_string(),
            reserved_subdomains: vec![
                "admin".to_string(),
                "app".to_string(),
                "api".to_string(),
                "status".to_string(),
                "mail".to_string(),
            ],
            directory_path: "tenants.toml".to_string(),
            store_not_found_path: "/store-not-found".to_string(),
        }
    }
}

/// Static asset configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AssetConfig {
    /// Path prefixes served without tenant resolution or gating.
    pub static_prefixes: Vec<String>,
}

impl AssetConfig {
    /// True if the path is a static asset path.
    pub fn is_static(&self, path: &str) -> bool {
        self.static_prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            static_prefixes: vec![
                "/_assets/".to_string(),
                "/static/".to_string(),
                "/favicon.ico".to_string(),
                "/robots.txt".to_string(),
            ],
        }
    }
}

/// Rate limiting configuration (fixed window).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Window duration in seconds.
    pub window_secs: u64,

    /// Requests per window for general API traffic.
    pub api_limit: u32,

    /// Requests per window for auth endpoints (strictly lower).
    pub auth_limit: u32,

    /// Path prefixes limited under the API category.
    pub api_prefixes: Vec<String>,

    /// Path prefixes limited under the auth category.
    pub auth_prefixes: Vec<String>,

    /// Tracked key ceiling; expired windows are swept past this.
    pub max_keys: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_secs: 60,
            api_limit: 120,
            auth_limit: 20,
            api_prefixes: vec!["/api/".to_string()],
            auth_prefixes: vec!["/api/auth/".to_string()],
            max_keys: 10_000,
        }
    }
}

/// Session authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Current session cookie name.
    pub cookie_name: String,

    /// Legacy session cookie name, still accepted during migration.
    pub legacy_cookie_name: String,

    /// HS256 signing secret for session tokens.
    pub secret: String,

    /// Sign-in page unauthenticated callers are redirected to.
    pub signin_path: String,

    /// Path prefixes that require a valid session.
    pub protected_prefixes: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "vayva_session".to_string(),
            legacy_cookie_name: "vayva_token".to_string(),
            // WARNING: Placeholder. Rejected by validation in production.
            secret: "dev-session-secret-change-me".to_string(),
            signin_path: "/signin".to_string(),
            protected_prefixes: vec![
                "/admin".to_string(),
                "/api/admin".to_string(),
                "/onboarding".to_string(),
            ],
        }
    }
}

/// Step-up (PIN) credential configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StepUpConfig {
    /// Step-up cookie name.
    pub cookie_name: String,

    /// HS256 signing secret for step-up tokens.
    pub secret: String,

    /// Absolute credential lifetime in seconds.
    pub ttl_secs: u64,
}

impl Default for StepUpConfig {
    fn default() -> Self {
        Self {
            cookie_name: "vayva_stepup".to_string(),
            // WARNING: Placeholder. Rejected by validation in production.
            secret: "dev-stepup-secret-change-me".to_string(),
            ttl_secs: 30 * 60,
        }
    }
}

/// One row of the feature sensitivity table.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeatureRule {
    /// Feature name, e.g. "wallet.withdraw".
    pub name: String,

    /// Requires a valid step-up (PIN) credential.
    #[serde(default)]
    pub pin: bool,

    /// Requires verified KYC status.
    #[serde(default)]
    pub kyc: bool,

    /// Requires an active or trialing subscription.
    #[serde(default)]
    pub subscription: bool,
}

/// Feature access gate configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AccessConfig {
    /// The sensitivity table. Features absent from it are ungated.
    pub features: Vec<FeatureRule>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            features: vec![
                FeatureRule {
                    name: "wallet.withdraw".to_string(),
                    pin: true,
                    kyc: true,
                    subscription: true,
                },
                FeatureRule {
                    name: "wallet.view".to_string(),
                    pin: false,
                    kyc: true,
                    subscription: false,
                },
                FeatureRule {
                    name: "payouts.account.update".to_string(),
                    pin: true,
                    kyc: true,
                    subscription: false,
                },
                FeatureRule {
                    name: "store.credentials.rotate".to_string(),
                    pin: true,
                    kyc: false,
                    subscription: false,
                },
                FeatureRule {
                    name: "store.domain.connect".to_string(),
                    pin: false,
                    kyc: false,
                    subscription: true,
                },
                FeatureRule {
                    name: "billing.manage".to_string(),
                    pin: false,
                    kyc: false,
                    subscription: true,
                },
            ],
        }
    }
}

/// Static security response headers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityHeadersConfig {
    /// Enable security headers.
    pub enabled: bool,

    /// Content-Security-Policy value.
    pub content_security_policy: String,

    /// X-Frame-Options value.
    pub frame_options: String,

    /// Referrer-Policy value.
    pub referrer_policy: String,

    /// Permissions-Policy value.
    pub permissions_policy: String,

    /// Strict-Transport-Security max-age (production only).
    pub hsts_max_age_secs: u64,
}

impl Default for SecurityHeadersConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            content_security_policy: "default-src 'self'; frame-ancestors 'none'"
                .to_string(),
            frame_options: "DENY".to_string(),
            referrer_policy: "strict-origin-when-cross-origin".to_string(),
            permissions_policy: "camera=(), microphone=(), geolocation=()".to_string(),
            hsts_max_age_secs: 31_536_000,
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_coherent() {
        let config = EdgeConfig::default();
        assert!(config.rate_limit.auth_limit < config.rate_limit.api_limit);
        assert_eq!(config.stepup.ttl_secs, 1800);
        assert!(config.assets.is_static("/static/app.css"));
        assert!(config.assets.is_static("/favicon.ico"));
        assert!(!config.assets.is_static("/api/orders"));
    }

    #[test]
    fn minimal_toml_parses_with_defaults() {
        let config: EdgeConfig = toml::from_str(
            r#"
            environment = "production"

            [tenancy]
            root_domain = "example.shop"
            "#,
        )
        .expect("minimal config should parse");

        assert!(config.environment.is_production());
        assert_eq!(config.tenancy.root_domain, "example.shop");
        // Untouched sections keep their defaults.
        assert_eq!(config.session.cookie_name, "vayva_session");
        assert_eq!(config.rate_limit.window_secs, 60);
    }

    #[test]
    fn feature_table_rows_parse() {
        let config: EdgeConfig = toml::from_str(
            r#"
            [[access.features]]
            name = "wallet.withdraw"
            pin = true
            kyc = true
            subscription = true

            [[access.features]]
            name = "reports.export"
            subscription = true
            "#,
        )
        .expect("feature rows should parse");

        assert_eq!(config.access.features.len(), 2);
        let export = &config.access.features[1];
        assert!(!export.pin);
        assert!(!export.kyc);
        assert!(export.subscription);
    }
}
