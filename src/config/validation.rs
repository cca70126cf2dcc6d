//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (windows and limits > 0, body size > 0)
//! - Reject placeholder secrets in production
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: EdgeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use crate::config::schema::EdgeConfig;

/// A single semantic validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn err(field: &'static str, message: impl Into<String>) -> ValidationError {
    ValidationError {
        field,
        message: message.into(),
    }
}

/// Validate an [`EdgeConfig`], returning every violation found.
pub fn validate_config(config: &EdgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(err(
            "listener.bind_address",
            format!("not a valid socket address: {}", config.listener.bind_address),
        ));
    }
    if config.listener.max_body_size == 0 {
        errors.push(err("listener.max_body_size", "must be greater than zero"));
    }

    if config.upstream.app_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(err(
            "upstream.app_address",
            format!("not a valid socket address: {}", config.upstream.app_address),
        ));
    }

    if config.tenancy.root_domain.is_empty() {
        errors.push(err("tenancy.root_domain", "must not be empty"));
    }
    if !config.tenancy.store_not_found_path.starts_with('/') {
        errors.push(err(
            "tenancy.store_not_found_path",
            "must be an absolute path",
        ));
    }

    if config.rate_limit.enabled {
        if config.rate_limit.window_secs == 0 {
            errors.push(err("rate_limit.window_secs", "must be greater than zero"));
        }
        if config.rate_limit.api_limit == 0 {
            errors.push(err("rate_limit.api_limit", "must be greater than zero"));
        }
        if config.rate_limit.auth_limit == 0 {
            errors.push(err("rate_limit.auth_limit", "must be greater than zero"));
        }
        if config.rate_limit.auth_limit > config.rate_limit.api_limit {
            errors.push(err(
                "rate_limit.auth_limit",
                "auth limit must not exceed the api limit",
            ));
        }
    }

    if config.stepup.ttl_secs == 0 {
        errors.push(err("stepup.ttl_secs", "must be greater than zero"));
    }

    if config.environment.is_production() {
        if config.session.secret.is_empty() || config.session.secret.starts_with("dev-") {
            errors.push(err(
                "session.secret",
                "placeholder secret is not allowed in production",
            ));
        }
        if config.stepup.secret.is_empty() || config.stepup.secret.starts_with("dev-") {
            errors.push(err(
                "stepup.secret",
                "placeholder secret is not allowed in production",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::Environment;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&EdgeConfig::default()).is_ok());
    }

    #[test]
    fn production_rejects_placeholder_secrets() {
        let mut config = EdgeConfig::default();
        config.environment = Environment::Production;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert!(fields.contains(&"session.secret"));
        assert!(fields.contains(&"stepup.secret"));
    }

    #[test]
    fn zero_window_is_rejected() {
        let mut config = EdgeConfig::default();
        config.rate_limit.window_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "rate_limit.window_secs"));
    }

    #[test]
    fn auth_limit_must_not_exceed_api_limit() {
        let mut config = EdgeConfig::default();
        config.rate_limit.auth_limit = config.rate_limit.api_limit + 1;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "rate_limit.auth_limit"));
    }

    #[test]
    fn all_errors_are_collected() {
        let mut config = EdgeConfig::default();
        config.rate_limit.window_secs = 0;
        config.stepup.ttl_secs = 0;
        config.tenancy.root_domain = String::new();

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.len() >= 3);
    }
}
