//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (TTL > 0, capacity > 0, timeouts > 0)
//! - Check that every configured path is absolute
//! - Check the upstream URL is usable for forwarding
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GateConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use crate::config::schema::{GateConfig, ADMIN_KEY_PLACEHOLDER};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            "must be a socket address",
        ));
    }

    match url::Url::parse(&config.upstream.url) {
        Ok(url) => {
            if url.scheme() != "http" {
                errors.push(ValidationError::new("upstream.url", "scheme must be http"));
            }
            if url.host_str().is_none() {
                errors.push(ValidationError::new("upstream.url", "must include a host"));
            }
        }
        Err(e) => errors.push(ValidationError::new("upstream.url", e.to_string())),
    }

    if config.session.cookie_name.trim().is_empty() {
        errors.push(ValidationError::new("session.cookie_name", "must not be empty"));
    }
    if config.session.secret_env.trim().is_empty() {
        errors.push(ValidationError::new("session.secret_env", "must not be empty"));
    }
    for (field, name) in [
        ("session.subject_header", &config.session.subject_header),
        ("session.role_header", &config.session.role_header),
    ] {
        if axum::http::HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::new(field, "must be a valid header name"));
        }
    }

    check_absolute(&mut errors, "paths.sign_in", &config.paths.sign_in);
    check_absolute(&mut errors, "paths.api_prefix", &config.paths.api_prefix);
    for path in &config.paths.public {
        check_absolute(&mut errors, "paths.public", path);
    }
    for prefix in &config.paths.static_prefixes {
        check_absolute(&mut errors, "paths.static_prefixes", prefix);
    }
    if config.paths.api_prefix == "/" {
        errors.push(ValidationError::new("paths.api_prefix", "must not be the root path"));
    }
    if !config.paths.public.iter().any(|p| p == &config.paths.sign_in) {
        errors.push(ValidationError::new(
            "paths.public",
            "must contain the sign-in path",
        ));
    }

    if config.cache.ttl_ms == 0 {
        errors.push(ValidationError::new("cache.ttl_ms", "must be greater than zero"));
    }
    if config.cache.capacity == 0 {
        errors.push(ValidationError::new("cache.capacity", "must be greater than zero"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than zero"));
    }

    if config.admin.enabled {
        if config.admin.api_key.is_empty() || config.admin.api_key == ADMIN_KEY_PLACEHOLDER {
            errors.push(ValidationError::new(
                "admin.api_key",
                "must be set when the admin API is enabled",
            ));
        }
        if config.admin.bind_address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(ValidationError::new("admin.bind_address", "must be a socket address"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_absolute(errors: &mut Vec<ValidationError>, field: &str, path: &str) {
    if !path.starts_with('/') {
        errors.push(ValidationError::new(field, format!("'{}' must start with '/'", path)));
    }
}
