//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gate.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the authorization gate.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GateConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Application server that allowed requests are forwarded to.
    pub upstream: UpstreamConfig,

    /// Session cookie and identity header settings.
    pub session: SessionConfig,

    /// Path classification settings.
    pub paths: PathsConfig,

    /// Decision cache settings.
    pub cache: CacheConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    pub admin: AdminConfig,

    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Upstream application server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL, scheme and authority only (e.g., "http://127.0.0.1:3000").
    pub url: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:3000".to_string(),
        }
    }
}

/// Session cookie, signing secret and identity headers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name of the cookie carrying the session token.
    pub cookie_name: String,

    /// Environment variable holding the token signing secret.
    pub secret_env: String,

    /// Header carrying the verified subject id to API handlers.
    pub subject_header: String,

    /// Header carrying the verified role to API handlers.
    pub role_header: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "session".to_string(),
            secret_env: "JWT_SECRET".to_string(),
            subject_header: "x-user-id".to_string(),
            role_header: "x-user-role".to_string(),
        }
    }
}

/// Path classification rules.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Sign-in page; unauthenticated callers are redirected here.
    pub sign_in: String,

    /// Paths reachable without a session (exact match or sub-path).
    pub public: Vec<String>,

    /// Build-output prefixes served as static assets.
    pub static_prefixes: Vec<String>,

    /// File extensions (without the dot) served as static assets.
    pub static_extensions: Vec<String>,

    /// API namespace prefix.
    pub api_prefix: String,

    /// Request headers marking a speculative prefetch.
    pub prefetch_headers: Vec<String>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            sign_in: "/sign-in".to_string(),
            public: [
                "/sign-in",
                "/sign-up",
                "/forgot-password",
                "/reset-password",
                "/health",
                "/about",
                "/contact",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            static_prefixes: vec!["/_next/".to_string(), "/static/".to_string()],
            static_extensions: [
                "ico", "css", "js", "map", "png", "jpg", "jpeg", "gif", "svg", "webp", "avif",
                "woff", "woff2", "ttf", "txt", "webmanifest",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            api_prefix: "/api".to_string(),
            prefetch_headers: vec![
                "next-router-prefetch".to_string(),
                "x-middleware-prefetch".to_string(),
            ],
        }
    }
}

/// Decision cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// How long a routing decision may be replayed, in milliseconds.
    pub ttl_ms: u64,

    /// Maximum number of cached decisions (LRU eviction beyond this).
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 1000,
            capacity: 10_000,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
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

/// Placeholder admin key; rejected by validation when the admin API is enabled.
pub const ADMIN_KEY_PLACEHOLDER: &str = "CHANGE_ME_IN_PRODUCTION";

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: ADMIN_KEY_PLACEHOLDER.to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}
