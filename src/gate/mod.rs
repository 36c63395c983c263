//! Request-time authorization gate.
//!
//! # Data Flow
//! ```text
//! Request (path, headers)
//!     → normalise path
//!     → PathClassifier
//!         public / static  → Allow (sign-in page: verify, bounce signed-in users)
//!         api / protected  → DecisionCache
//!                               hit  → replay decision
//!                               miss → SessionVerifier → route() → store
//!     → responder.rs materialises the decision
//! ```
//!
//! # Design Decisions
//! - Verifier and cache are injected, so either can be swapped or wrapped
//! - Config errors are never cached; they are re-derived on every request
//! - Everything up to the responder is free of side effects except the cache

pub mod cache;
pub mod responder;

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::http::HeaderMap;

use crate::config::GateConfig;
use crate::observability::metrics;
use crate::routing::{normalize_path, route, PathClassification, PathClassifier, RouterPaths, RoutingDecision};
use crate::security::cookies::find_cookie;
use crate::security::{Secret, SessionPayload, SessionVerifier, TokenError, TokenVerifier};

pub use cache::{CacheKey, CacheStats, DecisionCache, InMemoryDecisionCache};
pub use responder::Responder;

/// Outcome of evaluating one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// Normalised request path.
    pub path: String,
    pub classification: PathClassification,
    pub decision: RoutingDecision,
    /// Whether the decision was replayed from the cache.
    pub cached: bool,
}

/// The authorization gate. Cheap to share behind an `Arc`.
pub struct Gate {
    classifier: PathClassifier,
    verifier: Arc<dyn SessionVerifier>,
    cache: Arc<dyn DecisionCache>,
    paths: RouterPaths,
    cookie_name: String,
}

impl Gate {
    pub fn new(
        config: &GateConfig,
        verifier: Arc<dyn SessionVerifier>,
        cache: Arc<dyn DecisionCache>,
    ) -> Self {
        Self {
            classifier: PathClassifier::from_config(&config.paths),
            verifier,
            cache,
            paths: RouterPaths {
                sign_in: normalize_path(&config.paths.sign_in),
            },
            cookie_name: config.session.cookie_name.clone(),
        }
    }

    /// Gate with an HS256 verifier for `secret` and an in-memory cache.
    pub fn from_config(config: &GateConfig, secret: &Secret) -> Self {
        let verifier = TokenVerifier::new(secret);
        if let Some(e) = verifier.config_error() {
            tracing::error!(error = %e, "Token verification unavailable, gated paths will answer 500");
        }
        let cache = InMemoryDecisionCache::new(
            Duration::from_millis(config.cache.ttl_ms),
            config.cache.capacity,
        );
        Self::new(config, Arc::new(verifier), Arc::new(cache))
    }

    /// Evaluate a request against the current wall clock.
    pub fn evaluate(&self, path: &str, headers: &HeaderMap) -> Evaluation {
        self.evaluate_at(path, headers, unix_now())
    }

    /// Evaluate a request as of `now` (seconds since the Unix epoch).
    pub fn evaluate_at(&self, path: &str, headers: &HeaderMap, now: u64) -> Evaluation {
        let path = normalize_path(path);
        let classification = self.classifier.classify_request(&path, headers);
        let token = find_cookie(headers, &self.cookie_name);

        let (decision, cached) = match classification {
            PathClassification::StaticAsset => (RoutingDecision::Allow, false),
            PathClassification::Public => {
                let decision = match token {
                    Some(_) if path == self.paths.sign_in => {
                        let verification = self.verify(token, now);
                        route(&path, classification, &verification, &self.paths)
                    }
                    _ => RoutingDecision::Allow,
                };
                (decision, false)
            }
            PathClassification::ApiRoute | PathClassification::Protected => {
                let key = CacheKey::new(&path, token);
                if let Some(decision) = self.cache.get(&key) {
                    metrics::record_cache_lookup(true);
                    (decision, true)
                } else {
                    metrics::record_cache_lookup(false);
                    let verification = self.verify(token, now);
                    let decision = route(&path, classification, &verification, &self.paths);
                    if decision != RoutingDecision::ConfigError {
                        self.cache.put(key, decision.clone());
                    }
                    (decision, false)
                }
            }
        };

        metrics::record_decision(decision.kind(), classification.as_str());
        if decision == RoutingDecision::ConfigError {
            tracing::error!(path = %path, "Rejecting request, token verification is misconfigured");
        } else {
            tracing::debug!(
                path = %path,
                classification = %classification,
                decision = decision.kind(),
                cached,
                "Gate decision"
            );
        }

        Evaluation {
            path,
            classification,
            decision,
            cached,
        }
    }

    /// True when no token can ever verify (missing or short secret).
    pub fn is_misconfigured(&self) -> bool {
        matches!(self.verifier.verify(None, 0), Err(TokenError::Config(_)))
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn sign_in_path(&self) -> &str {
        &self.paths.sign_in
    }

    fn verify(&self, token: Option<&str>, now: u64) -> Result<SessionPayload, TokenError> {
        let verification = self.verifier.verify(token, now);
        if let Err(e) = &verification {
            metrics::record_token_failure(e.reason());
        }
        verification
    }
}

/// Seconds since the Unix epoch.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
