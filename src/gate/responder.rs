//! Turns routing decisions into HTTP effects.
//!
//! This is the only part of the gate that touches requests and responses:
//! identity headers, redirects, cookie clearing and the fixed 500 body.

use axum::body::Body;
use axum::http::header::{CACHE_CONTROL, LOCATION, SET_COOKIE};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request, StatusCode};
use axum::response::{IntoResponse, Json, Response};

use crate::config::SessionConfig;
use crate::routing::RoutingDecision;
use crate::security::cookies::clearing_cookie;

/// What to do with the request after the gate has decided.
pub enum Outcome {
    /// Pass the (possibly rewritten) request downstream.
    Forward(Request<Body>),
    /// Answer directly.
    Respond(Response),
}

#[derive(Debug, Clone)]
pub struct Responder {
    subject_header: HeaderName,
    role_header: HeaderName,
    clear_cookie: HeaderValue,
    fallback_location: HeaderValue,
}

impl Responder {
    pub fn new(session: &SessionConfig, sign_in: &str) -> Self {
        Self {
            subject_header: header_name(&session.subject_header, "x-user-id"),
            role_header: header_name(&session.role_header, "x-user-role"),
            clear_cookie: HeaderValue::from_str(&clearing_cookie(&session.cookie_name))
                .unwrap_or_else(|_| HeaderValue::from_static("session=; Path=/; Max-Age=0")),
            fallback_location: HeaderValue::from_str(sign_in)
                .unwrap_or_else(|_| HeaderValue::from_static("/")),
        }
    }

    /// Apply `decision` to `request`.
    pub fn respond(&self, decision: RoutingDecision, mut request: Request<Body>) -> Outcome {
        match decision {
            RoutingDecision::Allow => {
                self.strip_identity(request.headers_mut());
                Outcome::Forward(request)
            }
            RoutingDecision::AllowWithHeaders { subject_id, role } => {
                let headers = request.headers_mut();
                self.strip_identity(headers);
                match (
                    HeaderValue::from_str(&subject_id),
                    HeaderValue::from_str(role.as_str()),
                ) {
                    (Ok(subject), Ok(role)) => {
                        headers.insert(self.subject_header.clone(), subject);
                        headers.insert(self.role_header.clone(), role);
                    }
                    _ => {
                        tracing::warn!("Verified identity is not representable as a header, forwarding without it");
                    }
                }
                Outcome::Forward(request)
            }
            RoutingDecision::RedirectTo {
                location,
                clear_cookie,
            } => Outcome::Respond(self.redirect(&location, clear_cookie)),
            RoutingDecision::ConfigError => Outcome::Respond(config_error_response()),
        }
    }

    fn strip_identity(&self, headers: &mut HeaderMap) {
        headers.remove(&self.subject_header);
        headers.remove(&self.role_header);
    }

    fn redirect(&self, location: &str, clear_cookie: bool) -> Response {
        let location = HeaderValue::from_str(location).unwrap_or_else(|_| self.fallback_location.clone());
        let mut response = StatusCode::TEMPORARY_REDIRECT.into_response();
        let headers = response.headers_mut();
        headers.insert(LOCATION, location);
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        if clear_cookie {
            headers.insert(SET_COOKIE, self.clear_cookie.clone());
        }
        response
    }
}

/// Fixed 500 answer for a misconfigured gate. Reveals nothing else.
pub fn config_error_response() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": "server configuration error" })),
    )
        .into_response()
}

fn header_name(name: &str, fallback: &'static str) -> HeaderName {
    HeaderName::from_bytes(name.as_bytes()).unwrap_or_else(|_| HeaderName::from_static(fallback))
}
