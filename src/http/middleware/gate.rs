//! Authorization gate middleware.
//! Runs the gate on every request before it reaches the upstream.

use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::Instrument;

use crate::gate::responder::Outcome;
use crate::http::request::{request_id, rewrite_path};
use crate::http::server::AppState;
use crate::observability::metrics;

pub async fn gate_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let runtime = state.runtime.load_full();
    let method = request.method().to_string();
    let span = tracing::debug_span!(
        "gate",
        request_id = %request_id(request.headers()),
        method = %method,
    );

    async move {
        let evaluation = runtime
            .gate
            .evaluate(request.uri().path(), request.headers());

        // The upstream must see the path that was classified.
        if evaluation.path != request.uri().path() {
            match rewrite_path(request.uri(), &evaluation.path) {
                Ok(uri) => {
                    tracing::debug!(from = %request.uri().path(), to = %evaluation.path, "Normalised request path");
                    *request.uri_mut() = uri;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Rejecting request with unusable path");
                    let response = StatusCode::BAD_REQUEST.into_response();
                    metrics::record_request(&method, response.status().as_u16(), start);
                    return response;
                }
            }
        }

        let response = match runtime.responder.respond(evaluation.decision, request) {
            Outcome::Forward(request) => next.run(request).await,
            Outcome::Respond(response) => response,
        };

        metrics::record_request(&method, response.status().as_u16(), start);
        response
    }
    .instrument(span)
    .await
}
