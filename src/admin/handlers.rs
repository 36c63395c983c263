use axum::{extract::State, Json};
use serde::Serialize;

use crate::gate::CacheStats;
use crate::http::server::AppState;

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub upstream: String,
    pub sign_in: String,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let runtime = state.runtime.load_full();
    let status = if runtime.gate.is_misconfigured() {
        "misconfigured"
    } else {
        "operational"
    };
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status,
        upstream: runtime.config.upstream.url.clone(),
        sign_in: runtime.gate.sign_in_path().to_string(),
    })
}

pub async fn get_cache(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.runtime.load().gate.cache_stats())
}
