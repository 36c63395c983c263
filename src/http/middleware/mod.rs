//! Axum middleware.

pub mod gate;

pub use gate::gate_middleware;
