//! Request-time authorization gate for a multi-role web portal.

pub mod admin;
pub mod config;
pub mod gate;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;
pub mod security;

pub use config::GateConfig;
pub use gate::Gate;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
