//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, layers)
//!     → request.rs (request ID)
//!     → middleware/gate.rs (authorization gate, responder)
//!     → server.rs proxy handler (forward to upstream)
//!     → Send to client
//! ```

pub mod middleware;
pub mod request;
pub mod server;

pub use request::{request_id, rewrite_path, UuidRequestId, X_REQUEST_ID};
pub use server::{AppState, GateRuntime, HttpServer, SecretSource};
