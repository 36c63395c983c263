//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → cookies.rs (extract the session cookie)
//!     → token.rs (verify signature and expiry, decode the session)
//!     → roles.rs (map the role to its dashboard)
//!     → Pass to the role router
//! ```
//!
//! # Design Decisions
//! - Fail closed: a missing or short secret is a 500 for every gated request
//! - Verification is pure; the clock is an argument
//! - Token contents and secrets never reach a response body or a log line

pub mod cookies;
pub mod roles;
pub mod token;

pub use roles::RoleId;
pub use token::{
    verify, Secret, SecretError, SessionPayload, SessionVerifier, TokenError, TokenVerifier,
    MIN_SECRET_LEN,
};
