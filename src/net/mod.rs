//! Network layer: TLS termination for the public listener.

pub mod tls;

pub use tls::load_tls_config;
