//! Process lifecycle.
//!
//! ```text
//! SIGTERM / Ctrl-C (signals.rs)
//!     → Shutdown::trigger (shutdown.rs)
//!     → public listener, admin listener and reload loop drain and exit
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::shutdown_signal;
