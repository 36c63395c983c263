//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path, headers)
//!     → classifier.rs (public / static / api / protected)
//!     → [token verification, decision cache]
//!     → router.rs (classification × verification → decision)
//!     → Return: RoutingDecision
//!
//! Classifier Compilation (at startup and on reload):
//!     PathsConfig
//!     → Compile matchers (prefixes, subtrees, extension set)
//!     → Freeze as immutable PathClassifier
//! ```
//!
//! # Design Decisions
//! - Classifier compiled at startup, immutable at runtime
//! - No regex in hot path
//! - Deterministic: same input always yields the same decision
//! - Role router is a pure function with an exhaustive match

pub mod classifier;
pub mod router;

pub use classifier::{normalize_path, PathClassification, PathClassifier};
pub use router::{route, RouterPaths, RoutingDecision};
