//! Lichtblick Testing Infrastructure
//!
//! Mock backend and fixtures shared by the sync engine's tests.
//!
//! ```rust,ignore
//! use lichtblick_testkit::*;
//!
//! #[tokio::test]
//! async fn likes_locally_without_endpoint() {
//!     let backend = MockBackend::legacy();
//!     let engine = engine(&backend);
//!     engine.toggle_like(&post("p1")).await.unwrap();
//! }
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![deny(missing_docs)]

pub mod fixtures;
pub mod mock_backend;

pub use fixtures::*;
pub use mock_backend::{ApiCall, FeatureBehavior, MockBackend, Scripted};

/// Install a test-friendly tracing subscriber once per process.
///
/// Honours `RUST_LOG`; defaults to warnings only.
pub fn init_test_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
