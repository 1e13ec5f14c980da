//! Infrastructure layer - host adapters.
//!
//! This layer provides adapters for:
//! - Timer queue on the tokio runtime
//! - Test doubles (virtual-time timer queue, mock clock, capture layer)

#[cfg(feature = "async")]
pub mod tokio_timer;

/// Mock implementations for testing.
///
/// This module is only available when the `test-helpers` feature is enabled,
/// or during test builds. It provides a virtual-time timer queue for driving
/// invokers deterministically.
///
/// To use these mocks in integration tests, add to your `Cargo.toml`:
/// ```toml
/// [dev-dependencies]
/// quiesce = { version = "*", features = ["test-helpers"] }
/// ```
#[cfg(any(test, feature = "test-helpers"))]
pub mod mocks;
