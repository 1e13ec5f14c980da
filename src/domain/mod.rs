//! Domain layer - pure business logic with no runtime dependencies.
//!
//! This layer contains the core concepts of rate-limited execution:
//! - Edge sets (leading, trailing)
//! - Debounce and throttle state machines
//! - Interval validation
//!
//! All types in this layer are pure and testable with plain `Instant`s.

pub mod edges;
pub mod policy;
