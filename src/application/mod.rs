//! Application layer - orchestration of domain logic.
//!
//! This layer owns the runtime behavior built on the pure policies:
//! - Rate-limited invoker (timer ownership, pending arguments, action cell)
//! - Debounce/throttle adapters, value tracking and effect binding
//! - Configuration, builder and metrics
//!
//! ## Ports
//!
//! The application layer defines ports (traits) that infrastructure
//! adapters must implement. This keeps the application layer independent
//! from the host's timer facility.

pub mod adapters;
pub mod builder;
pub mod config;
pub mod effect;
pub mod invoker;
pub mod metrics;
pub mod ports;
pub mod timer;
pub mod value;
