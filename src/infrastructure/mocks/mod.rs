//! Test doubles for infrastructure adapters.
//!
//! Deterministic stand-ins for the host: a manually advanced clock, a
//! virtual-time timer queue, and a tracing layer that captures log events.

pub mod clock;
pub mod layer;
pub mod timer;

pub use clock::MockClock;
pub use layer::{CapturedEvent, MockCaptureLayer};
pub use timer::ManualTimerQueue;
