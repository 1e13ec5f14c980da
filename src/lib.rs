//! # quiesce
//!
//! Debounced and throttled execution of actions, values and effects.
//!
//! A rate-limited invoker wraps an action and decides, for every call, whether
//! to run it now (leading edge), to remember the arguments and run them when
//! the window closes (trailing edge), or to drop them. Two policies are built
//! in:
//!
//! - **Debounce**: run once activity has been quiet for a delay. Every call
//!   restarts the quiet period.
//! - **Throttle**: run at most once per interval, no matter how often it is
//!   called.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quiesce::{Edges, InvokerBuilder};
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), quiesce::BuildError> {
//! // Uses the current tokio runtime as timer queue
//! let save = InvokerBuilder::debounce(Duration::from_millis(300))
//!     .with_edges(Edges::Trailing)
//!     .build(|draft: String| println!("saving {draft}"))?;
//!
//! save.run("h".to_string());
//! save.run("he".to_string());
//! save.run("hello".to_string()); // only this one is saved, 300ms later
//!
//! // Or run whatever is pending right away
//! save.flush();
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! ### Invokers
//! - **Edges**: leading, trailing, both or neither
//! - **Single timer**: at most one timer is outstanding per invoker
//! - **Cancel and flush**: drop pending work, or run it immediately
//! - **Teardown**: dropping an [`Invoker`] cancels its timer; late callers
//!   holding an [`InvokerHandle`] become no-ops
//! - **Abort signals**: tie an invoker to a `CancellationToken`
//!
//! ### Bindings
//! - [`RateLimitedValue`]: rate-limited copy of a changing input
//! - [`EffectBinding`]: side effect rerun when dependencies change, at most as
//!   often as the policy allows
//!
//! ### Observability
//! - `tracing` events for timer arming, firing, flushes and cancellation
//! - Per-invoker [`Metrics`] for calls, executions and coalesced calls
//!
//! ## Timer Queues
//!
//! Invokers never sleep themselves. They schedule callbacks on a
//! [`TimerQueue`]:
//!
//! - [`TokioTimerQueue`] spawns one task per timer on a tokio runtime
//!   (feature `async`, enabled by default)
//! - `ManualTimerQueue` (feature `test-helpers`) runs on virtual time and is
//!   advanced explicitly, which makes tests deterministic
//!
//! ```
//! use quiesce::infrastructure::mocks::ManualTimerQueue;
//! use quiesce::throttle;
//! use std::sync::{Arc, Mutex};
//! use std::time::{Duration, Instant};
//!
//! let queue = ManualTimerQueue::new(Instant::now());
//! let seen = Arc::new(Mutex::new(Vec::new()));
//! let sink = Arc::clone(&seen);
//!
//! let scroll = throttle(Arc::new(queue.clone()), Duration::from_millis(100), move |y: u32| {
//!     sink.lock().unwrap().push(y)
//! })
//! .unwrap();
//!
//! for y in [10, 20, 30] {
//!     scroll.run(y);
//! }
//! queue.advance(Duration::from_millis(100));
//!
//! // Leading call runs immediately, the latest one when the window closes
//! assert_eq!(*seen.lock().unwrap(), vec![10, 30]);
//! ```
//!
//! ## Configuration
//!
//! [`InvokerConfig`] is a serde-friendly description of an invoker, with
//! intervals in milliseconds:
//!
//! ```
//! use quiesce::{InvokerConfig, Mode};
//!
//! let config: InvokerConfig =
//!     serde_json::from_str(r#"{"mode":"debounce","interval_ms":250,"edges":"trailing"}"#).unwrap();
//! assert_eq!(config.mode, Mode::Debounce);
//! assert!(config.validate().is_ok());
//! ```
//!
//! Negative, NaN and infinite intervals are rejected. A zero interval makes
//! every call execute synchronously.

// Domain layer - pure scheduling logic
pub mod domain;

// Application layer - invokers and bindings
pub mod application;

// Infrastructure layer - timer queue adapters
pub mod infrastructure;

// Re-export commonly used types for convenience
pub use domain::{
    edges::Edges,
    policy::{
        interval_from_millis, CallAction, CallDecision, ConfigError, DebouncePolicy, Policy,
        SchedulingPolicy, ThrottlePolicy, TimerCommand,
    },
};

pub use application::{
    adapters::{debounce, throttle, RateLimited},
    builder::{BuildError, InvokerBuilder},
    config::{InvokerConfig, Mode, ValidatedConfig},
    effect::{Cleanup, EffectBinding, EffectFn, TriggerToken, Watcher},
    invoker::{Action, Invoker, InvokerHandle},
    metrics::{ExecutionKind, Metrics, MetricsSnapshot},
    ports::{Clock, TimerId, TimerQueue, TimerTask},
    timer::TimerGuard,
    value::RateLimitedValue,
};

#[cfg(feature = "async")]
pub use infrastructure::tokio_timer::TokioTimerQueue;
