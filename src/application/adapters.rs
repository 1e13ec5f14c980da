//! Debounce and throttle adapters.
//!
//! Both adapters configure the same [`Invoker`]; only the policy differs.
//! Call sites that only need `run`, `cancel` and `flush` can accept any
//! [`RateLimited`] and stay agnostic of which one they were given.

use crate::application::builder::{BuildError, InvokerBuilder};
use crate::application::invoker::{Invoker, InvokerHandle};
use crate::application::ports::TimerQueue;
use std::sync::Arc;
use std::time::Duration;

/// Common contract of debounced and throttled call sites.
pub trait RateLimited<A> {
    /// Record a call and apply the policy.
    fn run(&self, args: A);

    /// Drop pending work and stop accepting calls.
    fn cancel(&self);

    /// Execute pending work now; returns `true` if the action ran.
    fn flush(&self) -> bool;
}

impl<A: Send + 'static> RateLimited<A> for Invoker<A> {
    fn run(&self, args: A) {
        Invoker::run(self, args);
    }

    fn cancel(&self) {
        Invoker::cancel(self);
    }

    fn flush(&self) -> bool {
        Invoker::flush(self)
    }
}

impl<A: Send + 'static> RateLimited<A> for InvokerHandle<A> {
    fn run(&self, args: A) {
        InvokerHandle::run(self, args);
    }

    fn cancel(&self) {
        InvokerHandle::cancel(self);
    }

    fn flush(&self) -> bool {
        InvokerHandle::flush(self)
    }
}

/// Debounce `action` by `delay` with leading and trailing edges.
///
/// # Errors
/// Never fails for a valid `Duration`; the `Result` mirrors
/// [`InvokerBuilder::build`].
pub fn debounce<A, F>(
    queue: Arc<dyn TimerQueue>,
    delay: Duration,
    action: F,
) -> Result<Invoker<A>, BuildError>
where
    A: Send + 'static,
    F: Fn(A) + Send + Sync + 'static,
{
    InvokerBuilder::debounce(delay)
        .with_timer_queue(queue)
        .build(action)
}

/// Throttle `action` to once per `interval` with leading and trailing edges.
///
/// # Errors
/// Never fails for a valid `Duration`; the `Result` mirrors
/// [`InvokerBuilder::build`].
pub fn throttle<A, F>(
    queue: Arc<dyn TimerQueue>,
    interval: Duration,
    action: F,
) -> Result<Invoker<A>, BuildError>
where
    A: Send + 'static,
    F: Fn(A) + Send + Sync + 'static,
{
    InvokerBuilder::throttle(interval)
        .with_timer_queue(queue)
        .build(action)
}
