//! Ports (interfaces) for the application layer.
//!
//! In hexagonal architecture, ports define the interfaces that the application
//! layer needs. Infrastructure adapters implement these ports.

use std::fmt::{self, Debug};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Port for obtaining current time.
///
/// Every timer queue is also a clock, so policies always measure time on the
/// same clock their timers run on. `MockClock` is the standalone test double.
pub trait Clock: Send + Sync + Debug {
    /// Get the current instant.
    fn now(&self) -> Instant;
}

/// Identifier of a scheduled timer, unique per queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    /// Wrap a raw id. Queues hand these out; callers never invent them.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw id.
    pub fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Deferred callback run by a timer queue.
pub type TimerTask = Box<dyn FnOnce() + Send + 'static>;

/// Port for the host's timer facility.
///
/// The queue owns the scheduling; invokers own the returned ids through
/// [`TimerGuard`](crate::application::timer::TimerGuard) so a timer is always
/// released on fire, cancel or teardown.
///
/// Implementations must not hold internal locks while running a task: tasks
/// routinely schedule or cancel other timers.
pub trait TimerQueue: Clock {
    /// Run `task` once `delay` has elapsed.
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerId;

    /// Cancel a timer that has not fired yet.
    ///
    /// Returns `true` if the timer was still outstanding.
    fn cancel(&self, id: TimerId) -> bool;

    /// Run `task` as soon as `signal` is cancelled.
    ///
    /// The default drops `task` without running it. On such a queue an
    /// invoker only notices a cancelled signal on its next `run`, `flush` or
    /// timer firing: until then its timer stays scheduled and its pending
    /// arguments stay alive. The abort still wins over any execution, so no
    /// action runs after the signal is cancelled. Queues that can wait on the
    /// signal should override this to release resources promptly.
    fn watch_abort(&self, signal: CancellationToken, task: TimerTask) {
        let _ = (signal, task);
    }
}
