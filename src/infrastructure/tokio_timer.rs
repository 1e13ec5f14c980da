//! Tokio-backed timer queue.
//!
//! Each timer is a task sleeping on the runtime's timer wheel. Outstanding
//! timers are tracked in a sharded map keyed by timer id; whichever of
//! "timer elapsed" and "timer cancelled" removes the entry first wins, so a
//! cancelled timer never runs its task.

use crate::application::ports::{Clock, TimerId, TimerQueue, TimerTask};

use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Timer queue running tasks on a tokio runtime.
///
/// `now()` reads tokio's clock, so tests using `tokio::time::pause` see the
/// same time as the timers.
///
/// # Example
///
/// ```
/// use quiesce::{InvokerBuilder, TokioTimerQueue};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let queue = TokioTimerQueue::try_current().expect("inside a runtime");
/// let invoker = InvokerBuilder::throttle(Duration::from_millis(50))
///     .with_timer_queue(Arc::new(queue))
///     .build(|n: u32| println!("got {n}"))
///     .unwrap();
///
/// invoker.run(1);
/// # }
/// ```
#[derive(Clone)]
pub struct TokioTimerQueue {
    inner: Arc<Inner>,
}

struct Inner {
    handle: Handle,
    next_id: AtomicU64,
    timers: DashMap<u64, CancellationToken, ahash::RandomState>,
}

impl TokioTimerQueue {
    /// Create a queue spawning on `handle`.
    pub fn new(handle: Handle) -> Self {
        Self {
            inner: Arc::new(Inner {
                handle,
                next_id: AtomicU64::new(0),
                timers: DashMap::with_hasher(ahash::RandomState::new()),
            }),
        }
    }

    /// Create a queue on the runtime the caller is running in, if any.
    pub fn try_current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }

    /// Number of timers that have neither fired nor been cancelled.
    pub fn pending(&self) -> usize {
        self.inner.timers.len()
    }

    /// Cancel every outstanding timer.
    pub fn cancel_all(&self) {
        self.inner.timers.retain(|_, token| {
            token.cancel();
            false
        });
    }
}

impl fmt::Debug for TokioTimerQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioTimerQueue")
            .field("pending", &self.pending())
            .finish()
    }
}

impl Clock for TokioTimerQueue {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }
}

impl TimerQueue for TokioTimerQueue {
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerId {
        let raw = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        // Registered before spawning so an immediately elapsing timer finds its entry.
        self.inner.timers.insert(raw, token.clone());

        let inner = Arc::clone(&self.inner);
        self.inner.handle.spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = token.cancelled() => return,
            }
            if inner.timers.remove(&raw).is_some() {
                task();
            } else {
                trace!(timer_id = raw, "timer cancelled while elapsing");
            }
        });

        TimerId::from_raw(raw)
    }

    fn cancel(&self, id: TimerId) -> bool {
        match self.inner.timers.remove(&id.as_raw()) {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    fn watch_abort(&self, signal: CancellationToken, task: TimerTask) {
        self.inner.handle.spawn(async move {
            signal.cancelled().await;
            task();
        });
    }
}
