//! Observability metrics for rate-limited invokers.
//!
//! Provides counters about how calls were coalesced and executed, for
//! monitoring and debugging.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Which edge produced an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionKind {
    /// Immediate execution inside `run`
    Leading,
    /// Deferred execution from the timer
    Trailing,
    /// Forced execution from `flush`
    Flushed,
}

/// Metrics tracking invoker statistics.
///
/// All metrics use atomic operations, so clones of the same `Metrics` can be
/// read from any thread while the invoker is in use.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    /// Calls accepted by `run`
    calls: AtomicU64,
    leading: AtomicU64,
    trailing: AtomicU64,
    flushed: AtomicU64,
    /// Calls whose arguments were superseded or dropped before delivery
    coalesced: AtomicU64,
    cancellations: AtomicU64,
}

impl Metrics {
    /// Create a new metrics tracker.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner::default()),
        }
    }

    pub(crate) fn record_call(&self) {
        self.inner.calls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_execution(&self, kind: ExecutionKind) {
        let counter = match kind {
            ExecutionKind::Leading => &self.inner.leading,
            ExecutionKind::Trailing => &self.inner.trailing,
            ExecutionKind::Flushed => &self.inner.flushed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_coalesced(&self) {
        self.inner.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cancellation(&self) {
        self.inner.cancellations.fetch_add(1, Ordering::Relaxed);
    }

    /// Total number of calls accepted by `run`.
    pub fn calls(&self) -> u64 {
        self.inner.calls.load(Ordering::Relaxed)
    }

    /// Total number of executions of the action, over all edges.
    pub fn executions(&self) -> u64 {
        self.executions_of(ExecutionKind::Leading)
            + self.executions_of(ExecutionKind::Trailing)
            + self.executions_of(ExecutionKind::Flushed)
    }

    /// Number of executions produced by one edge.
    pub fn executions_of(&self, kind: ExecutionKind) -> u64 {
        match kind {
            ExecutionKind::Leading => self.inner.leading.load(Ordering::Relaxed),
            ExecutionKind::Trailing => self.inner.trailing.load(Ordering::Relaxed),
            ExecutionKind::Flushed => self.inner.flushed.load(Ordering::Relaxed),
        }
    }

    /// Number of calls whose arguments never reached the action.
    pub fn coalesced(&self) -> u64 {
        self.inner.coalesced.load(Ordering::Relaxed)
    }

    /// Number of times the invoker was cancelled (0 or 1 per invoker).
    pub fn cancellations(&self) -> u64 {
        self.inner.cancellations.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            calls: self.calls(),
            leading_executions: self.executions_of(ExecutionKind::Leading),
            trailing_executions: self.executions_of(ExecutionKind::Trailing),
            flushed_executions: self.executions_of(ExecutionKind::Flushed),
            coalesced: self.coalesced(),
            cancellations: self.cancellations(),
        }
    }

    /// Reset all metrics to zero.
    pub fn reset(&self) {
        self.inner.calls.store(0, Ordering::Relaxed);
        self.inner.leading.store(0, Ordering::Relaxed);
        self.inner.trailing.store(0, Ordering::Relaxed);
        self.inner.flushed.store(0, Ordering::Relaxed);
        self.inner.coalesced.store(0, Ordering::Relaxed);
        self.inner.cancellations.store(0, Ordering::Relaxed);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    /// Calls accepted by `run`
    pub calls: u64,
    /// Executions on the leading edge
    pub leading_executions: u64,
    /// Executions on the trailing edge
    pub trailing_executions: u64,
    /// Executions forced by `flush`
    pub flushed_executions: u64,
    /// Calls whose arguments never reached the action
    pub coalesced: u64,
    /// Cancellations
    pub cancellations: u64,
}

impl MetricsSnapshot {
    /// Total executions over all edges.
    pub fn executions(&self) -> u64 {
        self.leading_executions
            .saturating_add(self.trailing_executions)
            .saturating_add(self.flushed_executions)
    }

    /// Ratio of coalesced calls to accepted calls (0.0 to 1.0).
    ///
    /// Returns 0.0 if no calls were made.
    pub fn coalescing_rate(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.coalesced as f64 / self.calls as f64
        }
    }
}
