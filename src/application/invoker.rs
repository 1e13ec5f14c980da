//! Rate-limited invoker.
//!
//! Owns the timer, the pending arguments and the action for one rate-limited
//! call site, and applies a [`Policy`] to every call, timer firing and flush.
//!
//! The action is never called while internal state is locked, so it may call
//! back into the invoker (for example `run` from inside the action).

use crate::application::metrics::{ExecutionKind, Metrics};
use crate::application::ports::TimerQueue;
use crate::application::timer::TimerGuard;
use crate::domain::policy::{CallAction, Policy, SchedulingPolicy, TimerCommand};

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Shared, swappable action.
pub type Action<A> = Arc<dyn Fn(A) + Send + Sync + 'static>;

/// Rate-limited wrapper around an action taking `A`.
///
/// Created through [`InvokerBuilder`](crate::InvokerBuilder) or the
/// [`debounce`](crate::debounce) / [`throttle`](crate::throttle) adapters.
/// The `Invoker` is the owner: dropping it cancels any pending work, and
/// [`InvokerHandle`]s handed out by [`handle`](Self::handle) turn into no-ops.
///
/// # Example
///
/// ```
/// use quiesce::infrastructure::mocks::ManualTimerQueue;
/// use quiesce::{Edges, InvokerBuilder};
/// use std::sync::{Arc, Mutex};
/// use std::time::{Duration, Instant};
///
/// let queue = ManualTimerQueue::new(Instant::now());
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = Arc::clone(&seen);
///
/// let invoker = InvokerBuilder::debounce(Duration::from_millis(200))
///     .with_edges(Edges::Trailing)
///     .with_timer_queue(Arc::new(queue.clone()))
///     .build(move |word: &'static str| sink.lock().unwrap().push(word))
///     .unwrap();
///
/// invoker.run("a");
/// invoker.run("b");
/// invoker.run("c");
/// queue.advance(Duration::from_millis(200));
///
/// assert_eq!(*seen.lock().unwrap(), vec!["c"]);
/// ```
pub struct Invoker<A: Send + 'static> {
    shared: Arc<Shared<A>>,
}

/// Weak handle to an [`Invoker`] for late-arriving callers.
///
/// Every operation is a no-op once the owning invoker has been dropped.
pub struct InvokerHandle<A: Send + 'static> {
    shared: Weak<Shared<A>>,
}

struct Shared<A> {
    state: Mutex<InvokerState<A>>,
    action: Mutex<Action<A>>,
    queue: Arc<dyn TimerQueue>,
    signal: Option<CancellationToken>,
    abort_watch: Option<CancellationToken>,
    metrics: Metrics,
    kind: &'static str,
    interval: Duration,
}

struct InvokerState<A> {
    policy: Policy,
    pending_args: Option<A>,
    timer: Option<TimerGuard>,
    /// Bumped on every arm, so a callback can tell whether it is still current.
    generation: u64,
    canceled: bool,
}

/// What `cancel` took out of the state; dropped after the lock is released.
type Discarded<A> = Option<(Option<TimerGuard>, Option<A>)>;

impl<A: Send + 'static> Invoker<A> {
    pub(crate) fn new(
        policy: Policy,
        queue: Arc<dyn TimerQueue>,
        action: Action<A>,
        signal: Option<CancellationToken>,
    ) -> Self {
        let kind = policy.kind();
        let interval = policy.interval();
        let abort_watch = signal.as_ref().map(CancellationToken::child_token);

        let shared = Arc::new(Shared {
            state: Mutex::new(InvokerState {
                policy,
                pending_args: None,
                timer: None,
                generation: 0,
                canceled: false,
            }),
            action: Mutex::new(action),
            queue,
            signal,
            abort_watch,
            metrics: Metrics::new(),
            kind,
            interval,
        });

        if let Some(watch) = shared.abort_watch.clone() {
            let weak = Arc::downgrade(&shared);
            shared.queue.watch_abort(
                watch,
                Box::new(move || {
                    if let Some(shared) = weak.upgrade() {
                        shared.observe_abort();
                    }
                }),
            );
        }

        Self { shared }
    }

    /// Record a call and apply the edge policy.
    ///
    /// May execute the action synchronously (leading edge, or a zero
    /// interval). A no-op after cancellation.
    pub fn run(&self, args: A) {
        self.shared.run(args);
    }

    /// Drop any pending trailing execution and stop accepting calls.
    ///
    /// Idempotent.
    pub fn cancel(&self) {
        self.shared.cancel("cancel");
    }

    /// Execute a pending trailing call right now.
    ///
    /// Returns `true` if the action ran. A no-op returning `false` when
    /// nothing is pending.
    pub fn flush(&self) -> bool {
        self.shared.flush()
    }

    /// Swap the action. Pending trailing calls are delivered to the new one.
    pub fn replace_action<F>(&self, action: F)
    where
        F: Fn(A) + Send + Sync + 'static,
    {
        *self.shared.lock_action() = Arc::new(action);
    }

    /// Whether a trailing execution is pending.
    pub fn is_pending(&self) -> bool {
        self.shared.lock_state().policy.is_pending()
    }

    /// Whether the invoker was cancelled, explicitly or by its abort signal.
    pub fn is_canceled(&self) -> bool {
        self.shared.lock_state().canceled || self.shared.aborted()
    }

    /// Metrics for this invoker.
    pub fn metrics(&self) -> &Metrics {
        &self.shared.metrics
    }

    /// Policy name, `"debounce"` or `"throttle"`.
    pub fn kind(&self) -> &'static str {
        self.shared.kind
    }

    /// The configured delay or interval.
    pub fn interval(&self) -> Duration {
        self.shared.interval
    }

    /// A weak handle for callers that may outlive this invoker.
    pub fn handle(&self) -> InvokerHandle<A> {
        InvokerHandle {
            shared: Arc::downgrade(&self.shared),
        }
    }
}

impl<A: Send + 'static> Drop for Invoker<A> {
    fn drop(&mut self) {
        self.shared.cancel("teardown");
    }
}

impl<A: Send + 'static> fmt::Debug for Invoker<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock_state();
        f.debug_struct("Invoker")
            .field("kind", &self.shared.kind)
            .field("interval", &self.shared.interval)
            .field("pending", &state.policy.is_pending())
            .field("armed", &state.timer.is_some())
            .field("canceled", &state.canceled)
            .finish()
    }
}

impl<A: Send + 'static> InvokerHandle<A> {
    /// Same as [`Invoker::run`]; a no-op once the invoker is gone.
    pub fn run(&self, args: A) {
        if let Some(shared) = self.shared.upgrade() {
            shared.run(args);
        }
    }

    /// Same as [`Invoker::cancel`].
    pub fn cancel(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.cancel("cancel");
        }
    }

    /// Same as [`Invoker::flush`]; returns `false` once the invoker is gone.
    pub fn flush(&self) -> bool {
        self.shared.upgrade().is_some_and(|shared| shared.flush())
    }

    /// Whether the owning invoker still exists.
    pub fn is_alive(&self) -> bool {
        self.shared.strong_count() > 0
    }
}

impl<A: Send + 'static> Clone for InvokerHandle<A> {
    fn clone(&self) -> Self {
        Self {
            shared: Weak::clone(&self.shared),
        }
    }
}

impl<A: Send + 'static> fmt::Debug for InvokerHandle<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvokerHandle")
            .field("alive", &self.is_alive())
            .finish()
    }
}

impl<A: Send + 'static> Shared<A> {
    fn lock_state(&self) -> MutexGuard<'_, InvokerState<A>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_action(&self) -> MutexGuard<'_, Action<A>> {
        self.action.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn aborted(&self) -> bool {
        self.signal
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    fn run(self: &Arc<Self>, args: A) {
        let mut state = self.lock_state();
        if state.canceled {
            return;
        }
        if self.aborted() {
            let discarded = self.cancel_locked(&mut state, "abort");
            drop(state);
            drop(discarded);
            return;
        }

        self.metrics.record_call();
        let now = self.queue.now();
        let decision = state.policy.on_call(now);

        let execute = match decision.action {
            CallAction::ExecuteNow => Some(args),
            CallAction::Defer => {
                if state.pending_args.replace(args).is_some() {
                    self.metrics.record_coalesced();
                }
                None
            }
            CallAction::Drop => {
                self.metrics.record_coalesced();
                None
            }
        };

        if let TimerCommand::Arm(delay) = decision.timer {
            self.arm(&mut state, delay);
        }
        drop(state);

        if let Some(args) = execute {
            self.execute(args, ExecutionKind::Leading);
        }
    }

    fn arm(self: &Arc<Self>, state: &mut InvokerState<A>, delay: Duration) {
        state.generation += 1;
        let generation = state.generation;
        let weak = Arc::downgrade(self);

        let guard = TimerGuard::schedule(
            &self.queue,
            delay,
            Box::new(move || {
                if let Some(shared) = weak.upgrade() {
                    shared.on_timer(generation);
                }
            }),
        );
        trace!(
            policy = self.kind,
            delay_ms = delay.as_millis() as u64,
            timer_id = %guard.id(),
            "timer armed"
        );
        // Replacing the previous guard cancels its timer.
        state.timer = Some(guard);
    }

    fn on_timer(self: &Arc<Self>, generation: u64) {
        let mut state = self.lock_state();
        if state.generation != generation || state.timer.is_none() {
            trace!(policy = self.kind, generation, "stale timer ignored");
            return;
        }
        if let Some(guard) = state.timer.take() {
            trace!(policy = self.kind, timer_id = %guard.id(), "timer fired");
            guard.release();
        }
        if self.aborted() {
            let discarded = self.cancel_locked(&mut state, "abort");
            drop(state);
            drop(discarded);
            return;
        }

        let now = self.queue.now();
        let execute = if state.policy.on_timer(now) {
            state.pending_args.take()
        } else {
            None
        };
        drop(state);

        if let Some(args) = execute {
            self.execute(args, ExecutionKind::Trailing);
        }
    }

    fn flush(&self) -> bool {
        let mut state = self.lock_state();
        if state.canceled {
            return false;
        }
        if self.aborted() {
            let discarded = self.cancel_locked(&mut state, "abort");
            drop(state);
            drop(discarded);
            return false;
        }

        let now = self.queue.now();
        if !state.policy.on_flush(now) {
            return false;
        }
        let timer = state.timer.take();
        let execute = state.pending_args.take();
        drop(state);
        drop(timer);

        match execute {
            Some(args) => {
                debug!(policy = self.kind, "flushing pending call");
                self.execute(args, ExecutionKind::Flushed);
                true
            }
            None => false,
        }
    }

    fn observe_abort(&self) {
        if self.aborted() {
            self.cancel("abort");
        }
    }

    fn cancel(&self, reason: &'static str) {
        let mut state = self.lock_state();
        let discarded = self.cancel_locked(&mut state, reason);
        drop(state);
        drop(discarded);
    }

    fn cancel_locked(&self, state: &mut InvokerState<A>, reason: &'static str) -> Discarded<A> {
        if state.canceled {
            return None;
        }
        state.canceled = true;
        state.policy.reset();
        if let Some(watch) = &self.abort_watch {
            watch.cancel();
        }
        self.metrics.record_cancellation();
        debug!(
            policy = self.kind,
            reason,
            had_pending = state.pending_args.is_some(),
            "invoker canceled"
        );
        Some((state.timer.take(), state.pending_args.take()))
    }

    fn execute(&self, args: A, kind: ExecutionKind) {
        self.metrics.record_execution(kind);
        let action = Arc::clone(&*self.lock_action());
        action(args);
    }
}
