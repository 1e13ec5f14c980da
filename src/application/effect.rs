//! Rate-limited effects.
//!
//! An effect binding runs a side effect when its dependencies change, but
//! only as often as an invoker allows. It is built from two parts:
//!
//! - the **coalescer**, an [`Invoker<()>`](Invoker) fed with every dependency
//!   change; each time it fires it bumps a [`TriggerToken`];
//! - the **watcher**, which compares the token's tick with the last tick it
//!   saw and runs the effect only when they differ.
//!
//! Dependency changes and effect runs are therefore decoupled: any number of
//! changes inside one window produce a single run.

use crate::application::invoker::Invoker;
use crate::application::metrics::Metrics;
use crate::application::ports::TimerQueue;
use crate::domain::edges::Edges;
use crate::domain::policy::Policy;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Cleanup returned by an effect, run before the next run and on teardown.
pub type Cleanup = Box<dyn FnOnce() + Send + 'static>;

/// Effect body.
pub type EffectFn = Box<dyn FnMut() -> Option<Cleanup> + Send + 'static>;

/// Marker that changes exactly when the coalescer fires.
#[derive(Debug, Clone, Default)]
pub struct TriggerToken(Arc<AtomicU64>);

impl TriggerToken {
    /// Create a token at tick 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current tick.
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Advance the tick and return the new value.
    pub fn bump(&self) -> u64 {
        self.0.fetch_add(1, Ordering::AcqRel) + 1
    }
}

/// Runs an effect when the observed tick differs from the last one seen.
///
/// Starts at tick 0, the token's initial tick, so the mount itself never
/// runs the effect.
pub struct Watcher {
    last_seen: u64,
    effect: EffectFn,
    cleanup: Option<Cleanup>,
    runs: u64,
}

impl Watcher {
    /// Create a watcher around `effect`.
    pub fn new(effect: EffectFn) -> Self {
        Self {
            last_seen: 0,
            effect,
            cleanup: None,
            runs: 0,
        }
    }

    /// Run the effect if `tick` is new. Returns `true` if it ran.
    ///
    /// The previous cleanup runs first. A panic in either propagates.
    pub fn observe(&mut self, tick: u64) -> bool {
        if tick == self.last_seen {
            return false;
        }
        self.last_seen = tick;
        if let Some(cleanup) = self.cleanup.take() {
            cleanup();
        }
        self.runs += 1;
        self.cleanup = (self.effect)();
        true
    }

    /// Run the outstanding cleanup, if any.
    pub fn teardown(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup();
        }
    }

    /// Last tick the effect ran for.
    pub fn last_seen(&self) -> u64 {
        self.last_seen
    }

    /// How many times the effect ran.
    pub fn runs(&self) -> u64 {
        self.runs
    }
}

impl fmt::Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("last_seen", &self.last_seen)
            .field("runs", &self.runs)
            .field("has_cleanup", &self.cleanup.is_some())
            .finish()
    }
}

/// Effect that runs when dependencies change, rate-limited by an invoker.
///
/// Call [`update`](Self::update) with the current dependencies on every
/// render. The first call is the mount: it records the dependencies and feeds
/// the coalescer once; later calls feed it only when the dependencies
/// changed. Dropping the binding cancels pending work and runs the last
/// cleanup.
///
/// The effect must not call back into its own binding.
///
/// # Example
///
/// ```
/// use quiesce::infrastructure::mocks::ManualTimerQueue;
/// use quiesce::EffectBinding;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::{Duration, Instant};
///
/// let queue = ManualTimerQueue::new(Instant::now());
/// let runs = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&runs);
///
/// let mut binding = EffectBinding::debounced(
///     move || {
///         counter.fetch_add(1, Ordering::SeqCst);
///         None
///     },
///     Duration::from_millis(100),
///     Arc::new(queue.clone()),
/// );
///
/// binding.update(1);
/// binding.update(2);
/// binding.update(3);
/// assert_eq!(runs.load(Ordering::SeqCst), 0);
///
/// queue.advance(Duration::from_millis(100));
/// assert_eq!(runs.load(Ordering::SeqCst), 1);
/// ```
pub struct EffectBinding<D> {
    deps: Option<D>,
    token: TriggerToken,
    watcher: Arc<Mutex<Watcher>>,
    coalescer: Invoker<()>,
}

impl<D: PartialEq> EffectBinding<D> {
    /// Debounced effect with trailing-only runs.
    pub fn debounced<F>(effect: F, delay: Duration, queue: Arc<dyn TimerQueue>) -> Self
    where
        F: FnMut() -> Option<Cleanup> + Send + 'static,
    {
        Self::with_parts(
            Box::new(effect),
            Policy::debounce(delay, Edges::Trailing),
            queue,
            None,
        )
    }

    /// Throttled effect with leading and trailing runs.
    pub fn throttled<F>(effect: F, interval: Duration, queue: Arc<dyn TimerQueue>) -> Self
    where
        F: FnMut() -> Option<Cleanup> + Send + 'static,
    {
        Self::with_parts(
            Box::new(effect),
            Policy::throttle(interval, Edges::Both),
            queue,
            None,
        )
    }

    pub(crate) fn with_parts(
        effect: EffectFn,
        policy: Policy,
        queue: Arc<dyn TimerQueue>,
        signal: Option<CancellationToken>,
    ) -> Self {
        let token = TriggerToken::new();
        let watcher = Arc::new(Mutex::new(Watcher::new(effect)));

        let fire_token = token.clone();
        let fire_watcher = Arc::clone(&watcher);
        let coalescer = Invoker::new(
            policy,
            queue,
            Arc::new(move |()| {
                let tick = fire_token.bump();
                lock_watcher(&fire_watcher).observe(tick);
            }),
            signal,
        );

        Self {
            deps: None,
            token,
            watcher,
            coalescer,
        }
    }

    /// Report the current dependencies.
    pub fn update(&mut self, deps: D) {
        let changed = self.deps.as_ref().map_or(true, |prev| *prev != deps);
        if changed {
            self.deps = Some(deps);
            self.coalescer.run(());
        }
    }

    /// Run a pending effect now. Returns `true` if it ran.
    pub fn flush(&self) -> bool {
        self.coalescer.flush()
    }

    /// Drop pending work; the effect will not run again.
    pub fn cancel(&self) {
        self.coalescer.cancel();
    }

    /// Whether a run is waiting on the coalescer.
    pub fn is_pending(&self) -> bool {
        self.coalescer.is_pending()
    }

    /// Current tick of the trigger token.
    pub fn tick(&self) -> u64 {
        self.token.current()
    }

    /// How many times the effect ran.
    pub fn runs(&self) -> u64 {
        lock_watcher(&self.watcher).runs()
    }

    /// Metrics of the coalescer.
    pub fn metrics(&self) -> &Metrics {
        self.coalescer.metrics()
    }
}

impl<D> Drop for EffectBinding<D> {
    fn drop(&mut self) {
        self.coalescer.cancel();
        lock_watcher(&self.watcher).teardown();
    }
}

impl<D: fmt::Debug> fmt::Debug for EffectBinding<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectBinding")
            .field("deps", &self.deps)
            .field("tick", &self.token.current())
            .field("coalescer", &self.coalescer)
            .finish()
    }
}

fn lock_watcher(watcher: &Mutex<Watcher>) -> MutexGuard<'_, Watcher> {
    watcher.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counting_effect(log: &Arc<Mutex<Vec<&'static str>>>) -> EffectFn {
        let log = Arc::clone(log);
        Box::new(move || {
            log.lock().unwrap().push("run");
            let log = Arc::clone(&log);
            Some(Box::new(move || log.lock().unwrap().push("cleanup")) as Cleanup)
        })
    }

    #[test]
    fn test_token_bumps() {
        let token = TriggerToken::new();
        let clone = token.clone();

        assert_eq!(token.current(), 0);
        assert_eq!(clone.bump(), 1);
        assert_eq!(token.current(), 1);
    }

    #[test]
    fn test_watcher_skips_initial_tick() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut watcher = Watcher::new(counting_effect(&log));

        assert!(!watcher.observe(0));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_watcher_runs_once_per_tick_with_cleanup() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut watcher = Watcher::new(counting_effect(&log));

        assert!(watcher.observe(1));
        assert!(!watcher.observe(1));
        assert!(watcher.observe(2));
        watcher.teardown();
        watcher.teardown();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["run", "cleanup", "run", "cleanup"]
        );
        assert_eq!(watcher.runs(), 2);
        assert_eq!(watcher.last_seen(), 2);
    }
}
