//! Virtual-time timer queue for deterministic tests.

use crate::application::ports::{Clock, TimerId, TimerQueue, TimerTask};
use crate::infrastructure::mocks::clock::MockClock;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Timer queue driven by [`advance`](Self::advance) instead of wall time.
///
/// Timers fire in deadline order, ties in scheduling order. While a timer
/// fires, the queue's clock reads exactly that timer's deadline. Tasks may
/// schedule and cancel timers freely; no lock is held while they run.
///
/// A delay too large to land on a representable instant parks the timer: it
/// stays pending and cancellable but never fires.
///
/// Clones share the same queue and clock.
///
/// # Example
///
/// ```
/// use quiesce::infrastructure::mocks::ManualTimerQueue;
/// use quiesce::TimerQueue;
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
/// use std::time::{Duration, Instant};
///
/// let queue = ManualTimerQueue::new(Instant::now());
/// let fired = Arc::new(AtomicBool::new(false));
/// let flag = Arc::clone(&fired);
///
/// queue.schedule(Duration::from_millis(100), Box::new(move || flag.store(true, Ordering::SeqCst)));
///
/// queue.advance(Duration::from_millis(99));
/// assert!(!fired.load(Ordering::SeqCst));
/// queue.advance(Duration::from_millis(1));
/// assert!(fired.load(Ordering::SeqCst));
/// ```
#[derive(Clone)]
pub struct ManualTimerQueue {
    clock: MockClock,
    state: Arc<Mutex<QueueState>>,
}

#[derive(Default)]
struct QueueState {
    next_id: u64,
    timers: BTreeMap<(Instant, u64), TimerTask>,
    deadlines: HashMap<u64, Instant>,
    // Timers whose deadline is past the end of representable time.
    parked: HashMap<u64, TimerTask>,
    watchers: Vec<(CancellationToken, TimerTask)>,
}

impl ManualTimerQueue {
    /// Create a queue whose clock starts at `start`.
    pub fn new(start: Instant) -> Self {
        Self {
            clock: MockClock::new(start),
            state: Arc::new(Mutex::new(QueueState::default())),
        }
    }

    /// The queue's clock.
    pub fn clock(&self) -> &MockClock {
        &self.clock
    }

    /// Virtual time elapsed since the queue was created.
    pub fn elapsed(&self) -> Duration {
        self.clock.elapsed()
    }

    /// Number of timers that have not fired or been cancelled.
    pub fn pending(&self) -> usize {
        let state = self.lock();
        state.timers.len() + state.parked.len()
    }

    /// Deadline of the next timer to fire.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.lock().timers.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Move time forward by `duration`, firing every timer that becomes due.
    ///
    /// Returns the number of timers fired. Timers scheduled by firing tasks
    /// are fired too if they fall due within the same advance. A duration
    /// reaching past representable time fires every due timer and leaves the
    /// clock at the last deadline.
    pub fn advance(&self, duration: Duration) -> usize {
        let target = self.clock.now().checked_add(duration);
        let mut fired = 0;

        self.poll_signals();
        while let Some((deadline, task)) = self.pop_due(target) {
            self.clock.advance_to(deadline);
            task();
            fired += 1;
            self.poll_signals();
        }
        if let Some(target) = target {
            self.clock.advance_to(target);
        }

        fired
    }

    /// Fire timers that are due right now without moving time.
    pub fn run_due(&self) -> usize {
        self.advance(Duration::ZERO)
    }

    /// Fire timers until none remain, moving time to each deadline.
    ///
    /// Never returns if tasks keep rescheduling themselves.
    pub fn run_all(&self) -> usize {
        let mut fired = 0;
        while let Some(deadline) = self.next_deadline() {
            let step = deadline.saturating_duration_since(self.clock.now());
            fired += self.advance(step);
        }
        fired
    }

    fn pop_due(&self, target: Option<Instant>) -> Option<(Instant, TimerTask)> {
        let mut state = self.lock();
        let key = *state.timers.keys().next()?;
        if target.is_some_and(|target| key.0 > target) {
            return None;
        }
        let task = state.timers.remove(&key)?;
        state.deadlines.remove(&key.1);
        Some((key.0, task))
    }

    fn poll_signals(&self) {
        let ready: Vec<TimerTask> = {
            let mut state = self.lock();
            let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut state.watchers)
                .into_iter()
                .partition(|(signal, _)| signal.is_cancelled());
            state.watchers = waiting;
            ready.into_iter().map(|(_, task)| task).collect()
        };
        for task in ready {
            task();
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ManualTimerQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManualTimerQueue")
            .field("elapsed", &self.elapsed())
            .field("pending", &self.pending())
            .finish()
    }
}

impl Clock for ManualTimerQueue {
    fn now(&self) -> Instant {
        self.clock.now()
    }
}

impl TimerQueue for ManualTimerQueue {
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerId {
        let deadline = self.clock.now().checked_add(delay);
        let mut state = self.lock();
        let raw = state.next_id;
        state.next_id += 1;
        match deadline {
            Some(deadline) => {
                state.timers.insert((deadline, raw), task);
                state.deadlines.insert(raw, deadline);
            }
            None => {
                state.parked.insert(raw, task);
            }
        }
        TimerId::from_raw(raw)
    }

    fn cancel(&self, id: TimerId) -> bool {
        // Drop the task outside the lock: it may own guards that cancel timers.
        let removed = {
            let mut state = self.lock();
            match state.deadlines.remove(&id.as_raw()) {
                Some(deadline) => state.timers.remove(&(deadline, id.as_raw())),
                None => state.parked.remove(&id.as_raw()),
            }
        };
        removed.is_some()
    }

    fn watch_abort(&self, signal: CancellationToken, task: TimerTask) {
        if signal.is_cancelled() {
            task();
            return;
        }
        self.lock().watchers.push((signal, task));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> TimerTask) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = Arc::clone(&log);
        let make = move |name: &'static str| -> TimerTask {
            let log = Arc::clone(&log_clone);
            Box::new(move || log.lock().unwrap().push(name))
        };
        (log, make)
    }

    #[test]
    fn test_fires_in_deadline_order() {
        let queue = ManualTimerQueue::new(Instant::now());
        let (log, task) = recorder();

        queue.schedule(Duration::from_millis(30), task("c"));
        queue.schedule(Duration::from_millis(10), task("a"));
        queue.schedule(Duration::from_millis(20), task("b"));
        queue.schedule(Duration::from_millis(20), task("b2"));

        assert_eq!(queue.advance(Duration::from_millis(100)), 4);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "b2", "c"]);
        assert_eq!(queue.elapsed(), Duration::from_millis(100));
    }

    #[test]
    fn test_cancel_prevents_firing() {
        let queue = ManualTimerQueue::new(Instant::now());
        let (log, task) = recorder();

        let id = queue.schedule(Duration::from_millis(10), task("a"));
        assert!(queue.cancel(id));
        assert!(!queue.cancel(id));

        queue.advance(Duration::from_millis(20));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_clock_reads_deadline_during_task() {
        let queue = ManualTimerQueue::new(Instant::now());
        let seen = Arc::new(Mutex::new(None));
        let seen_clone = Arc::clone(&seen);
        let queue_clone = queue.clone();

        queue.schedule(
            Duration::from_millis(40),
            Box::new(move || {
                *seen_clone.lock().unwrap() = Some(queue_clone.elapsed());
            }),
        );
        queue.advance(Duration::from_millis(100));

        assert_eq!(*seen.lock().unwrap(), Some(Duration::from_millis(40)));
    }

    #[test]
    fn test_task_can_schedule_within_same_advance() {
        let queue = ManualTimerQueue::new(Instant::now());
        let (log, task) = recorder();
        let queue_clone = queue.clone();
        let follow_up = task("second");

        queue.schedule(
            Duration::from_millis(10),
            Box::new(move || {
                queue_clone.schedule(Duration::from_millis(10), follow_up);
            }),
        );

        assert_eq!(queue.advance(Duration::from_millis(25)), 2);
        assert_eq!(*log.lock().unwrap(), vec!["second"]);
    }

    #[test]
    fn test_run_all() {
        let queue = ManualTimerQueue::new(Instant::now());
        let (log, task) = recorder();

        queue.schedule(Duration::from_secs(5), task("late"));
        queue.schedule(Duration::from_secs(1), task("early"));

        assert_eq!(queue.run_all(), 2);
        assert_eq!(queue.elapsed(), Duration::from_secs(5));
        assert_eq!(*log.lock().unwrap(), vec!["early", "late"]);
    }

    #[test]
    fn test_unrepresentable_deadline_never_fires() {
        let queue = ManualTimerQueue::new(Instant::now());
        let (log, task) = recorder();

        let parked = queue.schedule(Duration::MAX, task("never"));
        queue.schedule(Duration::from_millis(10), task("soon"));
        assert_eq!(queue.pending(), 2);

        assert_eq!(queue.advance(Duration::MAX), 1);
        assert_eq!(*log.lock().unwrap(), vec!["soon"]);
        assert_eq!(queue.elapsed(), Duration::from_millis(10));
        assert_eq!(queue.pending(), 1);

        assert!(queue.cancel(parked));
        assert!(!queue.cancel(parked));
        assert_eq!(queue.pending(), 0);
        assert_eq!(queue.run_all(), 0);
    }

    #[test]
    fn test_watch_abort_runs_on_next_advance() {
        let queue = ManualTimerQueue::new(Instant::now());
        let (log, task) = recorder();
        let signal = CancellationToken::new();

        queue.watch_abort(signal.clone(), task("aborted"));
        queue.run_due();
        assert!(log.lock().unwrap().is_empty());

        signal.cancel();
        queue.run_due();
        assert_eq!(*log.lock().unwrap(), vec!["aborted"]);
    }
}
