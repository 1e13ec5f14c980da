//! Debounced and throttled values.
//!
//! A value tracker rate-limits commits of a changing input instead of calls
//! to an arbitrary action: feed it the current input on every update and read
//! back the last committed value.

use crate::application::invoker::Invoker;
use crate::application::metrics::Metrics;
use crate::application::ports::TimerQueue;
use crate::domain::edges::Edges;
use crate::domain::policy::Policy;

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Rate-limited copy of a changing value.
///
/// # Example
///
/// ```
/// use quiesce::infrastructure::mocks::ManualTimerQueue;
/// use quiesce::RateLimitedValue;
/// use std::sync::Arc;
/// use std::time::{Duration, Instant};
///
/// let queue = ManualTimerQueue::new(Instant::now());
/// let search = RateLimitedValue::debounced(
///     String::new(),
///     Duration::from_millis(300),
///     Arc::new(queue.clone()),
/// );
///
/// search.update("r".to_string());
/// search.update("ru".to_string());
/// search.update("rust".to_string());
/// assert_eq!(search.value(), "");
///
/// queue.advance(Duration::from_millis(300));
/// assert_eq!(search.value(), "rust");
/// ```
pub struct RateLimitedValue<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    committed: Arc<RwLock<T>>,
    last_input: Mutex<T>,
    invoker: Invoker<T>,
}

impl<T> RateLimitedValue<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Debounced value with trailing-only commits.
    pub fn debounced(initial: T, delay: Duration, queue: Arc<dyn TimerQueue>) -> Self {
        Self::with_parts(initial, Policy::debounce(delay, Edges::Trailing), queue, None)
    }

    /// Throttled value with leading and trailing commits.
    pub fn throttled(initial: T, interval: Duration, queue: Arc<dyn TimerQueue>) -> Self {
        Self::with_parts(initial, Policy::throttle(interval, Edges::Both), queue, None)
    }

    pub(crate) fn with_parts(
        initial: T,
        policy: Policy,
        queue: Arc<dyn TimerQueue>,
        signal: Option<CancellationToken>,
    ) -> Self {
        let committed = Arc::new(RwLock::new(initial.clone()));
        let target = Arc::clone(&committed);
        let invoker = Invoker::new(
            policy,
            queue,
            Arc::new(move |value: T| {
                *target.write().unwrap_or_else(PoisonError::into_inner) = value;
            }),
            signal,
        );

        Self {
            committed,
            last_input: Mutex::new(initial),
            invoker,
        }
    }

    /// Feed the current input. Only changes reach the invoker.
    pub fn update(&self, input: T) {
        {
            let mut last = self.last_input.lock().unwrap_or_else(PoisonError::into_inner);
            if *last == input {
                return;
            }
            *last = input.clone();
        }
        self.invoker.run(input);
    }

    /// The last committed value.
    pub fn value(&self) -> T {
        self.committed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Commit a pending input right now. Returns `true` if one was pending.
    pub fn flush(&self) -> bool {
        self.invoker.flush()
    }

    /// Drop any pending commit and freeze the committed value.
    pub fn cancel(&self) {
        self.invoker.cancel();
    }

    /// Whether an input is waiting to be committed.
    pub fn is_pending(&self) -> bool {
        self.invoker.is_pending()
    }

    /// Metrics of the underlying invoker.
    pub fn metrics(&self) -> &Metrics {
        self.invoker.metrics()
    }
}

impl<T> fmt::Debug for RateLimitedValue<T>
where
    T: Clone + PartialEq + Send + Sync + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitedValue")
            .field("value", &self.value())
            .field("invoker", &self.invoker)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mocks::ManualTimerQueue;
    use std::time::Instant;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_unchanged_input_is_ignored() {
        let queue = ManualTimerQueue::new(Instant::now());
        let value = RateLimitedValue::debounced(1, ms(100), Arc::new(queue.clone()));

        value.update(1);
        value.update(1);
        assert_eq!(value.metrics().calls(), 0);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn test_throttled_value_commits_leading_and_trailing() {
        let queue = ManualTimerQueue::new(Instant::now());
        let value = RateLimitedValue::throttled(0, ms(100), Arc::new(queue.clone()));

        value.update(1);
        assert_eq!(value.value(), 1);

        value.update(2);
        value.update(3);
        assert_eq!(value.value(), 1);

        queue.advance(ms(100));
        assert_eq!(value.value(), 3);
    }

    #[test]
    fn test_flush_and_cancel() {
        let queue = ManualTimerQueue::new(Instant::now());
        let value = RateLimitedValue::debounced("a", ms(100), Arc::new(queue.clone()));

        value.update("b");
        assert!(value.is_pending());
        assert!(value.flush());
        assert_eq!(value.value(), "b");

        value.update("c");
        value.cancel();
        queue.advance(ms(500));
        assert_eq!(value.value(), "b");
    }

    #[test]
    fn test_returning_to_committed_value_still_commits() {
        let queue = ManualTimerQueue::new(Instant::now());
        let value = RateLimitedValue::debounced(0, ms(100), Arc::new(queue.clone()));

        value.update(5);
        value.update(0);
        queue.advance(ms(100));
        assert_eq!(value.value(), 0);
        assert_eq!(value.metrics().executions(), 1);
    }
}
