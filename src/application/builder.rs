//! Builder for invokers and the bindings layered on top of them.

use crate::application::config::{InvokerConfig, Mode};
use crate::application::effect::{Cleanup, EffectBinding};
use crate::application::invoker::Invoker;
use crate::application::ports::TimerQueue;
use crate::application::value::RateLimitedValue;
use crate::domain::edges::Edges;
use crate::domain::policy::{ConfigError, DebouncePolicy, Policy, ThrottlePolicy};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Error returned when building an invoker fails.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    /// Policy configuration was invalid
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// No timer queue was configured and none could be derived from the environment
    #[error("no timer queue configured and no tokio runtime available")]
    NoTimerQueue,
}

/// Builder for constructing an [`Invoker`].
///
/// Start from [`debounce`](Self::debounce), [`throttle`](Self::throttle) or
/// [`from_config`](Self::from_config). Edges default to leading and trailing.
///
/// Without an explicit timer queue, `build` uses the current tokio runtime
/// (feature `async`).
pub struct InvokerBuilder {
    mode: Mode,
    interval: Duration,
    edges: Edges,
    max_wait: Option<Duration>,
    signal: Option<CancellationToken>,
    queue: Option<Arc<dyn TimerQueue>>,
}

impl InvokerBuilder {
    /// Debounce with the given quiet period.
    pub fn debounce(delay: Duration) -> Self {
        Self::new(Mode::Debounce, delay)
    }

    /// Throttle with the given interval.
    pub fn throttle(interval: Duration) -> Self {
        Self::new(Mode::Throttle, interval)
    }

    fn new(mode: Mode, interval: Duration) -> Self {
        Self {
            mode,
            interval,
            edges: Edges::default(),
            max_wait: None,
            signal: None,
            queue: None,
        }
    }

    /// Start from a configuration value.
    ///
    /// # Errors
    /// Returns `ConfigError` if the configuration does not validate.
    pub fn from_config(config: &InvokerConfig) -> Result<Self, ConfigError> {
        let validated = config.validate()?;
        let mut builder = Self::new(validated.mode, validated.interval).with_edges(validated.edges);
        builder.max_wait = validated.max_wait;
        Ok(builder)
    }

    /// Set the edges that trigger execution.
    pub fn with_edges(mut self, edges: Edges) -> Self {
        self.edges = edges;
        self
    }

    /// Toggle the leading edge.
    pub fn with_leading(self, leading: bool) -> Self {
        let trailing = self.edges.trailing();
        self.with_edges(Edges::from_flags(leading, trailing))
    }

    /// Toggle the trailing edge.
    pub fn with_trailing(self, trailing: bool) -> Self {
        let leading = self.edges.leading();
        self.with_edges(Edges::from_flags(leading, trailing))
    }

    /// Bound how long a continuous burst may defer execution (debounce only).
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }

    /// Cancel the invoker when `signal` is cancelled.
    pub fn with_signal(mut self, signal: CancellationToken) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Use `queue` as the host timer facility.
    pub fn with_timer_queue(mut self, queue: Arc<dyn TimerQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    fn policy(&self) -> Result<Policy, ConfigError> {
        match self.mode {
            Mode::Debounce => {
                let policy = DebouncePolicy::new(self.interval, self.edges);
                let policy = match self.max_wait {
                    Some(max_wait) => policy.with_max_wait(max_wait)?,
                    None => policy,
                };
                Ok(Policy::Debounce(policy))
            }
            Mode::Throttle => {
                if self.max_wait.is_some() {
                    return Err(ConfigError::MaxWaitOnThrottle);
                }
                Ok(Policy::Throttle(ThrottlePolicy::new(self.interval, self.edges)))
            }
        }
    }

    fn into_parts(self) -> Result<(Policy, Arc<dyn TimerQueue>, Option<CancellationToken>), BuildError> {
        let policy = self.policy()?;
        let queue = match self.queue {
            Some(queue) => queue,
            None => default_queue()?,
        };
        Ok((policy, queue, self.signal))
    }

    /// Build an invoker around `action`.
    ///
    /// # Errors
    /// Returns `BuildError` if the configuration is invalid or no timer
    /// queue is available.
    pub fn build<A, F>(self, action: F) -> Result<Invoker<A>, BuildError>
    where
        A: Send + 'static,
        F: Fn(A) + Send + Sync + 'static,
    {
        let (policy, queue, signal) = self.into_parts()?;
        Ok(Invoker::new(policy, queue, Arc::new(action), signal))
    }

    /// Build a value tracker committing `initial` right away.
    ///
    /// # Errors
    /// Same as [`build`](Self::build).
    pub fn build_value<T>(self, initial: T) -> Result<RateLimitedValue<T>, BuildError>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
    {
        let (policy, queue, signal) = self.into_parts()?;
        Ok(RateLimitedValue::with_parts(initial, policy, queue, signal))
    }

    /// Build an effect binding around `effect`.
    ///
    /// # Errors
    /// Same as [`build`](Self::build).
    pub fn build_effect<D, F>(self, effect: F) -> Result<EffectBinding<D>, BuildError>
    where
        D: PartialEq,
        F: FnMut() -> Option<Cleanup> + Send + 'static,
    {
        let (policy, queue, signal) = self.into_parts()?;
        Ok(EffectBinding::with_parts(Box::new(effect), policy, queue, signal))
    }
}

impl fmt::Debug for InvokerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvokerBuilder")
            .field("mode", &self.mode)
            .field("interval", &self.interval)
            .field("edges", &self.edges)
            .field("max_wait", &self.max_wait)
            .field("has_signal", &self.signal.is_some())
            .field("has_timer_queue", &self.queue.is_some())
            .finish()
    }
}

#[cfg(feature = "async")]
fn default_queue() -> Result<Arc<dyn TimerQueue>, BuildError> {
    crate::infrastructure::tokio_timer::TokioTimerQueue::try_current()
        .map(|queue| Arc::new(queue) as Arc<dyn TimerQueue>)
        .ok_or(BuildError::NoTimerQueue)
}

#[cfg(not(feature = "async"))]
fn default_queue() -> Result<Arc<dyn TimerQueue>, BuildError> {
    Err(BuildError::NoTimerQueue)
}
