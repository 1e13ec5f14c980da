//! Scheduling policies for rate-limited execution.
//!
//! A policy is a pure state machine: it is told when calls arrive, when the
//! single timer elapses and when the caller forces a flush, and answers what
//! the invoker should do. Policies never touch timers, arguments or the
//! action themselves, which keeps them testable with plain `Instant`s.

use crate::domain::edges::Edges;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Error returned when an interval or policy configuration is invalid.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Interval given in milliseconds was negative
    #[error("interval must not be negative, got {0}ms")]
    NegativeInterval(f64),
    /// Interval given in milliseconds was NaN or infinite
    #[error("interval must be a finite number, got {0}ms")]
    NonFiniteInterval(f64),
    /// `max_wait` shorter than the debounce delay
    #[error("max_wait ({max_wait:?}) must not be shorter than the delay ({delay:?})")]
    MaxWaitBelowDelay {
        /// Configured debounce delay
        delay: Duration,
        /// Configured maximum wait
        max_wait: Duration,
    },
    /// `max_wait` only applies to debounce
    #[error("max_wait is only supported for debounce")]
    MaxWaitOnThrottle,
}

/// Convert a millisecond count into a `Duration`.
///
/// Zero is accepted and means "execute synchronously on every call".
///
/// # Errors
/// Returns `ConfigError` for negative, NaN or infinite inputs.
///
/// # Example
/// ```
/// use quiesce::{interval_from_millis, ConfigError};
/// use std::time::Duration;
///
/// assert_eq!(interval_from_millis(250.0).unwrap(), Duration::from_millis(250));
/// assert!(matches!(interval_from_millis(-1.0), Err(ConfigError::NegativeInterval(_))));
/// assert!(matches!(interval_from_millis(f64::NAN), Err(ConfigError::NonFiniteInterval(_))));
/// ```
pub fn interval_from_millis(millis: f64) -> Result<Duration, ConfigError> {
    if !millis.is_finite() {
        return Err(ConfigError::NonFiniteInterval(millis));
    }
    if millis < 0.0 {
        return Err(ConfigError::NegativeInterval(millis));
    }
    // Whole nanoseconds; saturates for absurdly large inputs.
    Ok(Duration::from_nanos((millis * 1_000_000.0).round() as u64))
}

/// What the invoker should do with the arguments of a `run` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallAction {
    /// Execute the action now with these arguments (leading edge)
    ExecuteNow,
    /// Keep the arguments as the pending trailing arguments
    Defer,
    /// Discard the arguments
    Drop,
}

/// What the invoker should do with its single timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCommand {
    /// Leave the current timer (or its absence) untouched
    Keep,
    /// Replace any current timer with one elapsing after the duration
    Arm(Duration),
}

/// Decision made by a policy for one `run` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallDecision {
    /// What to do with the call's arguments
    pub action: CallAction,
    /// What to do with the timer
    pub timer: TimerCommand,
}

impl CallDecision {
    fn new(action: CallAction, timer: TimerCommand) -> Self {
        Self { action, timer }
    }

    /// Check if this decision executes the action immediately.
    pub fn is_execute(&self) -> bool {
        matches!(self.action, CallAction::ExecuteNow)
    }
}

/// Trait for scheduling policies.
pub trait SchedulingPolicy: Send {
    /// Register a `run` call at `now`.
    fn on_call(&mut self, now: Instant) -> CallDecision;

    /// The armed timer elapsed at `now`.
    ///
    /// Returns `true` if the pending trailing arguments must be executed.
    fn on_timer(&mut self, now: Instant) -> bool;

    /// The caller forced a flush at `now`.
    ///
    /// Returns `true` if a trailing execution was pending and must run now.
    /// The timer must be dropped in that case.
    fn on_flush(&mut self, now: Instant) -> bool;

    /// Whether a trailing execution is pending.
    fn is_pending(&self) -> bool;

    /// Forget all history, as if freshly created.
    fn reset(&mut self);
}

/// Debounce: execute once input activity quiesces.
///
/// Every call restarts the quiet period. With the leading edge, the first
/// call after a quiet period executes immediately; with the trailing edge,
/// the latest arguments execute once the quiet period elapses.
///
/// # Example
/// ```
/// use quiesce::{CallAction, DebouncePolicy, Edges, SchedulingPolicy};
/// use std::time::{Duration, Instant};
///
/// let mut policy = DebouncePolicy::new(Duration::from_millis(200), Edges::Trailing);
/// let t0 = Instant::now();
///
/// assert_eq!(policy.on_call(t0).action, CallAction::Defer);
/// assert_eq!(policy.on_call(t0 + Duration::from_millis(50)).action, CallAction::Defer);
///
/// // Timer elapses 200ms after the last call
/// assert!(policy.on_timer(t0 + Duration::from_millis(250)));
/// assert!(!policy.is_pending());
/// ```
#[derive(Debug, Clone)]
pub struct DebouncePolicy {
    delay: Duration,
    max_wait: Option<Duration>,
    edges: Edges,
    last_call: Option<Instant>,
    window_start: Option<Instant>,
    last_invoked: Option<Instant>,
    armed: bool,
    pending: bool,
}

impl DebouncePolicy {
    /// Create a new debounce policy.
    pub fn new(delay: Duration, edges: Edges) -> Self {
        Self {
            delay,
            max_wait: None,
            edges,
            last_call: None,
            window_start: None,
            last_invoked: None,
            armed: false,
            pending: false,
        }
    }

    /// Bound how long a continuous burst may defer execution.
    ///
    /// # Errors
    /// Returns `ConfigError::MaxWaitBelowDelay` if `max_wait < delay`.
    pub fn with_max_wait(mut self, max_wait: Duration) -> Result<Self, ConfigError> {
        if max_wait < self.delay {
            return Err(ConfigError::MaxWaitBelowDelay {
                delay: self.delay,
                max_wait,
            });
        }
        self.max_wait = Some(max_wait);
        Ok(self)
    }

    /// The configured quiet period.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// The configured maximum wait, if any.
    pub fn max_wait(&self) -> Option<Duration> {
        self.max_wait
    }

    fn quiet_elapsed(&self, now: Instant) -> bool {
        self.last_call
            .map_or(true, |t| now.saturating_duration_since(t) >= self.delay)
    }

    fn max_wait_elapsed(&self, now: Instant) -> bool {
        match (self.max_wait, self.last_invoked) {
            (Some(max), Some(t)) => now.saturating_duration_since(t) >= max,
            _ => false,
        }
    }

    fn trailing_wait(&self, now: Instant) -> Duration {
        match (self.max_wait, self.window_start) {
            // A cap past the end of representable time never binds.
            (Some(max), Some(start)) => match start.checked_add(max) {
                Some(cap) => self.delay.min(cap.saturating_duration_since(now)),
                None => self.delay,
            },
            _ => self.delay,
        }
    }
}

impl SchedulingPolicy for DebouncePolicy {
    fn on_call(&mut self, now: Instant) -> CallDecision {
        if !self.edges.any() {
            return CallDecision::new(CallAction::Drop, TimerCommand::Keep);
        }
        if self.delay.is_zero() {
            self.last_call = Some(now);
            self.last_invoked = Some(now);
            return CallDecision::new(CallAction::ExecuteNow, TimerCommand::Keep);
        }

        let idle = !self.armed && self.quiet_elapsed(now);
        let leading_due = idle || (!self.edges.trailing() && self.max_wait_elapsed(now));
        self.last_call = Some(now);
        if idle {
            self.window_start = Some(now);
        }

        let action = if self.edges.leading() && leading_due {
            self.last_invoked = Some(now);
            self.window_start = Some(now);
            CallAction::ExecuteNow
        } else if self.edges.trailing() {
            self.pending = true;
            CallAction::Defer
        } else {
            CallAction::Drop
        };

        let timer = if self.edges.trailing() {
            self.armed = true;
            TimerCommand::Arm(self.trailing_wait(now))
        } else {
            TimerCommand::Keep
        };

        CallDecision::new(action, timer)
    }

    fn on_timer(&mut self, now: Instant) -> bool {
        self.armed = false;
        if !self.pending {
            return false;
        }
        self.pending = false;
        self.last_invoked = Some(now);
        self.window_start = Some(now);
        true
    }

    fn on_flush(&mut self, now: Instant) -> bool {
        if !self.pending {
            return false;
        }
        self.pending = false;
        self.armed = false;
        self.last_invoked = Some(now);
        self.window_start = Some(now);
        true
    }

    fn is_pending(&self) -> bool {
        self.pending
    }

    fn reset(&mut self) {
        self.last_call = None;
        self.window_start = None;
        self.last_invoked = None;
        self.armed = false;
        self.pending = false;
    }
}

/// Throttle: execute at most once per interval.
///
/// With the leading edge the first call of a window executes immediately.
/// Later calls inside the window only replace the pending arguments, which
/// the trailing edge delivers when the window closes. After a trailing
/// execution no timer runs until the next call arrives.
///
/// # Example
/// ```
/// use quiesce::{CallAction, Edges, SchedulingPolicy, ThrottlePolicy, TimerCommand};
/// use std::time::{Duration, Instant};
///
/// let mut policy = ThrottlePolicy::new(Duration::from_millis(100), Edges::Both);
/// let t0 = Instant::now();
///
/// assert!(policy.on_call(t0).is_execute());
///
/// let decision = policy.on_call(t0 + Duration::from_millis(30));
/// assert_eq!(decision.action, CallAction::Defer);
/// assert_eq!(decision.timer, TimerCommand::Arm(Duration::from_millis(70)));
///
/// assert!(policy.on_timer(t0 + Duration::from_millis(100)));
/// ```
#[derive(Debug, Clone)]
pub struct ThrottlePolicy {
    interval: Duration,
    edges: Edges,
    last_invoked: Option<Instant>,
    armed: bool,
    pending: bool,
}

impl ThrottlePolicy {
    /// Create a new throttle policy.
    pub fn new(interval: Duration, edges: Edges) -> Self {
        Self {
            interval,
            edges,
            last_invoked: None,
            armed: false,
            pending: false,
        }
    }

    /// The configured interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn window_open(&self, now: Instant) -> bool {
        self.last_invoked
            .map_or(true, |t| now.saturating_duration_since(t) >= self.interval)
    }
}

impl SchedulingPolicy for ThrottlePolicy {
    fn on_call(&mut self, now: Instant) -> CallDecision {
        if !self.edges.any() {
            return CallDecision::new(CallAction::Drop, TimerCommand::Keep);
        }
        if self.interval.is_zero() {
            self.last_invoked = Some(now);
            return CallDecision::new(CallAction::ExecuteNow, TimerCommand::Keep);
        }

        if self.window_open(now) && !self.armed {
            if self.edges.leading() {
                self.last_invoked = Some(now);
                return CallDecision::new(CallAction::ExecuteNow, TimerCommand::Keep);
            }
            self.pending = true;
            self.armed = true;
            return CallDecision::new(CallAction::Defer, TimerCommand::Arm(self.interval));
        }

        if !self.edges.trailing() {
            return CallDecision::new(CallAction::Drop, TimerCommand::Keep);
        }

        self.pending = true;
        if self.armed {
            return CallDecision::new(CallAction::Defer, TimerCommand::Keep);
        }
        self.armed = true;
        // An unrepresentable window end means the window never reopens.
        let remaining = self
            .last_invoked
            .and_then(|t| t.checked_add(self.interval))
            .map_or(self.interval, |end| end.saturating_duration_since(now));
        CallDecision::new(CallAction::Defer, TimerCommand::Arm(remaining))
    }

    fn on_timer(&mut self, now: Instant) -> bool {
        self.armed = false;
        if !self.pending {
            return false;
        }
        self.pending = false;
        self.last_invoked = Some(now);
        true
    }

    fn on_flush(&mut self, now: Instant) -> bool {
        if !self.pending {
            return false;
        }
        self.pending = false;
        self.armed = false;
        self.last_invoked = Some(now);
        true
    }

    fn is_pending(&self) -> bool {
        self.pending
    }

    fn reset(&mut self) {
        self.last_invoked = None;
        self.armed = false;
        self.pending = false;
    }
}

/// Convenience enum over the built-in policies.
#[derive(Debug, Clone)]
pub enum Policy {
    /// Debounce policy
    Debounce(DebouncePolicy),
    /// Throttle policy
    Throttle(ThrottlePolicy),
}

impl Policy {
    /// Create a debounce policy.
    pub fn debounce(delay: Duration, edges: Edges) -> Self {
        Policy::Debounce(DebouncePolicy::new(delay, edges))
    }

    /// Create a throttle policy.
    pub fn throttle(interval: Duration, edges: Edges) -> Self {
        Policy::Throttle(ThrottlePolicy::new(interval, edges))
    }

    /// Short name used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Policy::Debounce(_) => "debounce",
            Policy::Throttle(_) => "throttle",
        }
    }

    /// The configured delay or interval.
    pub fn interval(&self) -> Duration {
        match self {
            Policy::Debounce(p) => p.delay(),
            Policy::Throttle(p) => p.interval(),
        }
    }

    /// The configured edges.
    pub fn edges(&self) -> Edges {
        match self {
            Policy::Debounce(p) => p.edges,
            Policy::Throttle(p) => p.edges,
        }
    }
}

impl SchedulingPolicy for Policy {
    fn on_call(&mut self, now: Instant) -> CallDecision {
        match self {
            Policy::Debounce(p) => p.on_call(now),
            Policy::Throttle(p) => p.on_call(now),
        }
    }

    fn on_timer(&mut self, now: Instant) -> bool {
        match self {
            Policy::Debounce(p) => p.on_timer(now),
            Policy::Throttle(p) => p.on_timer(now),
        }
    }

    fn on_flush(&mut self, now: Instant) -> bool {
        match self {
            Policy::Debounce(p) => p.on_flush(now),
            Policy::Throttle(p) => p.on_flush(now),
        }
    }

    fn is_pending(&self) -> bool {
        match self {
            Policy::Debounce(p) => p.is_pending(),
            Policy::Throttle(p) => p.is_pending(),
        }
    }

    fn reset(&mut self) {
        match self {
            Policy::Debounce(p) => p.reset(),
            Policy::Throttle(p) => p.reset(),
        }
    }
}
