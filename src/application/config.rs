//! Serializable invoker configuration.
//!
//! Lets call sites keep their debounce/throttle settings in configuration
//! files. Intervals are given in (possibly fractional) milliseconds and are
//! validated before use.

use crate::domain::edges::Edges;
use crate::domain::policy::{interval_from_millis, ConfigError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which policy an invoker uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Reset the delay on every call
    Debounce,
    /// Execute at most once per interval
    Throttle,
}

/// Invoker configuration.
///
/// # Example
/// ```
/// use quiesce::{Edges, InvokerConfig, Mode};
///
/// let config: InvokerConfig = serde_json::from_str(
///     r#"{ "mode": "debounce", "interval_ms": 300, "edges": "trailing" }"#,
/// ).unwrap();
///
/// assert_eq!(config.mode, Mode::Debounce);
/// assert_eq!(config.edges, Edges::Trailing);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokerConfig {
    /// Debounce or throttle
    pub mode: Mode,
    /// Delay (debounce) or interval (throttle) in milliseconds
    pub interval_ms: f64,
    /// Edges that trigger execution
    #[serde(default)]
    pub edges: Edges,
    /// Upper bound on deferral during a continuous burst (debounce only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_wait_ms: Option<f64>,
}

/// Durations extracted from a validated [`InvokerConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedConfig {
    /// Policy mode
    pub mode: Mode,
    /// Delay or interval
    pub interval: Duration,
    /// Edges
    pub edges: Edges,
    /// Maximum wait, debounce only
    pub max_wait: Option<Duration>,
}

impl InvokerConfig {
    /// Debounce configuration with default edges.
    pub fn debounce(delay_ms: f64) -> Self {
        Self {
            mode: Mode::Debounce,
            interval_ms: delay_ms,
            edges: Edges::default(),
            max_wait_ms: None,
        }
    }

    /// Throttle configuration with default edges.
    pub fn throttle(interval_ms: f64) -> Self {
        Self {
            mode: Mode::Throttle,
            interval_ms,
            edges: Edges::default(),
            max_wait_ms: None,
        }
    }

    /// Set the edges.
    pub fn with_edges(mut self, edges: Edges) -> Self {
        self.edges = edges;
        self
    }

    /// Set the maximum wait in milliseconds.
    pub fn with_max_wait_ms(mut self, max_wait_ms: f64) -> Self {
        self.max_wait_ms = Some(max_wait_ms);
        self
    }

    /// Check the configuration and convert it to durations.
    ///
    /// # Errors
    /// Returns `ConfigError` for negative or non-finite intervals, a
    /// `max_wait` on a throttle, or a `max_wait` shorter than the delay.
    pub fn validate(&self) -> Result<ValidatedConfig, ConfigError> {
        let interval = interval_from_millis(self.interval_ms)?;
        let max_wait = match (self.mode, self.max_wait_ms) {
            (_, None) => None,
            (Mode::Throttle, Some(_)) => return Err(ConfigError::MaxWaitOnThrottle),
            (Mode::Debounce, Some(ms)) => {
                let max_wait = interval_from_millis(ms)?;
                if max_wait < interval {
                    return Err(ConfigError::MaxWaitBelowDelay {
                        delay: interval,
                        max_wait,
                    });
                }
                Some(max_wait)
            }
        };

        Ok(ValidatedConfig {
            mode: self.mode,
            interval,
            edges: self.edges,
            max_wait,
        })
    }
}
