use std::time::Duration;

use crate::core::config::OrchestrationSettings;

/// Backoff applied to every activity invocation.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RetryPolicy {
    pub(crate) initial_interval: Duration,
    pub(crate) backoff_coefficient: f64,
    pub(crate) maximum_interval: Duration,
    pub(crate) maximum_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            backoff_coefficient: 2.0,
            maximum_interval: Duration::from_secs(60),
            maximum_attempts: 3,
        }
    }
}

impl RetryPolicy {
    pub(crate) fn from_settings(settings: &OrchestrationSettings) -> Self {
        Self {
            initial_interval: Duration::from_millis(settings.retry_initial_ms),
            backoff_coefficient: settings.retry_backoff,
            maximum_interval: Duration::from_millis(settings.retry_max_interval_ms),
            maximum_attempts: settings.retry_max_attempts.max(1),
        }
    }

    /// Delay before the attempt that follows failed attempt number `attempt`
    /// (1-based).
    pub(crate) fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let raw = self.initial_interval.as_secs_f64() * self.backoff_coefficient.powi(exponent);
        let capped = raw.min(self.maximum_interval.as_secs_f64());
        Duration::from_secs_f64(capped.max(0.0))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ActivityOptions {
    pub(crate) start_to_close_timeout: Duration,
    pub(crate) retry: RetryPolicy,
}

impl ActivityOptions {
    pub(crate) fn new(start_to_close_timeout: Duration, retry: RetryPolicy) -> Self {
        Self { start_to_close_timeout, retry }
    }
}
