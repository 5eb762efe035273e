//! Reconnect delay policy
//!
//! The default is a fixed 3 second retry. Capped exponential growth and
//! jitter are opt-in and do not change the external contract.

use std::time::Duration;

/// Default delay between reconnect attempts
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Controls how long the manager waits before each reconnect attempt
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// Delay before the first retry after a failure
    pub initial_delay: Duration,
    /// Upper bound for the delay
    pub max_delay: Duration,
    /// Growth factor per consecutive failure (1.0 = fixed delay)
    pub multiplier: f64,
    /// Random extra delay added on top, in `[0, jitter)`
    pub jitter: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::fixed(DEFAULT_RECONNECT_DELAY)
    }
}

impl ReconnectPolicy {
    /// Retry after the same delay every time
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1.0,
            jitter: Duration::ZERO,
        }
    }

    /// Double the delay after each consecutive failure, up to `max_delay`
    pub fn exponential(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
            multiplier: 2.0,
            jitter: Duration::ZERO,
        }
    }

    /// Add random jitter to every delay
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before retry number `attempt` (0-based count of prior retries)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let cap = self.max_delay.max(self.initial_delay);
        let factor = self.multiplier.max(1.0).powi(attempt.min(32) as i32);
        let base_ms = (self.initial_delay.as_millis() as f64 * factor).min(cap.as_millis() as f64);

        let jitter_ms = match self.jitter.as_millis() as u64 {
            0 => 0,
            max => rand::random::<u64>() % max,
        };

        Duration::from_millis(base_ms as u64 + jitter_ms)
    }
}
