//! Delay between connection attempts.

use std::time::Duration;

use hw_core::config::{BackoffKind, ConnectionConfig};

/// Backoff policy for automatic reconnection.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub kind: BackoffKind,
    /// Delay before the first retry (and every retry when fixed).
    pub base_delay: Duration,
    /// Maximum delay cap for exponential backoff.
    pub max_delay: Duration,
    /// Jitter factor (0.0 to 1.0) applied to exponential delays.
    pub jitter_factor: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_millis(hw_core::constants::DEFAULT_RETRY_DELAY_MS))
    }
}

impl BackoffPolicy {
    /// The same delay before every attempt.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            kind: BackoffKind::Fixed,
            base_delay: delay,
            max_delay: delay,
            jitter_factor: 0.0,
        }
    }

    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self {
            kind: config.backoff,
            base_delay: config.retry_delay(),
            max_delay: config.max_retry_delay(),
            jitter_factor: config.jitter_factor.clamp(0.0, 1.0),
        }
    }

    /// Delay to wait after `attempt` (1-based) failed.
    ///
    /// Exponential sequence: base, 2·base, 4·base, ... capped at max_delay,
    /// then +/- jitter_factor of the capped value.
    pub fn delay(&self, attempt: u32) -> Duration {
        match self.kind {
            BackoffKind::Fixed => self.base_delay,
            BackoffKind::Exponential => {
                let base = self.base_delay.as_secs_f64();
                let max = self.max_delay.as_secs_f64().max(base);
                let exponent = attempt.saturating_sub(1).min(30) as i32;
                let exponential = (base * 2.0_f64.powi(exponent)).min(max);

                let jitter_range = exponential * self.jitter_factor;
                let jitter = (rand::random::<f64>() * 2.0 - 1.0) * jitter_range;
                Duration::from_secs_f64((exponential + jitter).max(0.0))
            }
        }
    }
}
