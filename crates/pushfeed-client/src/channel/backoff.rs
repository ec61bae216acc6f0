//! Bounded exponential backoff for reconnect attempts

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::BackoffConfig;

/// Reconnect delay policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    max_attempts: u32,
    jitter: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::from_config(&BackoffConfig::default())
    }
}

impl Backoff {
    pub fn new(base: Duration, max: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            max,
            max_attempts,
            jitter: Duration::ZERO,
        }
    }

    pub fn from_config(config: &BackoffConfig) -> Self {
        Self {
            base: config.base_delay(),
            max: config.max_delay(),
            max_attempts: config.max_attempts,
            jitter: config.jitter(),
        }
    }

    /// Add up to `jitter` of pseudo-random delay to every retry
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Number of retries allowed before giving up
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether another retry may be scheduled after `attempt` retries
    pub fn allows(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay before retry `attempt` (0-based), without jitter
    pub fn base_delay_for(&self, attempt: u32) -> Duration {
        let delay = 2u32
            .checked_pow(attempt)
            .and_then(|factor| self.base.checked_mul(factor))
            .unwrap_or(self.max);
        delay.min(self.max)
    }

    /// Delay before retry `attempt` (0-based), jitter included
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay_for(attempt) + jitter_duration(self.jitter, attempt)
    }
}

fn jitter_duration(max_jitter: Duration, attempt: u32) -> Duration {
    if max_jitter.is_zero() {
        return Duration::ZERO;
    }

    let limit_nanos = max_jitter.as_nanos().min(u64::MAX as u128) as u64;
    let now_nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos() as u64;
    let mixed = now_nanos ^ (u64::from(attempt).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    Duration::from_nanos(mixed % (limit_nanos + 1))
}
