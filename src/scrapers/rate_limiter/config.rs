//! Rate limiter tuning.

use std::time::Duration;

/// Window in which repeated 403s on distinct urls count as throttling.
pub const FORBIDDEN_WINDOW: Duration = Duration::from_secs(30);

/// Distinct urls answering 403 inside the window before backing off.
pub const FORBIDDEN_THRESHOLD: usize = 3;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Delay between two requests to the same host while healthy.
    pub base_delay: Duration,
    pub min_delay: Duration,
    /// Ceiling for backoff.
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Applied on recovery, below 1.0.
    pub recovery_multiplier: f64,
    /// Successes in a row before the delay shrinks again.
    pub recovery_threshold: u32,
}

impl RateLimitConfig {
    /// Default tuning around a different healthy delay.
    pub fn with_base_delay(base_delay: Duration) -> Self {
        Self {
            base_delay,
            min_delay: base_delay.min(Duration::from_millis(100)),
            ..Default::default()
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(2000),
            min_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            recovery_multiplier: 0.8,
            recovery_threshold: 5,
        }
    }
}

/// Snapshot of one host's limiter state.
#[derive(Debug, Clone, PartialEq)]
pub struct HostStats {
    pub current_delay: Duration,
    pub in_backoff: bool,
    pub total_requests: u64,
    pub throttle_hits: u64,
}
