//! Per-host limiter state.

use std::time::{Duration, Instant};

use super::config::{FORBIDDEN_THRESHOLD, FORBIDDEN_WINDOW};

#[derive(Debug, Clone)]
pub struct HostState {
    pub current_delay: Duration,
    pub last_request: Option<Instant>,
    pub consecutive_successes: u32,
    /// Recent 403 answers, oldest first.
    pub recent_forbidden: Vec<(Instant, String)>,
    pub in_backoff: bool,
    pub total_requests: u64,
    pub throttle_hits: u64,
}

impl HostState {
    pub fn new(base_delay: Duration) -> Self {
        Self {
            current_delay: base_delay,
            last_request: None,
            consecutive_successes: 0,
            recent_forbidden: Vec::new(),
            in_backoff: false,
            total_requests: 0,
            throttle_hits: 0,
        }
    }

    /// Record a 403 and report whether the window now looks like throttling.
    pub fn add_forbidden(&mut self, url: &str) -> bool {
        let now = Instant::now();
        self.recent_forbidden
            .retain(|(at, _)| now.duration_since(*at) <= FORBIDDEN_WINDOW);
        self.recent_forbidden.push((now, url.to_string()));
        self.distinct_forbidden() >= FORBIDDEN_THRESHOLD
    }

    pub fn distinct_forbidden(&self) -> usize {
        let mut urls: Vec<&str> = self.recent_forbidden.iter().map(|(_, u)| u.as_str()).collect();
        urls.sort_unstable();
        urls.dedup();
        urls.len()
    }

    pub fn clear_forbidden(&mut self) {
        self.recent_forbidden.clear();
    }

    /// Multiply the delay, clamped to `max`, and enter backoff.
    pub fn back_off(&mut self, multiplier: f64, max: Duration) {
        self.in_backoff = true;
        self.consecutive_successes = 0;
        self.clear_forbidden();
        self.current_delay =
            Duration::from_secs_f64(self.current_delay.as_secs_f64() * multiplier).min(max);
    }

    pub fn time_until_ready(&self) -> Duration {
        match self.last_request {
            Some(last) => self.current_delay.saturating_sub(last.elapsed()),
            None => Duration::ZERO,
        }
    }
}
