//! Adaptive per-host rate limiter shared by every fetcher.
//!
//! Each host gets its own delay. Throttling answers (429, 503, or a burst of
//! 403s across distinct urls) multiply the delay; a run of successes shrinks
//! it back towards the base.

mod config;
mod host_state;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

pub use config::{HostStats, RateLimitConfig};
use host_state::HostState;

#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimitConfig,
    hosts: Arc<RwLock<HashMap<String, HostState>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::with_config(RateLimitConfig::default())
    }

    pub fn with_config(config: RateLimitConfig) -> Self {
        Self {
            config,
            hosts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn extract_host(url: &str) -> Option<String> {
        Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
    }

    /// Wait until the url's host may be contacted, then claim the slot.
    ///
    /// Returns the host key to report the response status against.
    pub async fn acquire(&self, url: &str) -> Option<String> {
        let host = Self::extract_host(url)?;

        loop {
            let wait = {
                let mut hosts = self.hosts.write().await;
                let state = hosts
                    .entry(host.clone())
                    .or_insert_with(|| HostState::new(self.config.base_delay));
                let wait = state.time_until_ready();
                if wait.is_zero() {
                    state.last_request = Some(Instant::now());
                    state.total_requests += 1;
                    return Some(host);
                }
                wait
            };
            debug!("Rate limiting {}: waiting {:?}", host, wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// Feed a response status back into the host's delay.
    pub async fn report_status(&self, host: &str, url: &str, status: u16, has_retry_after: bool) {
        match status {
            429 | 503 => self.report_throttled(host, status).await,
            403 => {
                self.report_forbidden(host, url, has_retry_after).await;
            }
            s if s >= 500 => self.report_server_error(host).await,
            s if (200..400).contains(&s) => self.report_success(host).await,
            _ => {}
        }
    }

    pub async fn report_success(&self, host: &str) {
        let mut hosts = self.hosts.write().await;
        let Some(state) = hosts.get_mut(host) else {
            return;
        };
        state.consecutive_successes += 1;
        state.clear_forbidden();

        if state.in_backoff && state.consecutive_successes >= self.config.recovery_threshold {
            let reduced = Duration::from_secs_f64(
                state.current_delay.as_secs_f64() * self.config.recovery_multiplier,
            );
            state.current_delay = reduced.max(self.config.min_delay);
            state.consecutive_successes = 0;

            if state.current_delay <= self.config.base_delay {
                state.in_backoff = false;
                state.current_delay = self.config.base_delay;
                info!("{} recovered from backoff", host);
            } else {
                debug!("{} delay reduced to {:?}", host, state.current_delay);
            }
        }
    }

    /// A 403 only counts as throttling with Retry-After or when several
    /// distinct urls were refused inside the window.
    pub async fn report_forbidden(&self, host: &str, url: &str, has_retry_after: bool) -> bool {
        let mut hosts = self.hosts.write().await;
        let Some(state) = hosts.get_mut(host) else {
            return false;
        };
        let pattern = state.add_forbidden(url);
        state.consecutive_successes = 0;

        if has_retry_after || pattern {
            let refused = state.distinct_forbidden();
            state.throttle_hits += 1;
            state.back_off(self.config.backoff_multiplier, self.config.max_delay);
            warn!(
                "{} refused {} urls, backing off to {:?}",
                host, refused, state.current_delay
            );
            return true;
        }
        debug!("403 from {} for {}, treating as access denied", host, url);
        false
    }

    pub async fn report_throttled(&self, host: &str, status: u16) {
        let mut hosts = self.hosts.write().await;
        if let Some(state) = hosts.get_mut(host) {
            state.throttle_hits += 1;
            state.back_off(self.config.backoff_multiplier, self.config.max_delay);
            warn!(
                "Throttled by {} (HTTP {}), backing off to {:?}",
                host, status, state.current_delay
            );
        }
    }

    /// Mild backoff, the server may just be overloaded.
    pub async fn report_server_error(&self, host: &str) {
        let mut hosts = self.hosts.write().await;
        if let Some(state) = hosts.get_mut(host) {
            state.current_delay = Duration::from_secs_f64(state.current_delay.as_secs_f64() * 1.5)
                .min(self.config.max_delay);
            debug!("Server error from {}, delay now {:?}", host, state.current_delay);
        }
    }

    pub async fn stats(&self) -> HashMap<String, HostStats> {
        let hosts = self.hosts.read().await;
        hosts
            .iter()
            .map(|(host, s)| {
                (
                    host.clone(),
                    HostStats {
                        current_delay: s.current_delay,
                        in_backoff: s.in_backoff,
                        total_requests: s.total_requests,
                        throttle_hits: s.throttle_hits,
                    },
                )
            })
            .collect()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
