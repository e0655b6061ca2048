//! reqwest-backed page fetcher with per-host rate limiting and proxy rotation.

mod proxy;
mod user_agent;

pub use proxy::ProxyRotator;
pub use user_agent::resolve_user_agent;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use super::fetch::{FetchError, FetchedPage, PageFetcher};
use super::rate_limiter::RateLimiter;

/// Plain HTTP fetcher shared by all configuration-driven adapters.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    /// One client per proxy, keyed by proxy url.
    proxied: HashMap<String, Client>,
    rotator: Arc<ProxyRotator>,
    rate_limiter: RateLimiter,
}

impl HttpFetcher {
    /// Build a fetcher without proxies.
    pub fn new(user_agent: Option<&str>, rate_limiter: RateLimiter) -> Result<Self, FetchError> {
        Self::with_proxies(user_agent, rate_limiter, ProxyRotator::default())
    }

    pub fn with_proxies(
        user_agent: Option<&str>,
        rate_limiter: RateLimiter,
        rotator: ProxyRotator,
    ) -> Result<Self, FetchError> {
        let user_agent = resolve_user_agent(user_agent);
        let client = build_client(&user_agent, None)?;

        let mut proxied = HashMap::new();
        for proxy in rotator.proxies() {
            match build_client(&user_agent, Some(proxy)) {
                Ok(c) => {
                    proxied.insert(proxy.clone(), c);
                }
                Err(e) => warn!("Skipping proxy {}: {}", proxy, e),
            }
        }

        Ok(Self {
            client,
            proxied,
            rotator: Arc::new(rotator),
            rate_limiter,
        })
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.rate_limiter
    }

    fn pick_client(&self) -> (Option<String>, &Client) {
        if let Some(proxy) = self.rotator.next_proxy() {
            if let Some(client) = self.proxied.get(&proxy) {
                return (Some(proxy), client);
            }
        }
        (None, &self.client)
    }
}

fn build_client(user_agent: &str, proxy: Option<&str>) -> Result<Client, FetchError> {
    let mut builder = Client::builder()
        .user_agent(user_agent)
        .gzip(true)
        .brotli(true)
        .cookie_store(true);
    if let Some(proxy) = proxy {
        let proxy = reqwest::Proxy::all(proxy)
            .map_err(|e| FetchError::Network(format!("invalid proxy {}: {}", proxy, e)))?;
        builder = builder.proxy(proxy);
    }
    builder
        .build()
        .map_err(|e| FetchError::Network(format!("failed to build HTTP client: {}", e)))
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPage, FetchError> {
        let host = self.rate_limiter.acquire(url).await;
        let (proxy, client) = self.pick_client();

        let start = Instant::now();
        let response = match client.get(url).timeout(timeout).send().await {
            Ok(r) => r,
            Err(e) => {
                if let Some(ref proxy) = proxy {
                    self.rotator.mark_failed(proxy);
                }
                return Err(if e.is_timeout() {
                    FetchError::Timeout(timeout)
                } else {
                    FetchError::Network(e.to_string())
                });
            }
        };

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        debug!("GET {} -> {} in {:?}", url, status, start.elapsed());

        if let Some(ref host) = host {
            let has_retry_after = response.headers().contains_key(reqwest::header::RETRY_AFTER);
            self.rate_limiter
                .report_status(host, url, status, has_retry_after)
                .await;
        }

        if !response.status().is_success() {
            return Err(FetchError::Status(status));
        }

        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(timeout)
            } else {
                FetchError::Network(e.to_string())
            }
        })?;

        Ok(FetchedPage {
            url: url.to_string(),
            final_url,
            status,
            body,
        })
    }
}
