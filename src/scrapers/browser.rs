//! Headless Chrome fetcher for sites that render recipes with JavaScript.
//!
//! Compiled only with the `browser` feature; without it the fetcher exists
//! but every fetch fails with a `Browser` error.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::fetch::{FetchError, FetchedPage, PageFetcher};

#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig};
#[cfg(feature = "browser")]
use futures::StreamExt;
#[cfg(feature = "browser")]
use tokio::sync::Mutex;
#[cfg(feature = "browser")]
use tracing::{debug, info, warn};

/// Browser engine settings from the `browser` config block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrowserEngineConfig {
    /// Route sites flagged `browser = true` through Chrome.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_headless")]
    pub headless: bool,
    /// Proxy server url, e.g. `socks5://127.0.0.1:1080`.
    #[serde(default)]
    pub proxy: Option<String>,
    /// Extra time after the document is ready, for late scripts.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    #[serde(default)]
    pub chrome_args: Vec<String>,
}

fn default_headless() -> bool {
    true
}

fn default_settle_ms() -> u64 {
    2000
}

impl Default for BrowserEngineConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            headless: default_headless(),
            proxy: None,
            settle_ms: default_settle_ms(),
            chrome_args: Vec::new(),
        }
    }
}

impl BrowserEngineConfig {
    /// Apply `SCRAPER_HEADLESS`.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(value) = std::env::var("SCRAPER_HEADLESS") {
            self.headless = !matches!(value.to_ascii_lowercase().as_str(), "false" | "0" | "no");
        }
        self
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(feature = "browser")]
const READY_SCRIPT: &str = r#"
    new Promise((resolve) => {
        if (document.readyState === 'complete' || document.readyState === 'interactive') {
            resolve(document.readyState);
        } else {
            document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
        }
    })
"#;

#[cfg(feature = "browser")]
const CHROME_PATHS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
];

#[cfg(feature = "browser")]
pub struct BrowserFetcher {
    config: BrowserEngineConfig,
    user_agent: String,
    browser: Mutex<Option<Browser>>,
}

#[cfg(not(feature = "browser"))]
pub struct BrowserFetcher {
    #[allow(dead_code)]
    config: BrowserEngineConfig,
}

#[cfg(feature = "browser")]
impl BrowserFetcher {
    pub fn new(config: BrowserEngineConfig, user_agent: String) -> Self {
        Self {
            config,
            user_agent,
            browser: Mutex::new(None),
        }
    }

    fn find_chrome() -> Result<std::path::PathBuf, FetchError> {
        if let Some(path) = CHROME_PATHS
            .iter()
            .map(std::path::Path::new)
            .find(|p| p.exists())
        {
            return Ok(path.to_path_buf());
        }
        for cmd in ["google-chrome", "chromium", "chromium-browser"] {
            if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if output.status.success() && !path.is_empty() {
                    return Ok(std::path::PathBuf::from(path));
                }
            }
        }
        Err(FetchError::Browser("Chrome/Chromium not found".to_string()))
    }

    async fn launch(&self) -> Result<Browser, FetchError> {
        info!("Launching browser (headless={})", self.config.headless);
        let mut builder = BrowserConfig::builder().chrome_executable(Self::find_chrome()?);
        if !self.config.headless {
            builder = builder.with_head();
        }
        if let Some(ref proxy) = self.config.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }
        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-sandbox")
            .arg("--disable-gpu");
        for arg in &self.config.chrome_args {
            builder = builder.arg(arg);
        }
        let config = builder.build().map_err(FetchError::Browser)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| FetchError::Browser(format!("failed to launch browser: {}", e)))?;
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        Ok(browser)
    }

    async fn fetch_page(&self, url: &str, timeout: Duration) -> Result<FetchedPage, FetchError> {
        tokio::time::timeout(timeout, self.render(url))
            .await
            .map_err(|_| FetchError::Timeout(timeout))?
    }

    async fn render(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let page = {
            let mut guard = self.browser.lock().await;
            if guard.is_none() {
                *guard = Some(self.launch().await?);
            }
            let browser = guard
                .as_ref()
                .ok_or_else(|| FetchError::Browser("browser not running".to_string()))?;
            browser
                .new_page("about:blank")
                .await
                .map_err(|e| FetchError::Browser(e.to_string()))?
        };

        let result = async {
            page.execute(SetUserAgentOverrideParams::new(self.user_agent.clone()))
                .await
                .map_err(|e| FetchError::Browser(e.to_string()))?;

            debug!("Navigating to {}", url);
            let nav = NavigateParams::builder()
                .url(url)
                .build()
                .map_err(FetchError::Browser)?;
            page.execute(nav)
                .await
                .map_err(|e| FetchError::Network(e.to_string()))?;

            if let Err(e) = page.evaluate(READY_SCRIPT.to_string()).await {
                warn!("Could not check ready state for {}: {}", url, e);
            }
            tokio::time::sleep(Duration::from_millis(self.config.settle_ms)).await;

            let body = page
                .content()
                .await
                .map_err(|e| FetchError::Browser(e.to_string()))?;
            let final_url = page
                .url()
                .await
                .ok()
                .flatten()
                .unwrap_or_else(|| url.to_string());
            Ok(FetchedPage {
                url: url.to_string(),
                final_url,
                status: 200,
                body,
            })
        }
        .await;

        let _ = page.close().await;
        result
    }
}

#[cfg(not(feature = "browser"))]
impl BrowserFetcher {
    pub fn new(config: BrowserEngineConfig, _user_agent: String) -> Self {
        Self { config }
    }

    async fn fetch_page(&self, _url: &str, _timeout: Duration) -> Result<FetchedPage, FetchError> {
        Err(FetchError::Browser(
            "browser support not compiled, rebuild with --features browser".to_string(),
        ))
    }
}

#[async_trait]
impl PageFetcher for BrowserFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPage, FetchError> {
        self.fetch_page(url, timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_config_defaults() {
        let config: BrowserEngineConfig = toml::from_str("enabled = true").unwrap();
        assert!(config.enabled);
        assert!(config.headless);
        assert_eq!(config.settle_ms, 2000);
        assert!(BrowserEngineConfig::default().is_default());
    }

    #[cfg(not(feature = "browser"))]
    #[tokio::test]
    async fn test_fetch_without_feature_fails() {
        let fetcher = BrowserFetcher::new(BrowserEngineConfig::default(), String::new());
        let err = fetcher
            .fetch("https://tasty.co/recipe/x", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Browser(_)));
    }
}
