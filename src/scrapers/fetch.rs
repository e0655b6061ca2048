//! Page fetch capability used by site adapters.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// A fetched HTML page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Url that was requested.
    pub url: String,
    /// Url after redirects.
    pub final_url: String,
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP {0}")]
    Status(u16),
    #[error("browser error: {0}")]
    Browser(String),
}

impl FetchError {
    /// Whether repeating the same request may succeed.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Network(_) => true,
            Self::Status(code) => *code == 429 || *code >= 500,
            Self::Browser(_) => false,
        }
    }
}

/// Something that turns a url into page markup.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<FetchedPage, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retriable_errors() {
        assert!(FetchError::Timeout(Duration::from_secs(1)).is_retriable());
        assert!(FetchError::Network("reset".into()).is_retriable());
        assert!(FetchError::Status(429).is_retriable());
        assert!(FetchError::Status(502).is_retriable());
        assert!(!FetchError::Status(404).is_retriable());
        assert!(!FetchError::Status(403).is_retriable());
        assert!(!FetchError::Browser("crashed".into()).is_retriable());
    }
}
