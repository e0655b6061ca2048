//! Site adapters for recipe sources and the fetch layer they share.

pub mod browser;
pub mod config;
pub mod configurable;
pub mod extract;
pub mod fetch;
mod http_client;
pub mod language;
pub mod operation;
pub mod rate_limiter;
pub mod registry;
pub mod sites;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

pub use browser::{BrowserEngineConfig, BrowserFetcher};
pub use config::{DiscoveryConfig, RecipeSelectors, SiteConfig};
pub use configurable::ConfigurableAdapter;
pub use fetch::{FetchError, FetchedPage, PageFetcher};
pub use http_client::{resolve_user_agent, HttpFetcher, ProxyRotator};
pub use language::Language;
pub use operation::{scrape_url, DiscardReason, RetryPolicy, ScrapeOutcome};
pub use rate_limiter::{RateLimitConfig, RateLimiter};
pub use registry::{RegistryError, SiteInfo, SiteRegistry};

use crate::models::{DietaryFilters, ScrapedRecipe};

/// Why an adapter could not produce a recipe.
#[derive(Debug, Clone, Error)]
pub enum ExtractionError {
    #[error(transparent)]
    Network(#[from] FetchError),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("recipe markup not found: {0}")]
    MarkupNotFound(String),
    #[error("unsupported layout: {0}")]
    UnsupportedLayout(String),
    #[error("expected {expected} text, found {found}")]
    LanguageMismatch { expected: String, found: String },
    #[error("empty result: {0}")]
    EmptyResult(String),
}

impl ExtractionError {
    /// Only transport problems are worth another attempt.
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_retriable(),
            Self::Timeout(_) => true,
            _ => false,
        }
    }
}

/// What a site search should look for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub keyword: Option<String>,
    pub filters: DietaryFilters,
}

impl SearchQuery {
    pub fn new(keyword: Option<String>, filters: DietaryFilters) -> Self {
        Self { keyword, filters }
    }

    /// Keyword plus dietary terms, or `None` when there is nothing to search.
    pub fn terms(&self) -> Option<String> {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(keyword) = self.keyword.as_deref().map(str::trim) {
            if !keyword.is_empty() {
                parts.push(keyword);
            }
        }
        parts.extend(self.filters.search_terms());
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

/// Per-site extraction contract.
///
/// `extract` is only called with urls on one of the adapter's `domains`. On
/// success the record has a non-blank title and at least one ingredient or
/// step.
#[async_trait]
pub trait SiteAdapter: Send + Sync {
    /// Display name, unique within a registry.
    fn name(&self) -> &str;

    /// Domains owned by this adapter, lowercase, without `www.`.
    fn domains(&self) -> &[String];

    /// Candidate recipe urls for a query, at most `limit`.
    async fn discover(&self, query: &SearchQuery, limit: usize) -> Result<Vec<String>, ExtractionError>;

    async fn extract(&self, url: &str) -> Result<ScrapedRecipe, ExtractionError>;

    fn owns(&self, url: &str) -> bool {
        host_of(url).is_some_and(|host| {
            self.domains().iter().any(|d| domain_matches(&host, d))
        })
    }
}

/// Lowercased host of a url.
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
}

/// Exact match, or `host` is a subdomain of `domain`.
pub fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// Normalize a configured domain: lowercase, no scheme, no `www.`, no path.
pub fn normalize_domain(domain: &str) -> String {
    let domain = domain.trim().to_ascii_lowercase();
    let domain = domain
        .split("://")
        .last()
        .unwrap_or_default()
        .split('/')
        .next()
        .unwrap_or_default();
    domain.strip_prefix("www.").unwrap_or(domain).to_string()
}

/// Enforce the record invariant on a freshly extracted recipe.
pub fn finish_record(recipe: ScrapedRecipe) -> Result<ScrapedRecipe, ExtractionError> {
    recipe.validate().map_err(ExtractionError::EmptyResult)?;
    Ok(recipe)
}
