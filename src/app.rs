//! Builds the shared services from resolved settings.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::{Config, Settings};
use crate::repository::{MemoryRecipeStore, RecipeStore, SqliteRecipeStore};
use crate::scrapers::sites::{builtin_registry, SiteFetchers};
use crate::scrapers::{
    resolve_user_agent, BrowserFetcher, HttpFetcher, PageFetcher, ProxyRotator, RateLimitConfig,
    RateLimiter, SiteRegistry,
};
use crate::services::SearchService;

/// Where scraped recipes are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreKind {
    #[default]
    Sqlite,
    /// Process lifetime only.
    Memory,
}

/// Everything a command or the server needs, built once per process.
#[derive(Clone)]
pub struct AppContext {
    pub settings: Settings,
    pub registry: Arc<SiteRegistry>,
    pub store: Arc<dyn RecipeStore>,
    pub search: Arc<SearchService>,
}

impl AppContext {
    pub fn build(settings: Settings, config: &Config, store: StoreKind) -> anyhow::Result<Self> {
        let registry = Arc::new(build_registry(&settings, config)?);
        info!("{} sites registered", registry.len());

        let store: Arc<dyn RecipeStore> = match store {
            StoreKind::Memory => Arc::new(MemoryRecipeStore::new()),
            StoreKind::Sqlite => {
                let path = settings.database_path();
                debug!("Opening recipe database at {}", path.display());
                Arc::new(SqliteRecipeStore::new(&path)?)
            }
        };

        Ok(Self::from_parts(settings, registry, store))
    }

    /// Assemble a context around an existing registry and store.
    pub fn from_parts(settings: Settings, registry: Arc<SiteRegistry>, store: Arc<dyn RecipeStore>) -> Self {
        let search = Arc::new(SearchService::new(
            registry.clone(),
            store.clone(),
            settings.search_config(),
        ));
        Self {
            settings,
            registry,
            store,
            search,
        }
    }
}

fn build_registry(settings: &Settings, config: &Config) -> anyhow::Result<SiteRegistry> {
    let limiter = RateLimiter::with_config(RateLimitConfig::with_base_delay(Duration::from_millis(
        settings.request_delay_ms,
    )));
    let http = HttpFetcher::with_proxies(
        settings.user_agent.as_deref(),
        limiter,
        ProxyRotator::new(settings.proxies.clone()),
    )?;

    let mut fetchers = SiteFetchers::new(Arc::new(http), settings.request_timeout());
    if settings.browser.enabled {
        let user_agent = resolve_user_agent(settings.user_agent.as_deref());
        let browser: Arc<dyn PageFetcher> = Arc::new(BrowserFetcher::new(settings.browser.clone(), user_agent));
        fetchers = fetchers.with_browser(browser);
    }

    Ok(builtin_registry(&fetchers, &config.sites)?)
}
