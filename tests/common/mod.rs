//! Scripted sites and service setup shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use recetario::models::{DietaryFilters, JobSnapshot, NewRecipe, ScrapedRecipe};
use recetario::repository::{MemoryRecipeStore, RecipeStore};
use recetario::scrapers::{
    ExtractionError, FetchError, Language, RetryPolicy, SearchQuery, SiteAdapter, SiteRegistry,
};
use recetario::services::{canonical_url, RunnerConfig, SearchConfig, SearchService};

/// What a scripted url does when extracted.
#[derive(Debug, Clone)]
pub enum Page {
    Valid,
    English,
    Empty,
    NetworkError,
    Slow(Duration),
    Panic,
}

/// Tracks how many extractions run at once, across every site sharing it.
#[derive(Debug, Default)]
pub struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct ScriptedSite {
    name: String,
    domains: Vec<String>,
    pages: Vec<(String, Page)>,
    discover_error: bool,
    extracted: AtomicUsize,
    gauge: Option<Arc<Gauge>>,
}

impl ScriptedSite {
    pub fn new(name: &str, domain: &str, pages: &[Page]) -> Self {
        let pages = pages
            .iter()
            .enumerate()
            .map(|(i, page)| (format!("https://{}/receta/{}", domain, i + 1), page.clone()))
            .collect();
        Self {
            name: name.to_string(),
            domains: vec![domain.to_string()],
            pages,
            discover_error: false,
            extracted: AtomicUsize::new(0),
            gauge: None,
        }
    }

    pub fn with_gauge(mut self, gauge: Arc<Gauge>) -> Self {
        self.gauge = Some(gauge);
        self
    }

    pub fn failing_discovery(mut self) -> Self {
        self.discover_error = true;
        self
    }

    pub fn url(&self, index: usize) -> String {
        self.pages[index].0.clone()
    }

    pub fn extracted(&self) -> usize {
        self.extracted.load(Ordering::SeqCst)
    }

    fn page(&self, url: &str) -> Option<&Page> {
        self.pages.iter().find(|(u, _)| u == url).map(|(_, p)| p)
    }
}

pub fn spanish_recipe(url: &str, site: &str) -> ScrapedRecipe {
    let mut recipe = ScrapedRecipe::new(url, site, "Tortilla de papas");
    recipe.ingredients = vec![
        "4 huevos".to_string(),
        "2 papas".to_string(),
        "Sal y aceite".to_string(),
    ];
    recipe.steps = vec!["Cocinar las papas en aceite hasta dorar y agregar los huevos.".to_string()];
    recipe
}

fn english_recipe(url: &str, site: &str) -> ScrapedRecipe {
    let mut recipe = ScrapedRecipe::new(url, site, "Banana bread");
    recipe.ingredients = vec![
        "2 cups flour".to_string(),
        "1 cup sugar".to_string(),
        "3 eggs".to_string(),
    ];
    recipe.steps = vec!["Mix the flour with the sugar and bake in the oven for 40 minutes.".to_string()];
    recipe
}

#[async_trait]
impl SiteAdapter for ScriptedSite {
    fn name(&self) -> &str {
        &self.name
    }

    fn domains(&self) -> &[String] {
        &self.domains
    }

    async fn discover(&self, _query: &SearchQuery, limit: usize) -> Result<Vec<String>, ExtractionError> {
        if self.discover_error {
            return Err(ExtractionError::Network(FetchError::Status(503)));
        }
        Ok(self.pages.iter().take(limit).map(|(u, _)| u.clone()).collect())
    }

    async fn extract(&self, url: &str) -> Result<ScrapedRecipe, ExtractionError> {
        self.extracted.fetch_add(1, Ordering::SeqCst);
        if let Some(ref gauge) = self.gauge {
            gauge.enter();
        }
        let result = self.run_page(url).await;
        if let Some(ref gauge) = self.gauge {
            gauge.leave();
        }
        result
    }
}

impl ScriptedSite {
    async fn run_page(&self, url: &str) -> Result<ScrapedRecipe, ExtractionError> {
        match self.page(url) {
            Some(Page::Valid) => Ok(spanish_recipe(url, &self.name)),
            Some(Page::English) => Ok(english_recipe(url, &self.name)),
            Some(Page::Empty) => Ok(ScrapedRecipe::new(url, &self.name, "Receta sin contenido")),
            Some(Page::NetworkError) => Err(ExtractionError::Network(FetchError::Network(
                "connection reset".to_string(),
            ))),
            Some(Page::Slow(delay)) => {
                tokio::time::sleep(*delay).await;
                Ok(spanish_recipe(url, &self.name))
            }
            Some(Page::Panic) => panic!("scripted adapter bug"),
            None => Err(ExtractionError::UnsupportedLayout(url.to_string())),
        }
    }
}

pub fn test_config() -> SearchConfig {
    SearchConfig {
        runner: RunnerConfig {
            retry: RetryPolicy {
                timeout: Duration::from_secs(5),
                max_retries: 1,
                backoff: Duration::from_millis(1),
            },
            language: Some(Language::Spanish),
            max_parallel_sites: 3,
            sequential_site_delay: Duration::ZERO,
        },
        job_ttl: Duration::from_secs(3600),
    }
}

pub fn registry(sites: Vec<Arc<ScriptedSite>>) -> Arc<SiteRegistry> {
    let mut registry = SiteRegistry::new();
    for site in sites {
        registry.register(site).unwrap();
    }
    Arc::new(registry)
}

pub fn service(
    sites: Vec<Arc<ScriptedSite>>,
    store: Arc<MemoryRecipeStore>,
    config: SearchConfig,
) -> SearchService {
    SearchService::new(registry(sites), store, config)
}

/// Put a recipe in the store as if an earlier run had saved it.
pub async fn seed(store: &MemoryRecipeStore, url: &str) {
    store
        .save(NewRecipe {
            canonical_url: canonical_url(url),
            recipe: spanish_recipe(url, "seed"),
            dietary: DietaryFilters::default(),
        })
        .await
        .unwrap();
}

/// found = new + duplicate + discarded, per site and in total.
pub fn assert_balanced(snapshot: &JobSnapshot) {
    for site in &snapshot.sites {
        let c = &site.counters;
        assert_eq!(
            c.found,
            c.new + c.duplicate + c.discarded_empty + c.discarded_language,
            "site {} is unbalanced",
            site.name
        );
    }
    assert_eq!(
        snapshot.total_found,
        snapshot.total_new
            + snapshot.total_duplicate
            + snapshot.total_discarded_empty
            + snapshot.total_discarded_language
    );
    assert_eq!(
        snapshot.total_found,
        snapshot.sites.iter().map(|s| s.counters.found).sum::<u64>()
    );
}

/// Wait for a job with a ceiling so a hung job fails the test.
pub async fn finish(service: &SearchService, job_id: &uuid::Uuid) -> JobSnapshot {
    tokio::time::timeout(Duration::from_secs(10), service.wait(job_id))
        .await
        .expect("job did not finish in time")
        .unwrap()
}

pub fn site_counts(snapshot: &JobSnapshot) -> HashMap<String, u64> {
    snapshot
        .sites
        .iter()
        .map(|s| (s.name.clone(), s.counters.found))
        .collect()
}
