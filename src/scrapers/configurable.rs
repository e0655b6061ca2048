//! Selector-driven site adapter.
//!
//! Reads everything it needs from a [`SiteConfig`], so adding a site with a
//! conventional layout needs no code.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use scraper::Html;
use tracing::debug;

use super::config::SiteConfig;
use super::extract::{
    absolutize, first_non_empty_list, meta_content, parse_selector, safe_image, safe_text,
    structured_recipe,
};
use super::fetch::PageFetcher;
use super::registry::RegistryError;
use super::{finish_record, normalize_domain, ExtractionError, SearchQuery, SiteAdapter};
use crate::models::ScrapedRecipe;

pub struct ConfigurableAdapter {
    name: String,
    domains: Vec<String>,
    config: SiteConfig,
    link_pattern: Option<Regex>,
    fetcher: Arc<dyn PageFetcher>,
    timeout: Duration,
}

impl ConfigurableAdapter {
    pub fn new(
        name: impl Into<String>,
        config: SiteConfig,
        fetcher: Arc<dyn PageFetcher>,
        timeout: Duration,
    ) -> Result<Self, RegistryError> {
        let name = config.name.clone().unwrap_or_else(|| name.into());
        let domains: Vec<String> = config.domains.iter().map(|d| normalize_domain(d)).collect();
        if domains.is_empty() {
            return Err(RegistryError::InvalidSite {
                site: name,
                reason: "no domains configured".to_string(),
            });
        }
        let link_pattern = config
            .discovery
            .link_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| RegistryError::InvalidSite {
                site: name.clone(),
                reason: format!("invalid link_pattern: {}", e),
            })?;

        Ok(Self {
            name,
            domains,
            config,
            link_pattern,
            fetcher,
            timeout,
        })
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    /// Body of a page on this site, fetched with the adapter's timeout.
    pub async fn fetch_html(&self, url: &str) -> Result<String, ExtractionError> {
        let page = self.fetcher.fetch(url, self.timeout).await?;
        Ok(page.body)
    }

    /// Page to start discovery from: the search url when there is
    /// something to search, else the listing page.
    pub fn discovery_url(&self, query: &SearchQuery) -> Option<String> {
        let discovery = &self.config.discovery;
        match (query.terms(), &discovery.search_url) {
            (Some(terms), Some(template)) => {
                Some(template.replace("{query}", &urlencoding::encode(&terms)))
            }
            _ => discovery
                .listing_url
                .clone()
                .or_else(|| self.domains.first().map(|d| format!("https://www.{}/", d))),
        }
    }

    /// Recipe links on a listing or search page, in page order.
    pub fn parse_listing(&self, page_url: &str, html: &str, limit: usize) -> Vec<String> {
        let document = Html::parse_document(html);
        let page = page_url.trim_end_matches('/');

        for css in self.config.link_selectors() {
            let Some(selector) = parse_selector(&css) else {
                continue;
            };
            let mut seen = HashSet::new();
            let links: Vec<String> = document
                .select(&selector)
                .filter_map(|a| a.value().attr("href"))
                .filter_map(|href| absolutize(page_url, href))
                .filter(|url| url.trim_end_matches('/') != page && self.owns(url))
                .filter(|url| self.link_pattern.as_ref().map_or(true, |re| re.is_match(url)))
                .filter(|url| seen.insert(url.clone()))
                .take(limit)
                .collect();
            if !links.is_empty() {
                debug!("{}: {} links via {:?}", self.name, links.len(), css);
                return links;
            }
        }
        Vec::new()
    }

    /// Build a record from recipe page markup.
    pub fn parse_recipe(&self, url: &str, html: &str) -> Result<ScrapedRecipe, ExtractionError> {
        if !html.contains('<') {
            return Err(ExtractionError::UnsupportedLayout(format!(
                "{} did not return HTML",
                url
            )));
        }
        let document = Html::parse_document(html);
        let selectors = &self.config.selectors;

        let mut recipe = ScrapedRecipe::new(
            url,
            self.name.clone(),
            safe_text(&document, &selectors.title).unwrap_or_default(),
        );
        recipe.description = safe_text(&document, &selectors.description);
        recipe.image_url = safe_image(&document, &selectors.image)
            .and_then(|src| absolutize(url, &src))
            .or_else(|| meta_content(&document, "og:image"));
        recipe.ingredients = first_non_empty_list(&document, &selectors.ingredients);
        recipe.steps = first_non_empty_list(&document, &selectors.steps);
        recipe.prep_time = safe_text(&document, &selectors.prep_time);
        recipe.cook_time = safe_text(&document, &selectors.cook_time);
        recipe.servings = safe_text(&document, &selectors.servings);

        let structured = structured_recipe(&document);
        if let Some(data) = structured.as_ref() {
            if recipe.ingredients.is_empty() && recipe.steps.is_empty() {
                recipe.ingredients = data.ingredients.clone();
                recipe.steps = data.steps.clone();
            }
            if recipe.title.is_empty() {
                recipe.title = data.title.clone().unwrap_or_default();
            }
            recipe.description = recipe.description.or_else(|| data.description.clone());
            recipe.image_url = recipe.image_url.or_else(|| data.image_url.clone());
            recipe.prep_time = recipe.prep_time.or_else(|| data.prep_time.clone());
            recipe.cook_time = recipe.cook_time.or_else(|| data.cook_time.clone());
            recipe.servings = recipe.servings.or_else(|| data.servings.clone());
        }

        if structured.is_none()
            && recipe.title.is_empty()
            && recipe.ingredients.is_empty()
            && recipe.steps.is_empty()
        {
            return Err(ExtractionError::MarkupNotFound(url.to_string()));
        }
        finish_record(recipe)
    }
}

#[async_trait]
impl SiteAdapter for ConfigurableAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn domains(&self) -> &[String] {
        &self.domains
    }

    async fn discover(&self, query: &SearchQuery, limit: usize) -> Result<Vec<String>, ExtractionError> {
        let Some(url) = self.discovery_url(query) else {
            return Ok(Vec::new());
        };
        let page = self.fetcher.fetch(&url, self.timeout).await?;
        Ok(self.parse_listing(&page.final_url, &page.body, limit))
    }

    async fn extract(&self, url: &str) -> Result<ScrapedRecipe, ExtractionError> {
        if !self.owns(url) {
            return Err(ExtractionError::UnsupportedLayout(format!(
                "{} is not a {} url",
                url, self.name
            )));
        }
        let html = self.fetch_html(url).await?;
        self.parse_recipe(url, &html)
    }
}
