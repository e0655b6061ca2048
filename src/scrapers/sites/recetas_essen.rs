//! Recetas Essen: cookware brand recipe site.
//!
//! Layouts vary between classed lists and plain text under a heading or a
//! bold label, so list selectors are tried first and the labelled section
//! after that.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Html};

use crate::models::ScrapedRecipe;
use crate::scrapers::config::{DiscoveryConfig, RecipeSelectors, SiteConfig};
use crate::scrapers::configurable::ConfigurableAdapter;
use crate::scrapers::extract::{
    absolutize, block_lines, element_text, first_non_empty_list, meta_content, parse_selector,
    safe_image, safe_text,
};
use crate::scrapers::fetch::PageFetcher;
use crate::scrapers::registry::RegistryError;
use crate::scrapers::{finish_record, ExtractionError, SearchQuery, SiteAdapter};

const INGREDIENT_LABELS: &[&str] = &["ingredientes", "ingredients", "lista de ingredientes"];

const STEP_LABELS: &[&str] = &[
    "preparación",
    "preparacion",
    "modo de preparación",
    "instrucciones",
    "elaboración",
    "pasos",
    "procedimiento",
];

/// Labels longer than this are sentences that merely mention a keyword.
const MAX_LABEL_LEN: usize = 40;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn site_config() -> SiteConfig {
    SiteConfig {
        name: Some(RecetasEssenAdapter::NAME.to_string()),
        domains: strings(&["recetasessen.com.ar", "recetasessen.com"]),
        discovery: DiscoveryConfig {
            search_url: Some("https://www.recetasessen.com.ar/?s={query}".to_string()),
            listing_url: Some("https://www.recetasessen.com.ar/recetas/".to_string()),
            link_selectors: strings(&[".recipe-card a", ".entry-title a"]),
            link_pattern: None,
        },
        selectors: RecipeSelectors {
            title: strings(&["h1.recipe-title, h1.entry-title, h1.post-title, h1"]),
            description: strings(&[".recipe-description, .recipe-summary, .entry-content > p:first-of-type"]),
            image: strings(&[
                ".recipe-image img",
                ".wp-post-image",
                ".entry-content img",
                ".post-thumbnail img",
                ".featured-image img",
            ]),
            ingredients: strings(&[
                ".recipe-ingredients li",
                ".ingredients-list li",
                r#"[class*="ingredientes"] li"#,
                ".ingredients li",
                "ul.ingredientes li",
                ".wprm-recipe-ingredient",
                ".recipe-content .ingredients li",
                "section.ingredientes li",
            ]),
            steps: strings(&[
                ".recipe-instructions li",
                ".recipe-directions li",
                r#"[class*="preparacion"] li"#,
                r#"[class*="instrucciones"] li"#,
                ".instructions li",
                "ol.pasos li",
                ".wprm-recipe-instruction",
                ".wprm-recipe-instruction-text",
                ".recipe-content .steps li",
                "section.preparacion li",
            ]),
            prep_time: strings(&[r#".prep-time, .recipe-prep-time, [class*="tiempo-prep"], .cooking-time"#]),
            cook_time: strings(&[r#".cook-time, .recipe-cook-time, [class*="tiempo-coccion"]"#]),
            servings: strings(&[r#".servings, .recipe-servings, [class*="porciones"], [class*="rinde"]"#]),
        },
        browser: false,
    }
}

pub struct RecetasEssenAdapter {
    inner: ConfigurableAdapter,
}

impl RecetasEssenAdapter {
    pub const NAME: &'static str = "Recetas Essen";

    pub fn new(fetcher: Arc<dyn PageFetcher>, timeout: Duration) -> Result<Self, RegistryError> {
        Ok(Self {
            inner: ConfigurableAdapter::new(Self::NAME, site_config(), fetcher, timeout)?,
        })
    }

    pub fn parse_recipe(&self, url: &str, html: &str) -> Result<ScrapedRecipe, ExtractionError> {
        let document = Html::parse_document(html);
        let selectors = &self.inner.config().selectors;

        let title = safe_text(&document, &selectors.title).unwrap_or_default();
        let mut ingredients = first_non_empty_list(&document, &selectors.ingredients);
        if ingredients.is_empty() {
            ingredients = labelled_section(&document, INGREDIENT_LABELS);
        }
        let mut steps = first_non_empty_list(&document, &selectors.steps);
        if steps.is_empty() {
            steps = labelled_section(&document, STEP_LABELS);
        }
        if title.is_empty() && ingredients.is_empty() && steps.is_empty() {
            return Err(ExtractionError::MarkupNotFound(url.to_string()));
        }

        let mut recipe = ScrapedRecipe::new(url, Self::NAME, title);
        recipe.description = safe_text(&document, &selectors.description);
        recipe.image_url = safe_image(&document, &selectors.image)
            .and_then(|src| absolutize(url, &src))
            .or_else(|| meta_content(&document, "og:image"));
        recipe.ingredients = ingredients;
        recipe.steps = steps;
        recipe.prep_time = safe_text(&document, &selectors.prep_time);
        recipe.cook_time = safe_text(&document, &selectors.cook_time);
        recipe.servings = safe_text(&document, &selectors.servings);
        finish_record(recipe)
    }
}

/// Lines of the block following a heading or bold label that starts with
/// one of `labels`.
fn labelled_section(document: &Html, labels: &[&str]) -> Vec<String> {
    let Some(selector) = parse_selector("h2, h3, h4, h5, strong") else {
        return Vec::new();
    };
    document
        .select(&selector)
        .filter(|marker| {
            let text = element_text(*marker).to_lowercase();
            let text = text.trim_end_matches(':').trim();
            text.chars().count() <= MAX_LABEL_LEN && labels.iter().any(|l| text.starts_with(l))
        })
        .filter_map(content_after)
        .map(block_lines)
        .find(|lines| !lines.is_empty())
        .unwrap_or_default()
}

fn next_with_text<'a>(element: ElementRef<'a>) -> Option<ElementRef<'a>> {
    element
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| !element_text(*el).is_empty())
}

/// The block a label introduces: its next sibling with text, or the next
/// sibling of its parent when the label is wrapped (`<p><strong>`).
fn content_after(marker: ElementRef<'_>) -> Option<ElementRef<'_>> {
    next_with_text(marker).or_else(|| marker.parent().and_then(ElementRef::wrap).and_then(next_with_text))
}

#[async_trait]
impl SiteAdapter for RecetasEssenAdapter {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn domains(&self) -> &[String] {
        self.inner.domains()
    }

    async fn discover(&self, query: &SearchQuery, limit: usize) -> Result<Vec<String>, ExtractionError> {
        self.inner.discover(query, limit).await
    }

    async fn extract(&self, url: &str) -> Result<ScrapedRecipe, ExtractionError> {
        if !self.owns(url) {
            return Err(ExtractionError::UnsupportedLayout(format!(
                "{} is not a {} url",
                url,
                Self::NAME
            )));
        }
        let html = self.inner.fetch_html(url).await?;
        self.parse_recipe(url, &html)
    }
}
