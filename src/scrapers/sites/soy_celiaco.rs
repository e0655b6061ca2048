//! Soy Celíaco No Extraterrestre: gluten-free blog with free-form posts.
//!
//! Ingredients are a `<br>`-separated paragraph under an "Ingredientes"
//! heading. Steps live under "Paso a paso" as `h4` titles, each followed by
//! one or more paragraphs.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use scraper::{ElementRef, Html};

use crate::models::ScrapedRecipe;
use crate::scrapers::config::{DiscoveryConfig, RecipeSelectors, SiteConfig};
use crate::scrapers::configurable::ConfigurableAdapter;
use crate::scrapers::extract::{
    absolutize, block_lines, element_text, find_heading, first_non_empty_list, parse_selector,
    safe_attr, safe_image, safe_text, section_after,
};
use crate::scrapers::fetch::PageFetcher;
use crate::scrapers::registry::RegistryError;
use crate::scrapers::{finish_record, ExtractionError, SearchQuery, SiteAdapter};

static SERVINGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)rinde\s+(?:para\s+)?(\d+)\s*(?:porciones?|pancitos?|unidades?)?|(\d+)\s*porciones?")
        .expect("valid servings regex")
});

static PREP_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)tiempo\s+de\s+preparaci[oó]n[:\s]+(\d+\s*(?:minutos?|min|horas?|h))")
        .expect("valid prep time regex")
});

static COOK_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)tiempo\s+de\s+cocci[oó]n[:\s]+(\d+\s*(?:minutos?|min|horas?|h))")
        .expect("valid cook time regex")
});

/// Paragraphs containing any of these are ads or social links.
const NOISE: &[&str] = &[
    "publicidad",
    "suscribite",
    "seguinos",
    "compartir",
    "facebook",
    "instagram",
    "twitter",
    "pinterest",
    "youtube",
    "te puede interesar",
];

/// Untitled paragraphs shorter than this are captions, not steps.
const MIN_STEP_LEN: usize = 20;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn site_config() -> SiteConfig {
    SiteConfig {
        name: Some(SoyCeliacoAdapter::NAME.to_string()),
        domains: strings(&["soyceliaconoextraterrestre.com"]),
        discovery: DiscoveryConfig {
            search_url: Some("https://www.soyceliaconoextraterrestre.com/?s={query}".to_string()),
            listing_url: Some("https://www.soyceliaconoextraterrestre.com/recetas/".to_string()),
            link_selectors: strings(&[".entry-title a", "h2 a"]),
            link_pattern: None,
        },
        selectors: RecipeSelectors {
            title: strings(&["h1.entry-title, h1.post-title, h1"]),
            description: strings(&[".entry-content > p:first-of-type, .recipe-description"]),
            image: strings(&[
                ".wp-block-image img",
                "figure.wp-block-image img",
                ".wp-post-image",
                ".entry-content img",
                ".post-thumbnail img",
            ]),
            ingredients: strings(&[
                ".wprm-recipe-ingredient",
                ".recipe-ingredients li",
                r#"[class*="ingredientes"] li"#,
                ".entry-content ul li",
            ]),
            steps: strings(&[
                ".wprm-recipe-instruction",
                ".recipe-instructions li",
                r#"[class*="preparacion"] li"#,
                ".entry-content ol li",
            ]),
            ..Default::default()
        },
        browser: false,
    }
}

pub struct SoyCeliacoAdapter {
    inner: ConfigurableAdapter,
}

impl SoyCeliacoAdapter {
    pub const NAME: &'static str = "Soy Celíaco No Extraterrestre";

    pub fn new(fetcher: Arc<dyn PageFetcher>, timeout: Duration) -> Result<Self, RegistryError> {
        Ok(Self {
            inner: ConfigurableAdapter::new(Self::NAME, site_config(), fetcher, timeout)?,
        })
    }

    pub fn parse_recipe(&self, url: &str, html: &str) -> Result<ScrapedRecipe, ExtractionError> {
        let document = Html::parse_document(html);
        let selectors = &self.inner.config().selectors;

        let title = safe_text(&document, &selectors.title).unwrap_or_default();
        let mut ingredients = heading_ingredients(&document);
        if ingredients.is_empty() {
            ingredients = first_non_empty_list(&document, &selectors.ingredients);
        }
        let mut steps = heading_steps(&document);
        if steps.is_empty() {
            steps = first_non_empty_list(&document, &selectors.steps);
        }
        if title.is_empty() && ingredients.is_empty() && steps.is_empty() {
            return Err(ExtractionError::MarkupNotFound(url.to_string()));
        }

        let mut recipe = ScrapedRecipe::new(url, Self::NAME, title);
        recipe.description = safe_text(&document, &selectors.description);
        recipe.image_url = safe_attr(&document, &selectors.image, "data-src")
            .filter(|src| !src.starts_with("data:"))
            .or_else(|| safe_image(&document, &selectors.image))
            .and_then(|src| absolutize(url, &src));
        recipe.ingredients = ingredients;
        recipe.steps = steps;

        if let Some(intro) = intro_paragraph(&document) {
            recipe.servings = parse_servings(&intro);
            recipe.prep_time = capture(&PREP_TIME, &intro);
            recipe.cook_time = capture(&COOK_TIME, &intro);
        }
        finish_record(recipe)
    }
}

fn heading_ingredients(document: &Html) -> Vec<String> {
    let Some(heading) = find_heading(document, &["ingredientes"]) else {
        return Vec::new();
    };
    section_after(heading)
        .into_iter()
        .find(|el| matches!(el.value().name(), "p" | "ul" | "ol"))
        .map(block_lines)
        .unwrap_or_default()
}

fn is_noise(text: &str) -> bool {
    let lower = text.to_lowercase();
    NOISE.iter().any(|n| lower.contains(n))
}

/// Steps under "Paso a paso", as "Title: content" when the post titles them.
fn heading_steps(document: &Html) -> Vec<String> {
    let Some(heading) = find_heading(document, &["paso a paso"]) else {
        return Vec::new();
    };

    let mut steps = Vec::new();
    let mut title: Option<String> = None;
    let mut body: Vec<String> = Vec::new();
    let flush = |steps: &mut Vec<String>, title: &mut Option<String>, body: &mut Vec<String>| {
        let content = body.join(" ");
        match (title.take(), content.is_empty()) {
            (Some(t), false) => steps.push(format!("{}: {}", t, content)),
            (Some(t), true) => steps.push(t),
            (None, false) => steps.push(content),
            (None, true) => {}
        }
        body.clear();
    };

    for element in section_after(heading) {
        let text = element_text(element);
        if text.is_empty() || is_noise(&text) {
            continue;
        }
        match element.value().name() {
            "h3" | "h4" | "h5" => {
                flush(&mut steps, &mut title, &mut body);
                title = Some(text.trim_end_matches(':').trim().to_string());
            }
            "p" if title.is_some() => body.push(text),
            "p" if text.chars().count() > MIN_STEP_LEN => steps.push(text),
            "ol" | "ul" => {
                flush(&mut steps, &mut title, &mut body);
                steps.extend(list_items(element));
            }
            _ => {}
        }
    }
    flush(&mut steps, &mut title, &mut body);
    steps
}

fn list_items(element: ElementRef<'_>) -> Vec<String> {
    block_lines(element).into_iter().filter(|t| !is_noise(t)).collect()
}

/// First body paragraph mentioning yield or times, else the first one.
fn intro_paragraph(document: &Html) -> Option<String> {
    let selector = parse_selector(".entry-content p")?;
    let paragraphs: Vec<String> = document.select(&selector).map(element_text).collect();
    paragraphs
        .iter()
        .find(|p| {
            let lower = p.to_lowercase();
            ["rinde", "tiempo", "porciones", "minutos"]
                .iter()
                .any(|k| lower.contains(k))
        })
        .or_else(|| paragraphs.first())
        .cloned()
}

fn parse_servings(text: &str) -> Option<String> {
    let caps = SERVINGS.captures(text)?;
    let count = caps.get(1).or_else(|| caps.get(2))?;
    Some(format!("{} porciones", count.as_str()))
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

#[async_trait]
impl SiteAdapter for SoyCeliacoAdapter {
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
