//! Built-in recipe sites.
//!
//! Most sites are plain [`SiteConfig`] values. Sites whose recipe body is
//! laid out under headings instead of classed lists get their own adapter.

mod recetas_essen;
mod soy_celiaco;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

pub use recetas_essen::RecetasEssenAdapter;
pub use soy_celiaco::SoyCeliacoAdapter;

use super::config::{DiscoveryConfig, RecipeSelectors, SiteConfig};
use super::configurable::ConfigurableAdapter;
use super::fetch::PageFetcher;
use super::registry::{RegistryError, SiteRegistry};
use super::SiteAdapter;

fn list(selectors: &[&str]) -> Vec<String> {
    selectors.iter().map(|s| s.to_string()).collect()
}

fn discovery(search_url: &str, listing_url: &str, links: &[&str], pattern: Option<&str>) -> DiscoveryConfig {
    DiscoveryConfig {
        search_url: Some(search_url.to_string()),
        listing_url: Some(listing_url.to_string()),
        link_selectors: list(links),
        link_pattern: pattern.map(str::to_string),
    }
}

fn site(name: &str, domains: &[&str], discovery: DiscoveryConfig, selectors: RecipeSelectors) -> SiteConfig {
    SiteConfig {
        name: Some(name.to_string()),
        domains: list(domains),
        discovery,
        selectors,
        browser: false,
    }
}

/// Selector configurations of the built-in configuration-driven sites.
pub fn builtin_configs() -> Vec<SiteConfig> {
    vec![
        site(
            "Cookpad",
            &["cookpad.com"],
            discovery(
                "https://cookpad.com/ar/buscar/{query}",
                "https://cookpad.com/ar/recetas",
                &[r#"a[href*="/recetas/"]"#],
                Some(r"/recetas/\d+"),
            ),
            RecipeSelectors {
                title: list(&[r#"h1[class*="recipe-title"], h1.break-words, h1"#]),
                description: list(&[r#"[class*="recipe-story"], .mb-sm"#]),
                image: list(&[r#"picture img, img[class*="recipe-image"], .recipe-main-photo img"#]),
                ingredients: list(&[
                    "#ingredients .ingredient",
                    r#"[class*="ingredient-list"] li"#,
                    ".ingredient-list li",
                    "#ingredients li",
                ]),
                steps: list(&["#steps .step", r#"[class*="step-text"]"#, ".step-text", "#steps li"]),
                cook_time: list(&[r#"[class*="cooking-time"], .cooking-time"#]),
                servings: list(&[r#"[class*="serving"], .servings"#]),
                ..Default::default()
            },
        ),
        site(
            "Directo al Paladar",
            &["directoalpaladar.com"],
            discovery(
                "https://www.directoalpaladar.com/buscar?q={query}",
                "https://www.directoalpaladar.com/recetario",
                &[".abstract-title a", "article h2 a"],
                None,
            ),
            RecipeSelectors {
                title: list(&["h1.title, h1.article-title, h1"]),
                description: list(&[".article-content p:first-of-type, .recipe-intro"]),
                image: list(&[".article-image img, .featured-image img, article img"]),
                ingredients: list(&[
                    ".recipe-ingredients li",
                    r#"[class*="ingredientes"] li"#,
                    ".ingredients-list li",
                    "ul.ingredients li",
                ]),
                steps: list(&[
                    ".recipe-directions li",
                    r#"[class*="elaboracion"] li"#,
                    ".recipe-steps li",
                    "ol.directions li",
                ]),
                prep_time: list(&[r#".recipe-prep-time, [class*="prep-time"]"#]),
                cook_time: list(&[r#".recipe-cook-time, [class*="cook-time"]"#]),
                servings: list(&[r#".recipe-servings, [class*="servings"], [class*="comensales"]"#]),
            },
        ),
        site(
            "Recetas de Rechupete",
            &["recetasderechupete.com"],
            discovery(
                "https://www.recetasderechupete.com/?s={query}",
                "https://www.recetasderechupete.com/",
                &[".entry-title a", ".post-title a"],
                None,
            ),
            RecipeSelectors {
                title: list(&["h1.entry-title, h1.post-title, h1"]),
                description: list(&[".entry-content > p:first-of-type, .recipe-summary"]),
                image: list(&[".entry-content img, .post-thumbnail img, article img"]),
                ingredients: list(&[
                    ".wprm-recipe-ingredient",
                    ".recipe-ingredients li",
                    r#"[class*="ingredientes"] li"#,
                    ".ingredients li",
                ]),
                steps: list(&[
                    ".wprm-recipe-instruction",
                    ".recipe-instructions li",
                    r#"[class*="elaboracion"] li"#,
                    ".instructions li",
                ]),
                prep_time: list(&[r#".recipe-prep-time, [class*="tiempo-prep"]"#]),
                cook_time: list(&[r#".recipe-cook-time, [class*="tiempo-coccion"]"#]),
                servings: list(&[r#".recipe-servings, [class*="raciones"]"#]),
            },
        ),
        site(
            "AllRecipes",
            &["allrecipes.com"],
            discovery(
                "https://www.allrecipes.com/search?q={query}",
                "https://www.allrecipes.com/recipes/",
                &["a.mntl-card-list-items", r#"a[href*="/recipe/"]"#],
                Some("/recipe/"),
            ),
            RecipeSelectors {
                title: list(&["h1.article-heading, h1.headline, h1"]),
                description: list(&[".article-subheading, .recipe-summary p, .article-body p:first-of-type"]),
                image: list(&[".primary-image img, .recipe-image img, article img"]),
                ingredients: list(&[
                    ".mntl-structured-ingredients__list-item",
                    ".ingredients-item-name",
                    ".recipe-ingredients li",
                    r#"[class*="ingredient"] li"#,
                ]),
                steps: list(&[
                    ".mntl-sc-block-group--LI p",
                    ".instructions-section-item .paragraph",
                    ".recipe-directions__list li",
                    r#"[class*="directions"] li"#,
                ]),
                prep_time: list(&[
                    r#".recipe-prep-time .meta-value, [class*="prep-time"] .mntl-recipe-details__value"#,
                ]),
                cook_time: list(&[
                    r#".recipe-cook-time .meta-value, [class*="cook-time"] .mntl-recipe-details__value"#,
                ]),
                servings: list(&[
                    r#".recipe-servings .meta-value, [class*="servings"] .mntl-recipe-details__value"#,
                ]),
            },
        ),
        SiteConfig {
            browser: true,
            ..site(
                "Tasty",
                &["tasty.co"],
                discovery(
                    "https://tasty.co/search?q={query}",
                    "https://tasty.co/latest",
                    &[r#"a[href*="/recipe/"]"#],
                    Some("/recipe/"),
                ),
                RecipeSelectors {
                    title: list(&[r#"h1[class*="recipe-name"], h1.recipe-title, h1"#]),
                    description: list(&[r#"[class*="recipe-description"], .recipe-description"#]),
                    image: list(&[r#".recipe-photo img, picture img, [class*="recipe-image"] img"#]),
                    ingredients: list(&[
                        r#"[class*="ingredient-list"] li"#,
                        ".ingredient-list li",
                        r#"[class*="ingredients"] li"#,
                        ".ingredients li",
                    ]),
                    steps: list(&[
                        r#"[class*="preparation-list"] li"#,
                        ".preparation-list li",
                        r#"[class*="instructions"] li"#,
                        ".instructions li",
                    ]),
                    cook_time: list(&[r#"[class*="cook-time"], .total-time"#]),
                    servings: list(&[r#"[class*="servings"], .servings-display"#]),
                    ..Default::default()
                },
            )
        },
        site(
            "Paulina Cocina",
            &["paulinacocina.net"],
            discovery(
                "https://www.paulinacocina.net/?s={query}",
                "https://www.paulinacocina.net/recetas",
                &[".entry-title a", "h2 a"],
                None,
            ),
            RecipeSelectors {
                title: list(&["h1.entry-title, h1.post-title, h1"]),
                description: list(&[".entry-content > p:first-of-type, .recipe-summary"]),
                image: list(&[".wp-post-image, .entry-content img, article img"]),
                ingredients: list(&[
                    ".wprm-recipe-ingredient",
                    ".recipe-ingredients li",
                    r#"[class*="ingredientes"] li"#,
                    ".ingredients li",
                ]),
                steps: list(&[
                    ".wprm-recipe-instruction-text",
                    ".recipe-instructions li",
                    r#"[class*="preparacion"] li"#,
                    ".instructions li",
                ]),
                prep_time: list(&[r#".wprm-recipe-prep-time-container, [class*="prep-time"]"#]),
                cook_time: list(&[r#".wprm-recipe-cook-time-container, [class*="cook-time"]"#]),
                servings: list(&[r#".wprm-recipe-servings-container, [class*="servings"]"#]),
            },
        ),
        SiteConfig {
            browser: true,
            ..site(
                "HelloFresh",
                &["hellofresh.com", "hellofresh.es", "hellofresh.com.ar"],
                discovery(
                    "https://www.hellofresh.com.ar/recipes/search?q={query}",
                    "https://www.hellofresh.com.ar/recipes",
                    &[r#"a[href*="/recipes/"]"#],
                    Some(r"/recipes/[^/?#]+-[0-9a-f]{6,}"),
                ),
                RecipeSelectors {
                    title: list(&[r#"[data-test-id="recipeDetailFragment.recipe-name"], h1"#]),
                    description: list(&[r#"[data-test-id="recipeDetailFragment.recipe-description"]"#]),
                    image: list(&[r#"[data-test-id="recipeDetailFragment.recipe-image"] img"#]),
                    ingredients: list(&[
                        r#"[data-test-id="recipeDetailFragment.ingredient-item"]"#,
                        ".recipe-ingredients li",
                        r#"[class*="ingredient"] li"#,
                        ".ingredients-list li",
                    ]),
                    steps: list(&[
                        r#"[data-test-id="recipeDetailFragment.instructions.step"]"#,
                        ".recipe-steps li",
                        r#"[class*="instruction"] li"#,
                        ".instructions li",
                    ]),
                    prep_time: list(&[r#"[data-test-id="recipeDetailFragment.preparation-time"]"#]),
                    cook_time: list(&[r#"[data-test-id="recipeDetailFragment.cooking-time"]"#]),
                    servings: list(&[r#"[data-test-id="recipeDetailFragment.servings"]"#]),
                },
            )
        },
        site(
            "Cocineros Argentinos",
            &["cocinerosargentinos.com"],
            discovery(
                "https://cocinerosargentinos.com/?s={query}",
                "https://cocinerosargentinos.com/recetas",
                &[".recipe-card a", ".entry-title a"],
                None,
            ),
            RecipeSelectors {
                title: list(&["h1.recipe-title, h1.entry-title, h1"]),
                description: list(&[".recipe-description, .entry-content > p:first-of-type"]),
                image: list(&[".recipe-image img, .featured-image img, article img"]),
                ingredients: list(&[
                    ".recipe-ingredients li",
                    r#"[class*="ingredientes"] li"#,
                    ".ingredients-list li",
                    "ul.ingredients li",
                ]),
                steps: list(&[
                    ".recipe-directions li",
                    r#"[class*="preparacion"] li"#,
                    ".recipe-steps li",
                    "ol.directions li",
                ]),
                prep_time: list(&[r#".prep-time, [class*="tiempo-prep"]"#]),
                cook_time: list(&[r#".cook-time, [class*="tiempo-coccion"]"#]),
                servings: list(&[r#".servings, [class*="porciones"]"#]),
            },
        ),
    ]
}

/// Fetchers adapters are built with.
#[derive(Clone)]
pub struct SiteFetchers {
    pub http: Arc<dyn PageFetcher>,
    /// Used by sites marked `browser = true`, when available.
    pub browser: Option<Arc<dyn PageFetcher>>,
    pub timeout: Duration,
}

impl SiteFetchers {
    pub fn new(http: Arc<dyn PageFetcher>, timeout: Duration) -> Self {
        Self {
            http,
            browser: None,
            timeout,
        }
    }

    pub fn with_browser(mut self, browser: Arc<dyn PageFetcher>) -> Self {
        self.browser = Some(browser);
        self
    }

    fn for_site(&self, config: &SiteConfig) -> Arc<dyn PageFetcher> {
        match (&self.browser, config.browser) {
            (Some(browser), true) => browser.clone(),
            _ => self.http.clone(),
        }
    }
}

/// Registry with every built-in site plus the ones from configuration.
///
/// A configured site with the name of a built-in one replaces it.
pub fn builtin_registry(
    fetchers: &SiteFetchers,
    extra: &BTreeMap<String, SiteConfig>,
) -> Result<SiteRegistry, RegistryError> {
    let overridden = |name: &str| {
        extra
            .iter()
            .any(|(key, config)| config.name_or(key).eq_ignore_ascii_case(name))
    };

    let mut adapters: Vec<Arc<dyn SiteAdapter>> = Vec::new();
    for config in builtin_configs() {
        let name = config.name_or("");
        if overridden(&name) {
            debug!("Built-in site {} replaced by configuration", name);
            continue;
        }
        let fetcher = fetchers.for_site(&config);
        adapters.push(Arc::new(ConfigurableAdapter::new(name, config, fetcher, fetchers.timeout)?));
    }
    if !overridden(SoyCeliacoAdapter::NAME) {
        adapters.push(Arc::new(SoyCeliacoAdapter::new(fetchers.http.clone(), fetchers.timeout)?));
    }
    if !overridden(RecetasEssenAdapter::NAME) {
        adapters.push(Arc::new(RecetasEssenAdapter::new(fetchers.http.clone(), fetchers.timeout)?));
    }
    for (key, config) in extra {
        let fetcher = fetchers.for_site(config);
        adapters.push(Arc::new(ConfigurableAdapter::new(
            key.clone(),
            config.clone(),
            fetcher,
            fetchers.timeout,
        )?));
    }

    let mut registry = SiteRegistry::new();
    for adapter in adapters {
        registry.register(adapter)?;
    }
    Ok(registry)
}
