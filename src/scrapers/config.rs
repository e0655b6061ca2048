//! Site configuration types.
//!
//! A [`SiteConfig`] fully describes a selector-driven site: which domains it
//! owns, how to find recipe links, and where each recipe field lives in the
//! markup. Built-in sites ship as `SiteConfig` values and more can be added
//! from the config file without code changes.

use serde::{Deserialize, Serialize};

/// Link selectors tried after a site's own ones.
pub const GENERIC_LINK_SELECTORS: &[&str] = &["article a", ".entry-title a", r#"a[href*="receta"]"#];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Display name. Defaults to the key under `[sites]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Domains owned by this site, without scheme or `www.`.
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default, skip_serializing_if = "DiscoveryConfig::is_default")]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub selectors: RecipeSelectors,
    /// Fetch pages through the headless browser when it is enabled.
    #[serde(default)]
    pub browser: bool,
}

impl SiteConfig {
    pub fn name_or(&self, default: &str) -> String {
        self.name.clone().unwrap_or_else(|| default.to_string())
    }

    /// Link selectors with the generic fallbacks appended.
    pub fn link_selectors(&self) -> Vec<String> {
        let mut selectors = self.discovery.link_selectors.clone();
        for generic in GENERIC_LINK_SELECTORS {
            if !selectors.iter().any(|s| s == generic) {
                selectors.push(generic.to_string());
            }
        }
        selectors
    }
}

/// How candidate recipe urls are found.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Search url with a `{query}` placeholder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_url: Option<String>,
    /// Page listing recent recipes, used when there is nothing to search for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listing_url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub link_selectors: Vec<String>,
    /// Regex a link must match to count as a recipe.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_pattern: Option<String>,
}

impl DiscoveryConfig {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Selector lists per recipe field, tried in order until one matches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecipeSelectors {
    #[serde(default)]
    pub title: Vec<String>,
    #[serde(default)]
    pub description: Vec<String>,
    #[serde(default)]
    pub image: Vec<String>,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default)]
    pub prep_time: Vec<String>,
    #[serde(default)]
    pub cook_time: Vec<String>,
    #[serde(default)]
    pub servings: Vec<String>,
}
