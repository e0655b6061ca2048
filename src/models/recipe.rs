//! Recipe records produced by site adapters.

use serde::{Deserialize, Serialize};

/// A recipe as extracted from a site, before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedRecipe {
    /// URL the recipe was extracted from.
    pub source_url: String,
    /// Display name of the site adapter that produced it.
    pub site: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Ingredient lines in page order.
    #[serde(default)]
    pub ingredients: Vec<String>,
    /// Preparation steps in page order.
    #[serde(default)]
    pub steps: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prep_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cook_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servings: Option<String>,
}

impl ScrapedRecipe {
    /// Create a record with only the required fields set.
    pub fn new(source_url: impl Into<String>, site: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            site: site.into(),
            title: title.into(),
            description: None,
            image_url: None,
            ingredients: Vec::new(),
            steps: Vec::new(),
            prep_time: None,
            cook_time: None,
            servings: None,
        }
    }

    /// Check the minimum content a record needs to be worth keeping.
    ///
    /// Returns the reason when the record is degenerate.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("missing title".to_string());
        }
        if self.ingredients.is_empty() && self.steps.is_empty() {
            return Err(format!("'{}' has no ingredients or steps", self.title.trim()));
        }
        Ok(())
    }

    /// True if [`validate`](Self::validate) passes.
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Concatenated free text used for language detection.
    pub fn text_sample(&self) -> String {
        let mut text = String::with_capacity(512);
        text.push_str(&self.title);
        if let Some(ref d) = self.description {
            text.push(' ');
            text.push_str(d);
        }
        for line in self.ingredients.iter().chain(self.steps.iter()) {
            text.push(' ');
            text.push_str(line);
        }
        text
    }
}

/// Dietary requirements a search must satisfy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DietaryFilters {
    #[serde(default)]
    pub gluten_free: bool,
    #[serde(default)]
    pub vegetarian: bool,
    #[serde(default)]
    pub vegan: bool,
}

impl DietaryFilters {
    /// Terms appended to a site search so results match the filters.
    pub fn search_terms(&self) -> Vec<&'static str> {
        let mut terms = Vec::new();
        if self.gluten_free {
            terms.push("sin tacc");
        }
        if self.vegan {
            terms.push("vegana");
        } else if self.vegetarian {
            terms.push("vegetariana");
        }
        terms
    }

    pub fn is_empty(&self) -> bool {
        !self.gluten_free && !self.vegetarian && !self.vegan
    }
}

/// A scraped recipe ready to be written to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecipe {
    /// Normalized source URL, the store's identity key.
    pub canonical_url: String,
    pub recipe: ScrapedRecipe,
    /// Flags inherited from the search that found the recipe.
    pub dietary: DietaryFilters,
}

/// A recipe read back from the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecipe {
    pub id: i64,
    pub canonical_url: String,
    #[serde(flatten)]
    pub recipe: ScrapedRecipe,
    pub dietary: DietaryFilters,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_requires_title() {
        let mut recipe = ScrapedRecipe::new("https://cookpad.com/r/1", "Cookpad", "   ");
        recipe.ingredients.push("1 huevo".to_string());
        assert_eq!(recipe.validate(), Err("missing title".to_string()));
    }

    #[test]
    fn test_validate_requires_ingredient_or_step() {
        let mut recipe = ScrapedRecipe::new("https://cookpad.com/r/1", "Cookpad", "Tortilla");
        assert!(!recipe.is_valid());

        recipe.steps.push("Batir los huevos".to_string());
        assert!(recipe.is_valid());
    }

    #[test]
    fn test_search_terms() {
        let filters = DietaryFilters {
            gluten_free: true,
            vegetarian: true,
            vegan: true,
        };
        // vegan implies vegetarian, only the stricter term is sent
        assert_eq!(filters.search_terms(), vec!["sin tacc", "vegana"]);
        assert!(DietaryFilters::default().search_terms().is_empty());
        assert!(DietaryFilters::default().is_empty());
    }
}
