//! In-process recipe store for tests and throwaway runs.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{RecipeStore, Result, StoreError};
use crate::models::{NewRecipe, StoredRecipe};

#[derive(Default)]
pub struct MemoryRecipeStore {
    recipes: RwLock<HashMap<String, StoredRecipe>>,
}

impl MemoryRecipeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored canonical urls, sorted.
    pub async fn urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self.recipes.read().await.keys().cloned().collect();
        urls.sort();
        urls
    }
}

#[async_trait]
impl RecipeStore for MemoryRecipeStore {
    async fn exists(&self, canonical_url: &str) -> Result<bool> {
        Ok(self.recipes.read().await.contains_key(canonical_url))
    }

    async fn save(&self, recipe: NewRecipe) -> Result<i64> {
        let mut recipes = self.recipes.write().await;
        if recipes.contains_key(&recipe.canonical_url) {
            return Err(StoreError::Duplicate(recipe.canonical_url));
        }
        let id = recipes.len() as i64 + 1;
        recipes.insert(
            recipe.canonical_url.clone(),
            StoredRecipe {
                id,
                canonical_url: recipe.canonical_url,
                recipe: recipe.recipe,
                dietary: recipe.dietary,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn get_by_url(&self, canonical_url: &str) -> Result<Option<StoredRecipe>> {
        Ok(self.recipes.read().await.get(canonical_url).cloned())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.recipes.read().await.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DietaryFilters, ScrapedRecipe};

    fn new_recipe(url: &str) -> NewRecipe {
        NewRecipe {
            canonical_url: url.to_string(),
            recipe: ScrapedRecipe::new(url, "Cookpad", "Flan"),
            dietary: DietaryFilters::default(),
        }
    }

    #[tokio::test]
    async fn test_save_and_lookup() {
        let store = MemoryRecipeStore::new();
        assert!(!store.exists("https://cookpad.com/r/1").await.unwrap());

        let id = store.save(new_recipe("https://cookpad.com/r/1")).await.unwrap();
        assert_eq!(id, 1);
        assert!(store.exists("https://cookpad.com/r/1").await.unwrap());
        assert_eq!(store.count().await.unwrap(), 1);

        let stored = store.get_by_url("https://cookpad.com/r/1").await.unwrap().unwrap();
        assert_eq!(stored.recipe.title, "Flan");
    }

    #[tokio::test]
    async fn test_duplicate_save_is_rejected() {
        let store = MemoryRecipeStore::new();
        store.save(new_recipe("https://cookpad.com/r/1")).await.unwrap();
        assert!(matches!(
            store.save(new_recipe("https://cookpad.com/r/1")).await,
            Err(StoreError::Duplicate(_))
        ));
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
