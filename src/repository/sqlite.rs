//! SQLite recipe store.
//!
//! rusqlite is synchronous, so every operation opens its own connection on
//! the blocking pool.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, Row};

use super::{connect, parse_datetime, to_option, RecipeStore, Result, StoreError};
use crate::models::{DietaryFilters, NewRecipe, ScrapedRecipe, StoredRecipe};

const SELECT_RECIPE: &str = r#"
    SELECT id, source_url, site, title, description, image_url, ingredients, steps,
           prep_time, cook_time, servings, gluten_free, vegetarian, vegan, created_at
    FROM recipes
"#;

#[derive(Clone)]
pub struct SqliteRecipeStore {
    db_path: PathBuf,
}

impl SqliteRecipeStore {
    /// Open the store, creating the parent directory and schema as needed.
    pub fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Task(format!("cannot create {}: {}", parent.display(), e)))?;
        }
        let store = Self {
            db_path: db_path.to_path_buf(),
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn init_schema(&self) -> Result<()> {
        let conn = connect(&self.db_path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS recipes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_url TEXT NOT NULL UNIQUE,
                site TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                image_url TEXT,
                ingredients TEXT NOT NULL,
                steps TEXT NOT NULL,
                prep_time TEXT,
                cook_time TEXT,
                servings TEXT,
                gluten_free INTEGER NOT NULL DEFAULT 0,
                vegetarian INTEGER NOT NULL DEFAULT 0,
                vegan INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_recipes_site ON recipes(site);
        "#,
        )?;
        Ok(())
    }

    /// Run a closure against a fresh connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let conn = connect(&path)?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn row_to_recipe(row: &Row<'_>) -> rusqlite::Result<(StoredRecipe, String, String)> {
    let source_url: String = row.get("source_url")?;
    let mut recipe = ScrapedRecipe::new(
        source_url.clone(),
        row.get::<_, String>("site")?,
        row.get::<_, String>("title")?,
    );
    recipe.description = row.get("description")?;
    recipe.image_url = row.get("image_url")?;
    recipe.prep_time = row.get("prep_time")?;
    recipe.cook_time = row.get("cook_time")?;
    recipe.servings = row.get("servings")?;
    let stored = StoredRecipe {
        id: row.get("id")?,
        canonical_url: source_url,
        recipe,
        dietary: DietaryFilters {
            gluten_free: row.get("gluten_free")?,
            vegetarian: row.get("vegetarian")?,
            vegan: row.get("vegan")?,
        },
        created_at: parse_datetime(&row.get::<_, String>("created_at")?),
    };
    // lists are JSON text, decoded by the caller so errors keep their type
    Ok((stored, row.get("ingredients")?, row.get("steps")?))
}

#[async_trait]
impl RecipeStore for SqliteRecipeStore {
    async fn exists(&self, canonical_url: &str) -> Result<bool> {
        let url = canonical_url.to_string();
        self.with_conn(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM recipes WHERE source_url = ?",
                params![url],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .await
    }

    async fn save(&self, new: NewRecipe) -> Result<i64> {
        self.with_conn(move |conn| {
            let recipe = &new.recipe;
            let rows = conn.execute(
                r#"
                INSERT INTO recipes (source_url, site, title, description, image_url, ingredients,
                                     steps, prep_time, cook_time, servings, gluten_free,
                                     vegetarian, vegan, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                ON CONFLICT(source_url) DO NOTHING
                "#,
                params![
                    new.canonical_url,
                    recipe.site,
                    recipe.title.trim(),
                    recipe.description,
                    recipe.image_url,
                    serde_json::to_string(&recipe.ingredients)?,
                    serde_json::to_string(&recipe.steps)?,
                    recipe.prep_time,
                    recipe.cook_time,
                    recipe.servings,
                    new.dietary.gluten_free,
                    new.dietary.vegetarian,
                    new.dietary.vegan,
                    Utc::now().to_rfc3339(),
                ],
            )?;
            if rows == 0 {
                return Err(StoreError::Duplicate(new.canonical_url));
            }
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn get_by_url(&self, canonical_url: &str) -> Result<Option<StoredRecipe>> {
        let url = canonical_url.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!("{} WHERE source_url = ?", SELECT_RECIPE))?;
            let Some((mut stored, ingredients, steps)) =
                to_option(stmt.query_row(params![url], row_to_recipe))?
            else {
                return Ok(None);
            };
            stored.recipe.ingredients = serde_json::from_str(&ingredients)?;
            stored.recipe.steps = serde_json::from_str(&steps)?;
            Ok(Some(stored))
        })
        .await
    }

    async fn count(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM recipes", [], |row| row.get(0))?;
            Ok(count as u64)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn new_recipe(url: &str) -> NewRecipe {
        let mut recipe = ScrapedRecipe::new(url, "Paulina Cocina", " Budín de banana ");
        recipe.ingredients = vec!["2 bananas".into(), "2 huevos".into()];
        recipe.steps = vec!["Pisar las bananas".into()];
        recipe.servings = Some("8 porciones".into());
        NewRecipe {
            canonical_url: url.to_string(),
            recipe,
            dietary: DietaryFilters {
                gluten_free: true,
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_save_and_read_back() {
        let dir = tempdir().unwrap();
        let store = SqliteRecipeStore::new(&dir.path().join("nested/recetario.db")).unwrap();
        let url = "https://paulinacocina.net/budin-de-banana";

        assert!(!store.exists(url).await.unwrap());
        let id = store.save(new_recipe(url)).await.unwrap();
        assert!(id > 0);
        assert!(store.exists(url).await.unwrap());
        assert_eq!(store.count().await.unwrap(), 1);

        let stored = store.get_by_url(url).await.unwrap().unwrap();
        assert_eq!(stored.id, id);
        assert_eq!(stored.recipe.title, "Budín de banana");
        assert_eq!(stored.recipe.ingredients, vec!["2 bananas", "2 huevos"]);
        assert_eq!(stored.recipe.servings.as_deref(), Some("8 porciones"));
        assert_eq!(stored.recipe.cook_time, None);
        assert!(stored.dietary.gluten_free);
        assert!(!stored.dietary.vegan);

        assert!(store.get_by_url("https://paulinacocina.net/otra").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unique_url() {
        let dir = tempdir().unwrap();
        let store = SqliteRecipeStore::new(&dir.path().join("recetario.db")).unwrap();
        let url = "https://paulinacocina.net/budin-de-banana";
        store.save(new_recipe(url)).await.unwrap();
        assert!(matches!(store.save(new_recipe(url)).await, Err(StoreError::Duplicate(_))));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_schema_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("recetario.db");
        SqliteRecipeStore::new(&path)
            .unwrap()
            .save(new_recipe("https://paulinacocina.net/a"))
            .await
            .unwrap();
        let reopened = SqliteRecipeStore::new(&path).unwrap();
        assert!(reopened.exists("https://paulinacocina.net/a").await.unwrap());
    }
}
