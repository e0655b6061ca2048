//! Recipe persistence.
//!
//! The orchestrator only needs `exists` and `save` keyed by canonical url;
//! everything else about storage stays behind [`RecipeStore`].

mod memory;
mod sqlite;

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use thiserror::Error;

pub use memory::MemoryRecipeStore;
pub use sqlite::SqliteRecipeStore;

use crate::models::{NewRecipe, StoredRecipe};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("recipe already stored: {0}")]
    Duplicate(String),
    #[error("store task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// External recipe store, keyed by canonical source url.
#[async_trait]
pub trait RecipeStore: Send + Sync {
    async fn exists(&self, canonical_url: &str) -> Result<bool>;

    /// Persist a new recipe and return its id. Fails with
    /// [`StoreError::Duplicate`] if the url is already stored.
    async fn save(&self, recipe: NewRecipe) -> Result<i64>;

    async fn get_by_url(&self, canonical_url: &str) -> Result<Option<StoredRecipe>>;

    async fn count(&self) -> Result<u64>;
}

/// Open a connection that waits on a locked database instead of failing.
fn connect(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    Ok(conn)
}

/// Map `QueryReturnedNoRows` to `None`.
fn to_option<T>(result: rusqlite::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Parse a stored timestamp, defaulting to the Unix epoch when malformed.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}
