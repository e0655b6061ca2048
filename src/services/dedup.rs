//! Decides whether a scraped recipe is new, and persists it if so.

use std::sync::Arc;

use tokio::sync::Mutex;
use url::Url;

use crate::models::{DietaryFilters, NewRecipe, ScrapedRecipe};
use crate::repository::{RecipeStore, StoreError};

/// Query parameters that never change which recipe a url points to.
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "ref", "mc_cid", "mc_eid"];

/// Normalize a source url into the store's identity key.
///
/// Lowercases the host, drops `www.`, the fragment, tracking parameters and
/// a trailing slash. Unparseable input is only trimmed.
pub fn canonical_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw.trim()) else {
        return raw.trim().to_string();
    };
    url.set_fragment(None);

    if let Some(host) = url.host_str().map(|h| h.to_ascii_lowercase()) {
        if let Some(bare) = host.strip_prefix("www.") {
            // only fails for hosts url itself rejects
            let _ = url.set_host(Some(bare));
        }
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !k.starts_with("utm_") && !TRACKING_PARAMS.contains(&k.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(kept);
    }

    let mut canonical = url.to_string();
    if url.query().is_none() && url.path() != "/" && canonical.ends_with('/') {
        canonical.pop();
    }
    canonical
}

/// Result of passing a record through the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    New(i64),
    Duplicate,
}

/// Serialized check-then-save against the recipe store.
///
/// One lock covers the lookup and the write, so concurrent site tasks can
/// never both save the same url. The store is the only record of what was
/// saved, so a url removed from it is admitted as new again.
pub struct DedupGate {
    store: Arc<dyn RecipeStore>,
    lock: Mutex<()>,
}

impl DedupGate {
    pub fn new(store: Arc<dyn RecipeStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<dyn RecipeStore> {
        &self.store
    }

    pub async fn admit(
        &self,
        recipe: ScrapedRecipe,
        dietary: DietaryFilters,
    ) -> Result<GateDecision, StoreError> {
        let canonical = canonical_url(&recipe.source_url);
        let _guard = self.lock.lock().await;

        if self.store.exists(&canonical).await? {
            return Ok(GateDecision::Duplicate);
        }

        let new = NewRecipe {
            canonical_url: canonical,
            recipe,
            dietary,
        };
        match self.store.save(new).await {
            Ok(id) => Ok(GateDecision::New(id)),
            // written by another process between exists and save
            Err(StoreError::Duplicate(_)) => Ok(GateDecision::Duplicate),
            Err(e) => Err(e),
        }
    }
}
