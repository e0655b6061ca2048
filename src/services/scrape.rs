//! Scrape a single recipe url outside of a search job.

use serde::Serialize;

use crate::models::{DietaryFilters, ScrapedRecipe};
use crate::scrapers::{scrape_url, DiscardReason, Language, RegistryError, RetryPolicy, ScrapeOutcome, SiteRegistry};
use crate::services::dedup::{DedupGate, GateDecision};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScrapeReport {
    New { id: i64, recipe: ScrapedRecipe },
    Duplicate { recipe: ScrapedRecipe },
    DiscardedEmpty,
    DiscardedLanguage,
    Failed { error: String },
}

impl ScrapeReport {
    pub fn label(&self) -> &'static str {
        match self {
            Self::New { .. } => "new",
            Self::Duplicate { .. } => "duplicate",
            Self::DiscardedEmpty => "discarded (empty)",
            Self::DiscardedLanguage => "discarded (language)",
            Self::Failed { .. } => "failed",
        }
    }
}

/// Resolve the adapter for `url`, scrape it and pass the record through the
/// dedup gate. Unknown domains are rejected before any fetch.
pub async fn scrape_single(
    registry: &SiteRegistry,
    gate: &DedupGate,
    url: &str,
    policy: &RetryPolicy,
    language: Option<Language>,
    dietary: DietaryFilters,
) -> Result<ScrapeReport, RegistryError> {
    let adapter = registry.resolve(url)?;
    let report = match scrape_url(adapter.as_ref(), url, policy, language).await {
        ScrapeOutcome::Success(recipe) => match gate.admit(recipe.clone(), dietary).await {
            Ok(GateDecision::New(id)) => ScrapeReport::New { id, recipe },
            Ok(GateDecision::Duplicate) => ScrapeReport::Duplicate { recipe },
            Err(e) => ScrapeReport::Failed { error: e.to_string() },
        },
        ScrapeOutcome::Discarded(DiscardReason::Empty) => ScrapeReport::DiscardedEmpty,
        ScrapeOutcome::Discarded(DiscardReason::Language) => ScrapeReport::DiscardedLanguage,
        ScrapeOutcome::Failed(e) => ScrapeReport::Failed { error: e.to_string() },
    };
    Ok(report)
}
