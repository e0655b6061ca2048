//! One adapter against one url, with a timeout and bounded retries.

use std::time::Duration;

use tracing::{debug, warn};

use super::language::{self, Language};
use super::{ExtractionError, SiteAdapter};
use crate::models::ScrapedRecipe;

/// Timeout and retry settings for a single url.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Applies to each attempt separately.
    pub timeout: Duration,
    /// Attempts after the first one.
    pub max_retries: u32,
    /// Wait before retry `n` is `backoff * n`.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 2,
            backoff: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.backoff * retry
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    Empty,
    Language,
}

#[derive(Debug, Clone)]
pub enum ScrapeOutcome {
    Success(ScrapedRecipe),
    Discarded(DiscardReason),
    Failed(ExtractionError),
}

impl ScrapeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Run `adapter.extract(url)` and classify the result.
///
/// Only network and timeout failures are retried. Empty records and records
/// in the wrong language are discards, not failures.
pub async fn scrape_url(
    adapter: &dyn SiteAdapter,
    url: &str,
    policy: &RetryPolicy,
    language: Option<Language>,
) -> ScrapeOutcome {
    let mut attempt = 0u32;
    let result = loop {
        let result = match tokio::time::timeout(policy.timeout, adapter.extract(url)).await {
            Ok(result) => result,
            Err(_) => Err(ExtractionError::Timeout(policy.timeout)),
        };
        match result {
            Err(e) if e.is_retriable() && attempt < policy.max_retries => {
                attempt += 1;
                let delay = policy.delay_for(attempt);
                debug!(
                    "{} attempt {} failed ({}), retrying in {:?}",
                    url, attempt, e, delay
                );
                tokio::time::sleep(delay).await;
            }
            other => break other,
        }
    };

    match result {
        Ok(recipe) => classify(recipe, language),
        Err(ExtractionError::EmptyResult(reason)) => {
            debug!("{} discarded: {}", url, reason);
            ScrapeOutcome::Discarded(DiscardReason::Empty)
        }
        Err(ExtractionError::LanguageMismatch { .. }) => {
            ScrapeOutcome::Discarded(DiscardReason::Language)
        }
        Err(e) => {
            warn!("{} failed after {} attempt(s): {}", url, attempt + 1, e);
            ScrapeOutcome::Failed(e)
        }
    }
}

fn classify(recipe: ScrapedRecipe, language: Option<Language>) -> ScrapeOutcome {
    if let Err(reason) = recipe.validate() {
        debug!("{} discarded: {}", recipe.source_url, reason);
        return ScrapeOutcome::Discarded(DiscardReason::Empty);
    }
    if let Some(expected) = language {
        if language::is_mismatch(&recipe.text_sample(), expected) {
            debug!("{} discarded: not {}", recipe.source_url, expected.as_str());
            return ScrapeOutcome::Discarded(DiscardReason::Language);
        }
    }
    ScrapeOutcome::Success(recipe)
}
