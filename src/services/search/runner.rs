//! Executes one search job: per-site work units under a strategy.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::job_store::JobEntry;
use super::SearchError;
use crate::models::{JobState, SiteState, Strategy, UrlOutcome};
use crate::scrapers::{scrape_url, DiscardReason, Language, RetryPolicy, ScrapeOutcome, SearchQuery, SiteAdapter};
use crate::services::dedup::{DedupGate, GateDecision};

/// Knobs the runner needs from the service configuration.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub retry: RetryPolicy,
    pub language: Option<Language>,
    pub max_parallel_sites: usize,
    pub sequential_site_delay: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            language: Some(Language::Spanish),
            max_parallel_sites: 3,
            sequential_site_delay: Duration::from_millis(3000),
        }
    }
}

/// Everything a running job needs. `adapters[i]` serves `job.sites[i]`.
pub struct JobRun {
    pub id: Uuid,
    pub entry: Arc<JobEntry>,
    pub adapters: Vec<Arc<dyn SiteAdapter>>,
    pub gate: Arc<DedupGate>,
    pub query: SearchQuery,
    pub strategy: Strategy,
    pub config: RunnerConfig,
}

impl JobRun {
    fn short_id(&self) -> String {
        self.id.to_string()[..8].to_string()
    }

    fn cancel_requested(&self) -> bool {
        self.entry.cancel.is_cancelled()
    }

    /// Record that a task saw the cancellation flag. From here on no site
    /// changes state.
    async fn observe_cancel(&self) {
        let mut job = self.entry.job.lock().await;
        if !job.cancel_observed {
            job.cancel_observed = true;
            info!("[{}] cancellation observed", self.short_id());
        }
    }

    async fn transition(&self, index: usize, next: SiteState) -> bool {
        let mut job = self.entry.job.lock().await;
        match job.transition_site(index, next) {
            Ok(applied) => applied,
            Err(e) => {
                warn!("[{}] {}", self.short_id(), e);
                false
            }
        }
    }

    async fn fail_site(&self, index: usize, message: String) {
        let mut job = self.entry.job.lock().await;
        if let Err(e) = job.fail_site(index, message) {
            warn!("[{}] {}", self.short_id(), e);
        }
    }
}

/// Run the job to a terminal state.
///
/// The work runs in its own task so that a panic anywhere in it becomes an
/// orchestrator fault on this job instead of a lost task.
pub async fn supervise(run: Arc<JobRun>) {
    let id = run.short_id();
    let outcome = match tokio::spawn(execute(run.clone())).await {
        Ok(result) => result,
        Err(e) => Err(SearchError::OrchestratorFault(format!("job task failed: {}", e))),
    };

    let mut job = run.entry.job.lock().await;
    let state = match outcome {
        Err(fault) => {
            warn!("[{}] {}", id, fault);
            job.errors.push(fault.to_string());
            JobState::Errored
        }
        Ok(()) if job.cancel_observed => JobState::Cancelled,
        Ok(()) => JobState::Completed,
    };
    job.finish(state);
    info!(
        "[{}] {} in {:.1}s: found {}, new {}, duplicate {}, discarded {}/{}, errors {}",
        id,
        job.state.as_str(),
        job.elapsed_seconds(),
        job.totals.found,
        job.totals.new,
        job.totals.duplicate,
        job.totals.discarded_empty,
        job.totals.discarded_language,
        job.totals.errors
    );
    drop(job);
    run.entry.done.cancel();
}

async fn execute(run: Arc<JobRun>) -> Result<(), SearchError> {
    match run.strategy {
        Strategy::Parallel => run_parallel(run).await,
        Strategy::Sequential => {
            run_sequential(run).await;
            Ok(())
        }
    }
}

async fn run_parallel(run: Arc<JobRun>) -> Result<(), SearchError> {
    let permits = Arc::new(Semaphore::new(run.config.max_parallel_sites.max(1)));
    let mut tasks = JoinSet::new();

    for index in 0..run.adapters.len() {
        let run = run.clone();
        let permits = permits.clone();
        tasks.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            run_site(&run, index).await;
        });
    }

    let mut fault = None;
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            fault.get_or_insert_with(|| SearchError::OrchestratorFault(format!("site task failed: {}", e)));
        }
    }
    fault.map_or(Ok(()), Err)
}

async fn run_sequential(run: Arc<JobRun>) {
    let count = run.adapters.len();
    for index in 0..count {
        run_site(&run, index).await;
        if index + 1 < count && !run.config.sequential_site_delay.is_zero() {
            tokio::select! {
                _ = run.entry.cancel.cancelled() => {
                    run.observe_cancel().await;
                    return;
                }
                _ = tokio::time::sleep(run.config.sequential_site_delay) => {}
            }
        }
    }
}

fn classify(decision: Result<GateDecision, String>) -> (UrlOutcome, Option<String>) {
    match decision {
        Ok(GateDecision::New(_)) => (UrlOutcome::New, None),
        Ok(GateDecision::Duplicate) => (UrlOutcome::Duplicate, None),
        Err(e) => (UrlOutcome::Failed, Some(e)),
    }
}

/// One site's work unit: discover candidates, scrape each, count outcomes.
async fn run_site(run: &JobRun, index: usize) {
    let id = run.short_id();
    if run.cancel_requested() {
        run.observe_cancel().await;
        return;
    }
    let adapter = &run.adapters[index];
    if !run.transition(index, SiteState::InProgress).await {
        return;
    }

    let (limit, filters) = {
        let job = run.entry.job.lock().await;
        (job.per_site_limit.min(job.remaining_cap()), job.filters)
    };
    info!("[{}] {} started, up to {} urls", id, adapter.name(), limit);
    if limit == 0 {
        run.transition(index, SiteState::Completed).await;
        return;
    }

    let urls = match adapter.discover(&run.query, limit).await {
        Ok(urls) => urls,
        Err(e) => {
            warn!("[{}] {} discovery failed: {}", id, adapter.name(), e);
            run.fail_site(index, format!("discovery failed: {}", e)).await;
            return;
        }
    };
    debug!("[{}] {} discovered {} urls", id, adapter.name(), urls.len());

    let mut attempted = 0usize;
    let mut failed = 0usize;
    for url in urls.into_iter().take(limit) {
        if run.cancel_requested() {
            run.observe_cancel().await;
            return;
        }
        if !run.entry.job.lock().await.reserve_slot() {
            debug!("[{}] result cap reached", id);
            break;
        }

        attempted += 1;
        let (outcome, error) = match scrape_url(adapter.as_ref(), &url, &run.config.retry, run.config.language).await {
            ScrapeOutcome::Success(recipe) => {
                classify(run.gate.admit(recipe, filters).await.map_err(|e| format!("{}: {}", url, e)))
            }
            ScrapeOutcome::Discarded(DiscardReason::Empty) => (UrlOutcome::DiscardedEmpty, None),
            ScrapeOutcome::Discarded(DiscardReason::Language) => (UrlOutcome::DiscardedLanguage, None),
            ScrapeOutcome::Failed(e) => (UrlOutcome::Failed, Some(format!("{}: {}", url, e))),
        };
        if outcome == UrlOutcome::Failed {
            failed += 1;
        }
        run.entry.job.lock().await.record(index, outcome, error);
    }

    if attempted > 0 && failed == attempted {
        run.fail_site(index, format!("all {} urls failed", attempted)).await;
    } else {
        run.transition(index, SiteState::Completed).await;
    }
    info!("[{}] {} finished", id, adapter.name());
}
