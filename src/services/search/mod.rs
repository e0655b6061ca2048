//! Search jobs: creation, progress, cancellation and results.
//!
//! A job fans out over the requested sites with the strategy picked from its
//! result cap, funnels every scraped recipe through the dedup gate and keeps
//! live counters callers can poll.

mod job_store;
mod runner;
mod strategy;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

pub use job_store::{JobEntry, JobStore};
pub use runner::RunnerConfig;
pub use strategy::{select_strategy, PARALLEL_CAP_THRESHOLD};

use crate::models::{JobSnapshot, JobState, SearchJob, SearchRequest, Strategy};
use crate::repository::RecipeStore;
use crate::scrapers::{SearchQuery, SiteAdapter, SiteRegistry};
use crate::services::dedup::DedupGate;
use runner::JobRun;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("job not found: {0}")]
    NotFound(Uuid),
    #[error("no sites registered")]
    NoSites,
    #[error("result cap must be at least 1, got {0}")]
    InvalidCap(usize),
    #[error("orchestrator fault: {0}")]
    OrchestratorFault(String),
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub runner: RunnerConfig,
    /// How long delivered results are kept.
    pub job_ttl: Duration,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            runner: RunnerConfig::default(),
            job_ttl: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SearchStarted {
    pub job_id: Uuid,
    pub strategy: Strategy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CancelAck {
    pub job_id: Uuid,
    /// False when the job had already finished.
    pub accepted: bool,
    pub state: JobState,
}

pub struct SearchService {
    registry: Arc<SiteRegistry>,
    gate: Arc<DedupGate>,
    jobs: JobStore,
    config: SearchConfig,
}

impl SearchService {
    pub fn new(registry: Arc<SiteRegistry>, store: Arc<dyn RecipeStore>, config: SearchConfig) -> Self {
        Self {
            registry,
            gate: Arc::new(DedupGate::new(store)),
            jobs: JobStore::new(),
            config,
        }
    }

    pub fn registry(&self) -> &Arc<SiteRegistry> {
        &self.registry
    }

    pub fn gate(&self) -> &Arc<DedupGate> {
        &self.gate
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Adapters for the requested site names.
    ///
    /// Empty or `all` means every site. Unknown names are dropped; if none
    /// remain, every site is used.
    pub fn resolve_sites(&self, requested: &[String]) -> Vec<Arc<dyn SiteAdapter>> {
        let all = || self.registry.adapters().to_vec();
        if requested.is_empty() || requested.iter().any(|s| s.trim().eq_ignore_ascii_case("all")) {
            return all();
        }

        let mut adapters: Vec<Arc<dyn SiteAdapter>> = Vec::new();
        for name in requested {
            match self.registry.by_name(name.trim()) {
                Some(adapter) if !adapters.iter().any(|a| a.name() == adapter.name()) => {
                    adapters.push(adapter)
                }
                Some(_) => {}
                None => warn!("Ignoring unknown site: {}", name),
            }
        }
        if adapters.is_empty() {
            warn!("None of the requested sites exist, searching all sites");
            return all();
        }
        adapters
    }

    /// Create a job and start it in the background.
    pub fn start_search(&self, request: SearchRequest) -> Result<SearchStarted, SearchError> {
        if request.result_cap < 1 {
            return Err(SearchError::InvalidCap(request.result_cap));
        }
        if self.registry.is_empty() {
            return Err(SearchError::NoSites);
        }
        let pruned = self.jobs.prune(self.config.job_ttl);
        if pruned > 0 {
            info!("Pruned {} finished jobs", pruned);
        }

        let adapters = self.resolve_sites(&request.sites);
        let keyword = request
            .keyword
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        let strategy = select_strategy(request.result_cap);
        let job = SearchJob::new(
            keyword.clone(),
            request.filters,
            adapters.iter().map(|a| a.name().to_string()).collect(),
            request.result_cap,
            strategy,
        );
        let id = job.id;
        info!(
            "Starting search {} ({}, cap {}, {} sites, keyword {:?})",
            id,
            strategy.as_str(),
            request.result_cap,
            adapters.len(),
            keyword
        );

        let entry = self.jobs.insert(job);
        let run = Arc::new(JobRun {
            id,
            entry,
            adapters,
            gate: self.gate.clone(),
            query: SearchQuery::new(keyword, request.filters),
            strategy,
            config: self.config.runner.clone(),
        });
        tokio::spawn(runner::supervise(run));

        Ok(SearchStarted { job_id: id, strategy })
    }

    fn entry(&self, id: &Uuid) -> Result<Arc<JobEntry>, SearchError> {
        self.jobs.get(id).ok_or(SearchError::NotFound(*id))
    }

    /// Current snapshot. A terminal snapshot counts as delivered, so the job
    /// becomes eligible for pruning whichever accessor the caller polls.
    pub async fn get_progress(&self, id: &Uuid) -> Result<JobSnapshot, SearchError> {
        let entry = self.entry(id)?;
        let snapshot = entry.job.lock().await.snapshot();
        if snapshot.state.is_terminal() {
            entry.mark_delivered();
        }
        Ok(snapshot)
    }

    pub async fn get_result(&self, id: &Uuid) -> Result<JobSnapshot, SearchError> {
        self.get_progress(id).await
    }

    /// Request cooperative cancellation.
    pub async fn cancel(&self, id: &Uuid) -> Result<CancelAck, SearchError> {
        let entry = self.entry(id)?;
        let job = entry.job.lock().await;
        let accepted = !job.is_terminal();
        if accepted {
            entry.cancel.cancel();
            info!("Cancellation requested for {}", id);
        }
        Ok(CancelAck {
            job_id: *id,
            accepted,
            state: job.state,
        })
    }

    /// Wait for the job to finish and return its final result.
    pub async fn wait(&self, id: &Uuid) -> Result<JobSnapshot, SearchError> {
        let entry = self.entry(id)?;
        entry.done.cancelled().await;
        self.get_result(id).await
    }

    /// Drop a job, cancelling it first if it is still running.
    pub async fn remove(&self, id: &Uuid) -> Result<JobSnapshot, SearchError> {
        let entry = self.jobs.remove(id).ok_or(SearchError::NotFound(*id))?;
        entry.cancel.cancel();
        let snapshot = entry.job.lock().await.snapshot();
        Ok(snapshot)
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    pub fn prune(&self) -> usize {
        self.jobs.prune(self.config.job_ttl)
    }
}
