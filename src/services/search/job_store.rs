//! Table of live and finished search jobs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::models::SearchJob;

/// One job with its cancellation token.
pub struct JobEntry {
    pub job: Mutex<SearchJob>,
    /// Set by callers to request cancellation.
    pub cancel: CancellationToken,
    /// Fired once the job reached a terminal state.
    pub done: CancellationToken,
    delivered: AtomicBool,
}

impl JobEntry {
    pub fn new(job: SearchJob) -> Self {
        Self {
            job: Mutex::new(job),
            cancel: CancellationToken::new(),
            done: CancellationToken::new(),
            delivered: AtomicBool::new(false),
        }
    }

    /// Whether the final result has been handed to a caller.
    pub fn is_delivered(&self) -> bool {
        self.delivered.load(Ordering::SeqCst)
    }

    pub fn mark_delivered(&self) {
        self.delivered.store(true, Ordering::SeqCst);
    }
}

/// Jobs by id. Owned by the search service, never global.
#[derive(Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<Uuid, Arc<JobEntry>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, job: SearchJob) -> Arc<JobEntry> {
        let id = job.id;
        let entry = Arc::new(JobEntry::new(job));
        self.jobs
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, entry.clone());
        entry
    }

    pub fn get(&self, id: &Uuid) -> Option<Arc<JobEntry>> {
        self.jobs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }

    pub fn remove(&self, id: &Uuid) -> Option<Arc<JobEntry>> {
        self.jobs.write().unwrap_or_else(|e| e.into_inner()).remove(id)
    }

    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evict delivered jobs that finished more than `ttl` ago.
    ///
    /// Jobs whose lock is busy are skipped; they are still being updated.
    pub fn prune(&self, ttl: Duration) -> usize {
        let mut jobs = self.jobs.write().unwrap_or_else(|e| e.into_inner());
        let before = jobs.len();
        jobs.retain(|_, entry| {
            if !entry.is_delivered() {
                return true;
            }
            match entry.job.try_lock() {
                Ok(job) => job.finished_for().map_or(true, |age| age < ttl),
                Err(_) => true,
            }
        });
        before - jobs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DietaryFilters, JobState, Strategy};

    fn job() -> SearchJob {
        SearchJob::new(None, DietaryFilters::default(), vec!["A".into()], 10, Strategy::Parallel)
    }

    #[tokio::test]
    async fn test_insert_get_remove() {
        let store = JobStore::new();
        let entry = store.insert(job());
        let id = entry.job.lock().await.id;

        assert!(store.get(&id).is_some());
        assert_eq!(store.len(), 1);
        assert!(store.remove(&id).is_some());
        assert!(store.get(&id).is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_prune_only_delivered_terminal_jobs() {
        let store = JobStore::new();
        let running = store.insert(job());
        let undelivered = store.insert(job());
        let delivered = store.insert(job());

        undelivered.job.lock().await.finish(JobState::Completed);
        delivered.job.lock().await.finish(JobState::Completed);
        delivered.mark_delivered();
        running.mark_delivered();

        assert_eq!(store.prune(Duration::from_secs(3600)), 0);
        assert_eq!(store.prune(Duration::ZERO), 1);
        assert_eq!(store.len(), 2);
        let delivered_id = delivered.job.lock().await.id;
        assert!(store.get(&delivered_id).is_none());
    }
}
