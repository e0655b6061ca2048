//! Search job models: job state, per-site status, counters and snapshots.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::recipe::DietaryFilters;

/// Overall job state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Running,
    Completed,
    Errored,
    Cancelled,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Errored => "errored",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// State of one site within a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteState {
    Pending,
    InProgress,
    Completed,
    Error,
}

impl SiteState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Whether `self -> next` is an allowed transition.
    pub fn can_transition_to(&self, next: SiteState) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InProgress)
                | (Self::InProgress, Self::Completed)
                | (Self::InProgress, Self::Error)
        )
    }
}

/// Execution strategy of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Sites run concurrently, bounded by the orchestrator's site limit.
    Parallel,
    /// One site at a time, in request order.
    Sequential,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parallel => "parallel",
            Self::Sequential => "sequential",
        }
    }
}

/// Classified result of one url operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlOutcome {
    New,
    Duplicate,
    DiscardedEmpty,
    DiscardedLanguage,
    Failed,
}

/// Outcome counters, kept per site and per job.
///
/// `found` counts every classified outcome including discards; failed url
/// operations only count towards `errors`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub found: u64,
    pub new: u64,
    pub duplicate: u64,
    pub discarded_empty: u64,
    pub discarded_language: u64,
    pub errors: u64,
}

impl Counters {
    pub fn record(&mut self, outcome: UrlOutcome) {
        match outcome {
            UrlOutcome::New => self.new += 1,
            UrlOutcome::Duplicate => self.duplicate += 1,
            UrlOutcome::DiscardedEmpty => self.discarded_empty += 1,
            UrlOutcome::DiscardedLanguage => self.discarded_language += 1,
            UrlOutcome::Failed => {
                self.errors += 1;
                return;
            }
        }
        self.found += 1;
    }

    /// `found == new + duplicate + discarded_empty + discarded_language`.
    pub fn is_balanced(&self) -> bool {
        self.found == self.new + self.duplicate + self.discarded_empty + self.discarded_language
    }
}

/// Status of one site within a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteStatus {
    pub name: String,
    pub state: SiteState,
    #[serde(flatten)]
    pub counters: Counters,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl SiteStatus {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: SiteState::Pending,
            counters: Counters::default(),
            error_message: None,
        }
    }

    /// Move to `next`, refusing anything but the forward transitions.
    pub fn transition(&mut self, next: SiteState) -> Result<(), InvalidTransition> {
        if !self.state.can_transition_to(next) {
            return Err(InvalidTransition {
                site: self.name.clone(),
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }
}

/// Attempted site transition outside pending -> in_progress -> {completed, error}.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid transition for {site}: {} -> {}", from.as_str(), to.as_str())]
pub struct InvalidTransition {
    pub site: String,
    pub from: SiteState,
    pub to: SiteState,
}

/// Parameters of a search as requested by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub filters: DietaryFilters,
    /// Site names, or `["all"]` / empty for every registered site.
    #[serde(default)]
    pub sites: Vec<String>,
    #[serde(default = "default_result_cap")]
    pub result_cap: usize,
}

fn default_result_cap() -> usize {
    500
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            keyword: None,
            filters: DietaryFilters::default(),
            sites: Vec::new(),
            result_cap: default_result_cap(),
        }
    }
}

/// Live state of a search job. Only the orchestrator mutates it.
#[derive(Debug, Clone)]
pub struct SearchJob {
    pub id: Uuid,
    pub keyword: Option<String>,
    pub filters: DietaryFilters,
    pub result_cap: usize,
    /// Per-site url quota derived from the cap.
    pub per_site_limit: usize,
    pub strategy: Strategy,
    pub sites: Vec<SiteStatus>,
    pub totals: Counters,
    pub state: JobState,
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    started: Instant,
    finished: Option<Instant>,
    /// Set once any task has seen the cancellation flag.
    pub cancel_observed: bool,
    /// Urls started but not yet recorded.
    in_flight: usize,
}

impl SearchJob {
    pub fn new(
        keyword: Option<String>,
        filters: DietaryFilters,
        site_names: Vec<String>,
        result_cap: usize,
        strategy: Strategy,
    ) -> Self {
        let per_site_limit = (result_cap / site_names.len().max(1)).max(1);
        Self {
            id: Uuid::new_v4(),
            keyword,
            filters,
            result_cap,
            per_site_limit,
            strategy,
            sites: site_names.into_iter().map(SiteStatus::new).collect(),
            totals: Counters::default(),
            state: JobState::Running,
            errors: Vec::new(),
            started_at: Utc::now(),
            started: Instant::now(),
            finished: None,
            cancel_observed: false,
            in_flight: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Urls that may still be started before the job reaches its cap.
    /// Urls in flight count as if they were already found.
    pub fn remaining_cap(&self) -> usize {
        self.result_cap
            .saturating_sub(self.totals.found as usize)
            .saturating_sub(self.in_flight)
    }

    /// Claim one url slot under the cap. Released by [`record`](Self::record).
    pub fn reserve_slot(&mut self) -> bool {
        if self.remaining_cap() == 0 {
            return false;
        }
        self.in_flight += 1;
        true
    }

    /// Transition a site unless cancellation was already observed.
    ///
    /// Returns `Ok(false)` when the transition was suppressed by cancellation.
    pub fn transition_site(&mut self, index: usize, next: SiteState) -> Result<bool, InvalidTransition> {
        if self.cancel_observed {
            return Ok(false);
        }
        match self.sites.get_mut(index) {
            Some(site) => site.transition(next).map(|_| true),
            None => Ok(false),
        }
    }

    /// Mark a site failed and record its error message in the job.
    pub fn fail_site(&mut self, index: usize, message: String) -> Result<bool, InvalidTransition> {
        let Some(name) = self.sites.get(index).map(|s| s.name.clone()) else {
            return Ok(false);
        };
        self.errors.push(format!("{}: {}", name, message));
        if !self.transition_site(index, SiteState::Error)? {
            return Ok(false);
        }
        self.sites[index].error_message = Some(message);
        Ok(true)
    }

    /// Count a url outcome for a site and for the job, releasing its slot.
    pub fn record(&mut self, index: usize, outcome: UrlOutcome, error: Option<String>) {
        self.in_flight = self.in_flight.saturating_sub(1);
        if let Some(site) = self.sites.get_mut(index) {
            site.counters.record(outcome);
            if let Some(message) = error {
                self.errors.push(format!("{}: {}", site.name, message));
            }
        }
        self.totals.record(outcome);
    }

    /// Move the job to a terminal state. Ignored if already terminal.
    pub fn finish(&mut self, state: JobState) {
        if self.state.is_terminal() || !state.is_terminal() {
            return;
        }
        self.state = state;
        self.finished = Some(Instant::now());
    }

    /// Seconds since the job was created, frozen once terminal.
    pub fn elapsed_seconds(&self) -> f64 {
        match self.finished {
            Some(end) => end.duration_since(self.started).as_secs_f64(),
            None => self.started.elapsed().as_secs_f64(),
        }
    }

    /// Time since the job reached a terminal state.
    pub fn finished_for(&self) -> Option<std::time::Duration> {
        self.finished.map(|f| f.elapsed())
    }

    /// Percentage of sites in a terminal per-site state.
    pub fn progress_percentage(&self) -> u8 {
        if self.sites.is_empty() {
            return if self.is_terminal() { 100 } else { 0 };
        }
        let done = self.sites.iter().filter(|s| s.state.is_terminal()).count();
        ((done * 100) / self.sites.len()) as u8
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job_id: self.id,
            state: self.state,
            strategy: self.strategy,
            keyword: self.keyword.clone(),
            filters: self.filters,
            result_cap: self.result_cap,
            progress_percentage: self.progress_percentage(),
            sites: self.sites.clone(),
            total_found: self.totals.found,
            total_new: self.totals.new,
            total_duplicate: self.totals.duplicate,
            total_discarded_empty: self.totals.discarded_empty,
            total_discarded_language: self.totals.discarded_language,
            total_errors: self.totals.errors,
            errors: self.errors.clone(),
            started_at: self.started_at,
            elapsed_seconds: self.elapsed_seconds(),
        }
    }
}

/// Read-only view of a job handed to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job_id: Uuid,
    pub state: JobState,
    pub strategy: Strategy,
    #[serde(default)]
    pub keyword: Option<String>,
    pub filters: DietaryFilters,
    pub result_cap: usize,
    pub progress_percentage: u8,
    pub sites: Vec<SiteStatus>,
    pub total_found: u64,
    pub total_new: u64,
    pub total_duplicate: u64,
    pub total_discarded_empty: u64,
    pub total_discarded_language: u64,
    pub total_errors: u64,
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub elapsed_seconds: f64,
}

impl JobSnapshot {
    pub fn site(&self, name: &str) -> Option<&SiteStatus> {
        self.sites.iter().find(|s| s.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(sites: &[&str]) -> SearchJob {
        SearchJob::new(
            None,
            DietaryFilters::default(),
            sites.iter().map(|s| s.to_string()).collect(),
            10,
            Strategy::Parallel,
        )
    }

    #[test]
    fn test_site_transitions_are_forward_only() {
        let mut site = SiteStatus::new("Cookpad");
        assert!(site.transition(SiteState::Completed).is_err());
        site.transition(SiteState::InProgress).unwrap();
        site.transition(SiteState::Completed).unwrap();
        assert!(site.transition(SiteState::InProgress).is_err());
        assert!(site.transition(SiteState::Error).is_err());
    }

    #[test]
    fn test_counters_found_excludes_failures() {
        let mut counters = Counters::default();
        counters.record(UrlOutcome::New);
        counters.record(UrlOutcome::Duplicate);
        counters.record(UrlOutcome::DiscardedEmpty);
        counters.record(UrlOutcome::DiscardedLanguage);
        counters.record(UrlOutcome::Failed);
        assert_eq!(counters.found, 4);
        assert_eq!(counters.errors, 1);
        assert!(counters.is_balanced());
    }

    #[test]
    fn test_per_site_limit() {
        assert_eq!(job(&["a", "b"]).per_site_limit, 5);
        assert_eq!(job(&["a", "b", "c"]).per_site_limit, 3);
        let many: Vec<String> = (0..20).map(|i| i.to_string()).collect();
        let j = SearchJob::new(None, DietaryFilters::default(), many, 10, Strategy::Parallel);
        assert_eq!(j.per_site_limit, 1);
    }

    #[test]
    fn test_reserved_slots_count_against_cap() {
        let mut j = SearchJob::new(
            None,
            DietaryFilters::default(),
            vec!["a".to_string(), "b".to_string()],
            2,
            Strategy::Parallel,
        );
        assert!(j.reserve_slot());
        assert!(j.reserve_slot());
        assert_eq!(j.remaining_cap(), 0);
        assert!(!j.reserve_slot());

        // a failure frees its slot without using the cap
        j.record(0, UrlOutcome::Failed, Some("timeout".to_string()));
        assert_eq!(j.remaining_cap(), 1);
        j.record(1, UrlOutcome::New, None);
        assert_eq!(j.remaining_cap(), 1);
        assert!(j.reserve_slot());
        assert!(!j.reserve_slot());
    }

    #[test]
    fn test_progress_percentage() {
        let mut j = job(&["a", "b", "c", "d"]);
        assert_eq!(j.progress_percentage(), 0);
        j.transition_site(0, SiteState::InProgress).unwrap();
        j.transition_site(0, SiteState::Completed).unwrap();
        j.transition_site(1, SiteState::InProgress).unwrap();
        j.fail_site(1, "boom".to_string()).unwrap();
        assert_eq!(j.progress_percentage(), 50);
        assert_eq!(j.errors, vec!["b: boom".to_string()]);
    }

    #[test]
    fn test_cancel_observed_suppresses_transitions() {
        let mut j = job(&["a"]);
        j.transition_site(0, SiteState::InProgress).unwrap();
        j.cancel_observed = true;
        assert_eq!(j.transition_site(0, SiteState::Completed), Ok(false));
        assert_eq!(j.sites[0].state, SiteState::InProgress);
    }

    #[test]
    fn test_finish_is_one_way() {
        let mut j = job(&["a"]);
        j.finish(JobState::Cancelled);
        j.finish(JobState::Completed);
        assert_eq!(j.state, JobState::Cancelled);
        assert!(j.finished_for().is_some());
    }

    #[test]
    fn test_snapshot_serializes_snake_case() {
        let j = job(&["Cookpad"]);
        let json = serde_json::to_value(j.snapshot()).unwrap();
        assert_eq!(json["state"], "running");
        assert_eq!(json["strategy"], "parallel");
        assert_eq!(json["sites"][0]["state"], "pending");
        assert_eq!(json["sites"][0]["found"], 0);
    }
}
