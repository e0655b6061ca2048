//! Service layer: search orchestration and single-url scraping.
//!
//! Services are shared by the CLI and the HTTP API.

pub mod dedup;
pub mod scrape;
pub mod search;

pub use dedup::{canonical_url, DedupGate, GateDecision};
pub use scrape::{scrape_single, ScrapeReport};
pub use search::{
    select_strategy, CancelAck, RunnerConfig, SearchConfig, SearchError, SearchService,
    SearchStarted,
};
