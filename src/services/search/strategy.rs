//! Execution strategy selection.

use crate::models::Strategy;

/// Largest result cap that still runs sites in parallel.
pub const PARALLEL_CAP_THRESHOLD: usize = 50;

/// Small searches run sites concurrently; large ones one site at a time.
pub fn select_strategy(result_cap: usize) -> Strategy {
    if result_cap <= PARALLEL_CAP_THRESHOLD {
        Strategy::Parallel
    } else {
        Strategy::Sequential
    }
}
