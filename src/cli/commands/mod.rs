//! Command implementations.

pub mod scrape;
pub mod search;
pub mod serve;
pub mod sites;
