//! Data models for recetario.

mod job;
mod recipe;

pub use job::{
    Counters, InvalidTransition, JobSnapshot, JobState, SearchJob, SearchRequest, SiteState,
    SiteStatus, Strategy, UrlOutcome,
};
pub use recipe::{DietaryFilters, NewRecipe, ScrapedRecipe, StoredRecipe};
