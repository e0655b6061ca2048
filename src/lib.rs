//! recetario - multi-site recipe scraping.
//!
//! Search jobs fan out over registered recipe sites, pass every scraped
//! record through a deduplication gate into the recipe store and expose live
//! progress to the CLI and the HTTP API.

pub mod app;
pub mod cli;
pub mod config;
pub mod models;
pub mod repository;
pub mod scrapers;
pub mod server;
pub mod services;
