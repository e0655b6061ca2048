//! Command line interface.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod commands;
mod helpers;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::app::{AppContext, StoreKind};
use crate::config::{load_settings, LoadOptions};
use crate::models::DietaryFilters;

#[derive(Parser)]
#[command(name = "recetario")]
#[command(about = "Search recipe sites and collect recipes without duplicates")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true, env = "RECETARIO_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Keep recipes in memory instead of the database
    #[arg(long, global = true)]
    memory: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

/// Dietary flags shared by `search` and `scrape`.
#[derive(clap::Args, Debug, Clone, Copy, Default)]
pub struct DietaryArgs {
    /// Only gluten-free recipes
    #[arg(long)]
    gluten_free: bool,
    /// Only vegetarian recipes
    #[arg(long)]
    vegetarian: bool,
    /// Only vegan recipes
    #[arg(long)]
    vegan: bool,
}

impl From<DietaryArgs> for DietaryFilters {
    fn from(args: DietaryArgs) -> Self {
        Self {
            gluten_free: args.gluten_free,
            vegetarian: args.vegetarian,
            vegan: args.vegan,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Search every site (or the given ones) and save new recipes
    Search {
        /// Keyword to search for (optional, lists recent recipes without it)
        keyword: Option<String>,
        #[command(flatten)]
        dietary: DietaryArgs,
        /// Site to search, repeatable; "all" for every site
        #[arg(short, long = "site")]
        sites: Vec<String>,
        /// Maximum number of recipes to collect
        #[arg(short, long, default_value = "500")]
        limit: usize,
        /// Print the final job snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Scrape a single recipe url and save it
    Scrape {
        /// Recipe url on a supported site
        url: String,
        #[command(flatten)]
        dietary: DietaryArgs,
        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// List supported sites
    Sites,

    /// Start the HTTP job API
    Serve {
        /// Address to bind to: PORT, HOST, or HOST:PORT (default: 127.0.0.1:3030)
        #[arg(default_value = "127.0.0.1:3030")]
        bind: String,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
    };
    let (settings, config) = load_settings(&options).await?;
    let store = if cli.memory {
        StoreKind::Memory
    } else {
        StoreKind::Sqlite
    };
    let ctx = AppContext::build(settings, &config, store)?;

    match cli.command {
        Commands::Search {
            keyword,
            dietary,
            sites,
            limit,
            json,
        } => commands::search::cmd_search(&ctx, keyword, dietary.into(), sites, limit, json).await,
        Commands::Scrape { url, dietary, json } => {
            commands::scrape::cmd_scrape(&ctx, &url, dietary.into(), json).await
        }
        Commands::Sites => commands::sites::cmd_sites(&ctx),
        Commands::Serve { bind } => commands::serve::cmd_serve(&ctx, &bind).await,
    }
}
