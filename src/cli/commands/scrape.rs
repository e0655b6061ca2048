//! Single-url scrape command.

use console::style;

use crate::app::AppContext;
use crate::models::DietaryFilters;
use crate::services::{scrape_single, ScrapeReport};

pub async fn cmd_scrape(ctx: &AppContext, url: &str, dietary: DietaryFilters, json: bool) -> anyhow::Result<()> {
    let settings = &ctx.settings;
    let report = scrape_single(
        &ctx.registry,
        ctx.search.gate(),
        url,
        &settings.retry_policy(),
        settings.language,
        dietary,
    )
    .await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    match &report {
        ScrapeReport::New { id, recipe } => {
            println!("{} Saved '{}' (id {})", style("✓").green(), recipe.title, id);
            println!(
                "  {} ingredients, {} steps",
                recipe.ingredients.len(),
                recipe.steps.len()
            );
        }
        ScrapeReport::Duplicate { recipe } => {
            println!("{} '{}' is already stored", style("=").yellow(), recipe.title);
        }
        ScrapeReport::DiscardedEmpty | ScrapeReport::DiscardedLanguage => {
            println!("{} Discarded: {}", style("!").yellow(), report.label());
        }
        ScrapeReport::Failed { error } => {
            eprintln!("{} Failed: {}", style("✗").red(), error);
            return Err(anyhow::anyhow!("scrape failed: {}", error));
        }
    }
    Ok(())
}
