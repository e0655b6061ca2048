//! Search command: start a job, follow its progress, print the summary.

use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::app::AppContext;
use crate::cli::helpers::print_summary;
use crate::models::{DietaryFilters, JobSnapshot, SearchRequest, SiteState};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

pub async fn cmd_search(
    ctx: &AppContext,
    keyword: Option<String>,
    filters: DietaryFilters,
    sites: Vec<String>,
    limit: usize,
    json: bool,
) -> anyhow::Result<()> {
    let request = SearchRequest {
        keyword,
        filters,
        sites,
        result_cap: limit,
    };
    let started = ctx.search.start_search(request)?;
    let job_id = started.job_id;

    if !json {
        println!(
            "{} Search {} started ({} strategy)",
            style("→").cyan(),
            &job_id.to_string()[..8],
            started.strategy.as_str()
        );
    }

    let progress = if json {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(100)
    };
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}% {wide_msg}")?
            .progress_chars("█▓░"),
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut cancelling = false;

    loop {
        let snapshot = ctx.search.get_progress(&job_id).await?;
        progress.set_position(u64::from(snapshot.progress_percentage));
        progress.set_message(progress_message(&snapshot));
        if snapshot.state.is_terminal() {
            break;
        }

        tokio::select! {
            _ = &mut ctrl_c, if !cancelling => {
                cancelling = true;
                progress.println(format!("{} Cancelling, waiting for in-flight pages...", style("!").yellow()));
                ctx.search.cancel(&job_id).await?;
            }
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
        }
    }
    progress.finish_and_clear();

    let result = ctx.search.get_result(&job_id).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result);
    }
    Ok(())
}

fn progress_message(snapshot: &JobSnapshot) -> String {
    let active: Vec<&str> = snapshot
        .sites
        .iter()
        .filter(|s| s.state == SiteState::InProgress)
        .map(|s| s.name.as_str())
        .collect();
    let mut message = format!("{} found, {} new", snapshot.total_found, snapshot.total_new);
    if !active.is_empty() {
        message.push_str(" | ");
        message.push_str(&active.join(", "));
    }
    message
}
