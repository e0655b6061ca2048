//! Shared helper functions for CLI commands.

use console::style;

use crate::models::{JobSnapshot, JobState, SiteState};

/// Print the per-site table and totals of a finished job.
pub fn print_summary(snapshot: &JobSnapshot) {
    let separator = "─".repeat(72);
    let state = match snapshot.state {
        JobState::Completed => style(snapshot.state.as_str()).green(),
        JobState::Cancelled => style(snapshot.state.as_str()).yellow(),
        JobState::Errored => style(snapshot.state.as_str()).red(),
        JobState::Running => style(snapshot.state.as_str()).cyan(),
    };

    println!();
    println!(
        "{} {} ({}, {:.1}s)",
        style("Search").bold(),
        state,
        snapshot.strategy.as_str(),
        snapshot.elapsed_seconds
    );
    println!("{}", separator);
    println!(
        "{:<30} {:>11} {:>7} {:>7} {:>7} {:>7}",
        style("SITE").cyan().bold(),
        "State",
        "Found",
        "New",
        "Dup",
        "Errors"
    );
    for site in &snapshot.sites {
        let marker = match site.state {
            SiteState::Completed => style("✓").green(),
            SiteState::Error => style("✗").red(),
            SiteState::InProgress => style("…").yellow(),
            SiteState::Pending => style("·").dim(),
        };
        println!(
            "{} {:<28} {:>11} {:>7} {:>7} {:>7} {:>7}",
            marker,
            truncate_string(&site.name, 28),
            site.state.as_str(),
            format_number(site.counters.found),
            format_number(site.counters.new),
            format_number(site.counters.duplicate),
            format_number(site.counters.errors)
        );
    }
    println!("{}", separator);
    println!("  {:<22} {:>10}", "Found:", format_number(snapshot.total_found));
    println!(
        "  {:<22} {:>10}",
        "New:",
        style(format_number(snapshot.total_new)).green()
    );
    println!("  {:<22} {:>10}", "Duplicate:", format_number(snapshot.total_duplicate));
    println!(
        "  {:<22} {:>10}",
        "Discarded (empty):",
        format_number(snapshot.total_discarded_empty)
    );
    println!(
        "  {:<22} {:>10}",
        "Discarded (language):",
        format_number(snapshot.total_discarded_language)
    );
    println!("  {:<22} {:>10}", "Errors:", format_number(snapshot.total_errors));

    if !snapshot.errors.is_empty() {
        println!();
        println!("{}", style("ERRORS").red().bold());
        for error in snapshot.errors.iter().take(10) {
            println!("  {}", truncate_string(error, 100));
        }
        if snapshot.errors.len() > 10 {
            println!("  ... and {} more", snapshot.errors.len() - 10);
        }
    }
}

/// Format number with thousands separators.
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let bytes: Vec<_> = s.bytes().rev().collect();
    let chunks: Vec<_> = bytes
        .chunks(3)
        .map(|chunk| chunk.iter().rev().map(|&b| b as char).collect::<String>())
        .collect();
    chunks.into_iter().rev().collect::<Vec<_>>().join(",")
}

/// Truncate a string to max characters with ellipsis.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
