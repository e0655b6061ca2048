//! Site listing command.

use console::style;

use crate::app::AppContext;

pub fn cmd_sites(ctx: &AppContext) -> anyhow::Result<()> {
    println!("{}", style("SITES").cyan().bold());
    for site in ctx.registry.sites() {
        println!("  {:<32} {}", site.name, style(site.domains.join(", ")).dim());
    }
    println!();
    println!("{} sites", ctx.registry.len());
    Ok(())
}
