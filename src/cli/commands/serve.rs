//! Web server command.

use console::style;

use crate::app::AppContext;

/// Start the job API server.
pub async fn cmd_serve(ctx: &AppContext, bind: &str) -> anyhow::Result<()> {
    let (host, port) = parse_bind_address(bind);

    println!(
        "{} Starting recetario API at http://{}:{} ({} sites)",
        style("→").cyan(),
        host,
        port,
        ctx.registry.len()
    );
    println!("  Press Ctrl+C to stop");

    crate::server::serve(ctx, &host, port).await
}

/// Parse a bind address that can be:
/// - Just a port: "3030" -> 127.0.0.1:3030
/// - Just a host: "0.0.0.0" -> 0.0.0.0:3030
/// - Host and port: "0.0.0.0:3030" -> 0.0.0.0:3030
fn parse_bind_address(bind: &str) -> (String, u16) {
    if let Ok(port) = bind.parse::<u16>() {
        return ("127.0.0.1".to_string(), port);
    }

    if let Some((host, port_str)) = bind.rsplit_once(':') {
        if let Ok(port) = port_str.parse::<u16>() {
            return (host.to_string(), port);
        }
    }

    (bind.to_string(), 3030)
}
