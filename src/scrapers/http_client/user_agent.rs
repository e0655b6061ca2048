//! User agent selection for outgoing requests.

use std::sync::atomic::{AtomicUsize, Ordering};

const DEFAULT_AGENT: &str = "recetario/0.3 (recipe collector)";

/// Desktop browser agents for recipe sites that turn away bots.
const BROWSER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.1 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:133.0) Gecko/20100101 Firefox/133.0",
];

static NEXT_BROWSER_AGENT: AtomicUsize = AtomicUsize::new(0);

fn next_browser_agent() -> &'static str {
    let slot = NEXT_BROWSER_AGENT.fetch_add(1, Ordering::Relaxed);
    BROWSER_AGENTS[slot % BROWSER_AGENTS.len()]
}

/// `None` gives the crate's own agent, `"impersonate"` the next browser
/// agent in rotation, anything else is used verbatim.
pub fn resolve_user_agent(setting: Option<&str>) -> String {
    match setting.map(str::trim) {
        None | Some("") => DEFAULT_AGENT.to_string(),
        Some("impersonate") => next_browser_agent().to_string(),
        Some(custom) => custom.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_user_agent() {
        assert!(resolve_user_agent(None).starts_with("recetario/"));
        assert!(resolve_user_agent(Some("  ")).starts_with("recetario/"));
        assert!(resolve_user_agent(Some("impersonate")).starts_with("Mozilla/5.0"));
        assert_eq!(resolve_user_agent(Some("MiBot/1.0")), "MiBot/1.0");
    }

    #[test]
    fn test_impersonation_rotates() {
        let seen: std::collections::HashSet<String> = (0..BROWSER_AGENTS.len())
            .map(|_| resolve_user_agent(Some("impersonate")))
            .collect();
        assert!(seen.len() > 1);
    }
}
