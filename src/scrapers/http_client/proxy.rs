//! Round-robin proxy rotation.

use std::collections::HashSet;
use std::sync::Mutex;

/// Hands out proxies in turn, skipping ones that recently failed.
///
/// When every proxy has failed the failure set is cleared and rotation
/// starts over.
#[derive(Debug, Default)]
pub struct ProxyRotator {
    proxies: Vec<String>,
    state: Mutex<RotationState>,
}

#[derive(Debug, Default)]
struct RotationState {
    next: usize,
    failed: HashSet<String>,
}

impl ProxyRotator {
    pub fn new(proxies: Vec<String>) -> Self {
        let mut unique = Vec::with_capacity(proxies.len());
        for proxy in proxies {
            let proxy = proxy.trim().to_string();
            if !proxy.is_empty() && !proxy.starts_with('#') && !unique.contains(&proxy) {
                unique.push(proxy);
            }
        }
        Self {
            proxies: unique,
            state: Mutex::new(RotationState::default()),
        }
    }

    /// Parse a proxy list file: one url per line, `#` starts a comment.
    pub fn from_list(contents: &str) -> Self {
        Self::new(contents.lines().map(str::to_string).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.is_empty()
    }

    pub fn proxies(&self) -> &[String] {
        &self.proxies
    }

    pub fn next_proxy(&self) -> Option<String> {
        if self.proxies.is_empty() {
            return None;
        }
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let mut available: Vec<&String> = self
            .proxies
            .iter()
            .filter(|p| !state.failed.contains(*p))
            .collect();
        if available.is_empty() {
            state.failed.clear();
            available = self.proxies.iter().collect();
        }
        let index = state.next % available.len();
        let proxy = available[index].clone();
        state.next = index + 1;
        Some(proxy)
    }

    pub fn mark_failed(&self, proxy: &str) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.failed.insert(proxy.to_string());
    }

    pub fn available(&self) -> usize {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.proxies.iter().filter(|p| !state.failed.contains(*p)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_robin() {
        let rotator = ProxyRotator::new(vec!["http://a:1".into(), "http://b:1".into()]);
        assert_eq!(rotator.next_proxy().as_deref(), Some("http://a:1"));
        assert_eq!(rotator.next_proxy().as_deref(), Some("http://b:1"));
        assert_eq!(rotator.next_proxy().as_deref(), Some("http://a:1"));
    }

    #[test]
    fn test_failed_proxies_are_skipped_until_all_fail() {
        let rotator = ProxyRotator::new(vec!["http://a:1".into(), "http://b:1".into()]);
        rotator.mark_failed("http://a:1");
        assert_eq!(rotator.available(), 1);
        assert_eq!(rotator.next_proxy().as_deref(), Some("http://b:1"));
        assert_eq!(rotator.next_proxy().as_deref(), Some("http://b:1"));

        rotator.mark_failed("http://b:1");
        assert!(rotator.next_proxy().is_some());
        assert_eq!(rotator.available(), 2);
    }

    #[test]
    fn test_from_list_skips_comments_and_blanks() {
        let rotator = ProxyRotator::from_list("# proxies\nhttp://a:1\n\nsocks5://b:2\nhttp://a:1\n");
        assert_eq!(rotator.proxies(), &["http://a:1".to_string(), "socks5://b:2".to_string()]);
        assert!(ProxyRotator::from_list("").next_proxy().is_none());
    }
}
