//! Domain-keyed registry of site adapters.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use super::{host_of, normalize_domain, SiteAdapter};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("no adapter handles {0}")]
    UnsupportedDomain(String),
    #[error("domain {domain} claimed by both {existing} and {incoming}")]
    DomainConflict {
        domain: String,
        existing: String,
        incoming: String,
    },
    #[error("site {0} is registered twice")]
    DuplicateSite(String),
    #[error("unknown site: {0}")]
    UnknownSite(String),
    #[error("invalid site {site}: {reason}")]
    InvalidSite { site: String, reason: String },
}

/// Public description of a registered site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteInfo {
    pub name: String,
    pub domains: Vec<String>,
}

/// Adapters in registration order plus a domain index.
///
/// Built once at startup; lookups never mutate it.
#[derive(Default, Clone)]
pub struct SiteRegistry {
    adapters: Vec<Arc<dyn SiteAdapter>>,
    by_domain: HashMap<String, usize>,
}

impl SiteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an adapter. Fails without side effects if its name or any of its
    /// domains is already taken.
    pub fn register(&mut self, adapter: Arc<dyn SiteAdapter>) -> Result<(), RegistryError> {
        if self.by_name(adapter.name()).is_some() {
            return Err(RegistryError::DuplicateSite(adapter.name().to_string()));
        }
        let domains: Vec<String> = adapter.domains().iter().map(|d| normalize_domain(d)).collect();
        if domains.is_empty() {
            return Err(RegistryError::InvalidSite {
                site: adapter.name().to_string(),
                reason: "no domains".to_string(),
            });
        }
        for domain in &domains {
            if let Some(&index) = self.by_domain.get(domain) {
                return Err(RegistryError::DomainConflict {
                    domain: domain.clone(),
                    existing: self.adapters[index].name().to_string(),
                    incoming: adapter.name().to_string(),
                });
            }
        }

        let index = self.adapters.len();
        for domain in domains {
            self.by_domain.insert(domain, index);
        }
        self.adapters.push(adapter);
        Ok(())
    }

    /// Adapter owning the url's host, by exact or parent-domain match.
    ///
    /// The most specific registered domain wins.
    pub fn resolve(&self, url: &str) -> Result<Arc<dyn SiteAdapter>, RegistryError> {
        let host = host_of(url).ok_or_else(|| RegistryError::UnsupportedDomain(url.to_string()))?;
        let mut candidate = host.as_str();
        loop {
            if let Some(&index) = self.by_domain.get(candidate) {
                return Ok(self.adapters[index].clone());
            }
            match candidate.split_once('.') {
                Some((_, parent)) if parent.contains('.') => candidate = parent,
                _ => return Err(RegistryError::UnsupportedDomain(host)),
            }
        }
    }

    pub fn is_supported(&self, url: &str) -> bool {
        self.resolve(url).is_ok()
    }

    pub fn by_name(&self, name: &str) -> Option<Arc<dyn SiteAdapter>> {
        self.adapters
            .iter()
            .find(|a| a.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    pub fn adapters(&self) -> &[Arc<dyn SiteAdapter>] {
        &self.adapters
    }

    pub fn names(&self) -> Vec<String> {
        self.adapters.iter().map(|a| a.name().to_string()).collect()
    }

    pub fn sites(&self) -> Vec<SiteInfo> {
        self.adapters
            .iter()
            .map(|a| SiteInfo {
                name: a.name().to_string(),
                domains: a.domains().to_vec(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
