//! Configuration management for recetario using the prefer crate.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::scrapers::{BrowserEngineConfig, Language, RetryPolicy, SiteConfig};
use crate::services::{RunnerConfig, SearchConfig};

/// Default database filename.
pub const DEFAULT_DATABASE_FILENAME: &str = "recetario.db";

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Database filename, relative to `data_dir` unless absolute.
    pub database_filename: String,
    /// User agent, `"impersonate"` for a browser one, `None` for the default.
    pub user_agent: Option<String>,
    /// Per-request timeout in seconds.
    pub request_timeout: u64,
    /// Base delay between requests to one host in milliseconds.
    pub request_delay_ms: u64,
    pub max_retries: u32,
    /// Linear backoff unit between retries in milliseconds.
    pub retry_backoff_ms: u64,
    /// Sites scraped at once by parallel jobs.
    pub max_parallel_sites: usize,
    /// Pause between sites in sequential jobs, in milliseconds.
    pub sequential_site_delay_ms: u64,
    /// Records detected in another language are discarded. `None` keeps all.
    pub language: Option<Language>,
    /// Seconds a delivered job result is kept.
    pub job_ttl_secs: u64,
    pub proxies: Vec<String>,
    pub browser: BrowserEngineConfig,
}

impl Default for Settings {
    fn default() -> Self {
        // ~/Documents/recetario, falling back to home, then the current dir
        let data_dir = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("recetario");

        Self {
            data_dir,
            database_filename: DEFAULT_DATABASE_FILENAME.to_string(),
            user_agent: None,
            request_timeout: 30,
            request_delay_ms: 2000,
            max_retries: 2,
            retry_backoff_ms: 1000,
            max_parallel_sites: 3,
            sequential_site_delay_ms: 3000,
            language: Some(Language::Spanish),
            job_ttl_secs: 3600,
            proxies: Vec::new(),
            browser: BrowserEngineConfig::default().with_env_overrides(),
        }
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            ..Default::default()
        }
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_filename)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            timeout: self.request_timeout(),
            max_retries: self.max_retries,
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }

    pub fn search_config(&self) -> SearchConfig {
        SearchConfig {
            runner: RunnerConfig {
                retry: self.retry_policy(),
                language: self.language,
                max_parallel_sites: self.max_parallel_sites.max(1),
                sequential_site_delay: Duration::from_millis(self.sequential_site_delay_ms),
            },
            job_ttl: Duration::from_secs(self.job_ttl_secs),
        }
    }

    /// Apply environment overrides. These take precedence over the file.
    pub fn apply_env(&mut self) {
        if let Some(db) = env_var("RECETARIO_DATABASE") {
            tracing::debug!("Using RECETARIO_DATABASE from environment: {}", db);
            self.database_filename = db;
        }
        // milliseconds; the per-request timeout is kept in whole seconds
        if let Some(ms) = env_var("SCRAPER_TIMEOUT").and_then(|v| v.parse::<u64>().ok()) {
            self.request_timeout = ms.div_ceil(1000).max(1);
        }
        if let Some(secs) = env_var("RATE_LIMIT_DELAY").and_then(|v| v.parse::<f64>().ok()) {
            if secs.is_finite() && secs >= 0.0 {
                self.request_delay_ms = (secs * 1000.0).round() as u64;
            }
        }
        self.browser = self.browser.clone().with_env_overrides();
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data directory path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Database filename or path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_backoff_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_parallel_sites: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequential_site_delay_ms: Option<u64>,
    /// Language code records must be in, or `"any"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_ttl_secs: Option<u64>,
    /// Proxy urls rotated across requests.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub proxies: Vec<String>,
    /// File with one proxy url per line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_file: Option<String>,
    #[serde(default, skip_serializing_if = "BrowserEngineConfig::is_default")]
    pub browser: BrowserEngineConfig,
    /// Extra selector-driven sites, keyed by display name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sites: BTreeMap<String, SiteConfig>,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer for discovery.
    ///
    /// Falls back to defaults when no file is found or it does not parse.
    pub async fn load() -> Self {
        match prefer::load("recetario").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => match Self::load_from_path(path).await {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::warn!("{}", e);
                        Self::default()
                    }
                },
                None => Self::default(),
            },
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path, by extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config = Self::parse(&contents, ext)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn parse(contents: &str, ext: &str) -> Result<Self, String> {
        match ext {
            "toml" => toml::from_str(contents).map_err(|e| format!("Failed to parse TOML config: {}", e)),
            "yaml" | "yml" => {
                serde_yaml::from_str(contents).map_err(|e| format!("Failed to parse YAML config: {}", e))
            }
            _ => serde_json::from_str(contents).map_err(|e| format!("Failed to parse JSON config: {}", e)),
        }
    }

    /// The config file's directory, for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Absolute, `~`-prefixed or relative to `base_dir`.
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        if let Some(rest) = path_str.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        let path = Path::new(path_str);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = self.resolve_path(data_dir, base_dir);
        }
        if let Some(ref database) = self.database {
            settings.database_filename = database.clone();
        }
        if let Some(ref user_agent) = self.user_agent {
            settings.user_agent = Some(user_agent.clone());
        }
        if let Some(timeout) = self.request_timeout {
            settings.request_timeout = timeout;
        }
        if let Some(delay) = self.request_delay_ms {
            settings.request_delay_ms = delay;
        }
        if let Some(retries) = self.max_retries {
            settings.max_retries = retries;
        }
        if let Some(backoff) = self.retry_backoff_ms {
            settings.retry_backoff_ms = backoff;
        }
        if let Some(parallel) = self.max_parallel_sites {
            settings.max_parallel_sites = parallel;
        }
        if let Some(delay) = self.sequential_site_delay_ms {
            settings.sequential_site_delay_ms = delay;
        }
        if let Some(ref language) = self.language {
            settings.language = Language::from_str(language);
            if settings.language.is_none() && language != "any" {
                tracing::warn!("Unknown language {:?}, language filter disabled", language);
            }
        }
        if let Some(ttl) = self.job_ttl_secs {
            settings.job_ttl_secs = ttl;
        }
        settings.proxies.extend(self.proxies.iter().cloned());
        if let Some(ref file) = self.proxy_file {
            let path = self.resolve_path(file, base_dir);
            match std::fs::read_to_string(&path) {
                Ok(contents) => settings.proxies.extend(
                    contents
                        .lines()
                        .map(str::trim)
                        .filter(|l| !l.is_empty() && !l.starts_with('#'))
                        .map(str::to_string),
                ),
                Err(e) => tracing::warn!("Cannot read proxy file {}: {}", path.display(), e),
            }
        }
        if !self.browser.is_default() {
            settings.browser = self.browser.clone();
        }
    }
}

/// Options from the command line that affect loading.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (skips discovery).
    pub config_path: Option<PathBuf>,
}

/// Resolve settings from the config file and the environment.
pub async fn load_settings(options: &LoadOptions) -> anyhow::Result<(Settings, Config)> {
    let config = match options.config_path {
        Some(ref path) => Config::load_from_path(path).await.map_err(anyhow::Error::msg)?,
        None => Config::load().await,
    };

    let base_dir = config
        .base_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let mut settings = Settings::default();
    config.apply_to_settings(&mut settings, &base_dir);
    settings.apply_env();
    Ok((settings, config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert!(settings.data_dir.ends_with("recetario"));
        assert!(settings.database_path().ends_with("recetario/recetario.db"));
        assert_eq!(settings.request_timeout, 30);
        assert_eq!(settings.max_parallel_sites, 3);
        assert_eq!(settings.language, Some(Language::Spanish));

        let search = settings.search_config();
        assert_eq!(search.runner.retry.max_retries, 2);
        assert_eq!(search.runner.retry.backoff, Duration::from_millis(1000));
        assert_eq!(search.runner.sequential_site_delay, Duration::from_secs(3));
        assert_eq!(search.job_ttl, Duration::from_secs(3600));
    }

    #[test]
    fn test_parse_toml_with_sites() {
        let config = Config::parse(
            r#"
            database = "recetas.db"
            request_timeout = 10
            max_parallel_sites = 5
            language = "any"
            proxies = ["http://127.0.0.1:8080"]

            [browser]
            enabled = true

            [sites."Cocina Fácil"]
            domains = ["cocinafacil.com.ar"]

            [sites."Cocina Fácil".selectors]
            title = ["h1"]
            ingredients = [".ingredientes li"]
            "#,
            "toml",
        )
        .unwrap();

        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings, Path::new("/etc/recetario"));
        assert_eq!(settings.database_filename, "recetas.db");
        assert_eq!(settings.request_timeout, 10);
        assert_eq!(settings.max_parallel_sites, 5);
        assert_eq!(settings.language, None);
        assert_eq!(settings.proxies.len(), 1);
        assert!(settings.browser.enabled);
        assert_eq!(config.sites["Cocina Fácil"].selectors.title, vec!["h1".to_string()]);
        // unset values keep their defaults
        assert_eq!(settings.max_retries, 2);
    }

    #[test]
    fn test_parse_yaml_and_json() {
        let yaml = Config::parse("request_delay_ms: 500\nlanguage: en\n", "yml").unwrap();
        assert_eq!(yaml.request_delay_ms, Some(500));
        let mut settings = Settings::default();
        yaml.apply_to_settings(&mut settings, Path::new("."));
        assert_eq!(settings.language, Some(Language::English));

        let json = Config::parse(r#"{"job_ttl_secs": 60}"#, "json").unwrap();
        assert_eq!(json.job_ttl_secs, Some(60));

        assert!(Config::parse("request_timeout = \"x\"", "toml").is_err());
    }

    #[test]
    fn test_relative_paths_resolve_against_config_dir() {
        let config = Config {
            data_dir: Some("datos".to_string()),
            ..Default::default()
        };
        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings, Path::new("/srv/recetario"));
        assert_eq!(settings.data_dir, PathBuf::from("/srv/recetario/datos"));
    }

    #[test]
    fn test_serialization_skips_unset_fields() {
        let json = serde_json::to_value(Config::default()).unwrap();
        assert_eq!(json, serde_json::json!({}));
    }
}
