use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_limit")]
    pub limit: u64,
    #[serde(default)]
    pub score_threshold: Option<f64>,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_stale_time_secs")]
    pub stale_time_secs: u64,
    #[serde(default)]
    pub refetch_on_focus: bool,
    /// Maximum number of request keys kept in the query cache.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            score_threshold: None,
            debounce_ms: default_debounce_ms(),
            stale_time_secs: default_stale_time_secs(),
            refetch_on_focus: false,
            cache_capacity: default_cache_capacity(),
        }
    }
}

fn default_limit() -> u64 {
    10
}
fn default_debounce_ms() -> u64 {
    300
}
fn default_stale_time_secs() -> u64 {
    60
}
fn default_cache_capacity() -> usize {
    crate::cache::DEFAULT_CAPACITY
}

impl SearchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn stale_time(&self) -> Duration {
        Duration::from_secs(self.stale_time_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Config {
    /// Defaults for everything but the API location. Used when no config
    /// file exists.
    pub fn minimal(base_url: impl Into<String>) -> Self {
        Self {
            api: ApiConfig {
                base_url: base_url.into(),
                timeout_secs: default_timeout_secs(),
                user_agent: None,
            },
            search: SearchConfig::default(),
            log: LogConfig::default(),
        }
    }

    /// `{base_url}/search/`, tolerating a trailing slash on the base.
    pub fn search_endpoint(&self) -> String {
        format!("{}/search/", self.api.base_url.trim_end_matches('/'))
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;

    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    let base = url::Url::parse(&config.api.base_url)
        .with_context(|| format!("api.base_url is not a valid URL: {}", config.api.base_url))?;
    match base.scheme() {
        "http" | "https" => {}
        other => anyhow::bail!("api.base_url must be http or https, got '{}'", other),
    }

    if config.api.timeout_secs == 0 {
        anyhow::bail!("api.timeout_secs must be > 0");
    }

    if config.search.limit < 1 {
        anyhow::bail!("search.limit must be >= 1");
    }
    if config.search.cache_capacity < 1 {
        anyhow::bail!("search.cache_capacity must be >= 1");
    }

    if let Some(threshold) = config.search.score_threshold {
        if !(0.0..=1.0).contains(&threshold) {
            anyhow::bail!("search.score_threshold must be in [0.0, 1.0]");
        }
    }

    Ok(())
}
