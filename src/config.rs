use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::sites::HostMatching;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Runtime settings, loaded from `config.toml` and then `BOORU_LIGHTBOX_*`
/// environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub user_agent: String,
    pub request_timeout_ms: u64,
    pub fetch_retries: u32,
    pub resolve_concurrency: usize,
    pub poll_interval_ms: u64,
    pub rescan_debounce_ms: u64,
    pub host_matching: HostMatching,
    pub disabled_adapters: BTreeSet<String>,
    /// Appended verbatim to Gelbooru API queries, e.g. `&api_key=..&user_id=..`.
    pub gelbooru_api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout_ms: 15_000,
            fetch_retries: 1,
            resolve_concurrency: 4,
            poll_interval_ms: 5_000,
            rescan_debounce_ms: 250,
            host_matching: HostMatching::default(),
            disabled_adapters: BTreeSet::new(),
            gelbooru_api_key: None,
        }
    }
}

impl Config {
    /// Load from `path`, or from the default location when `None`. A missing
    /// default file yields defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => match default_config_path() {
                Some(p) if p.exists() => Self::from_file(&p)?,
                _ => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config: {}", path.display()))
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(v) = var("BOORU_LIGHTBOX_USER_AGENT").filter(|s| !s.trim().is_empty()) {
            self.user_agent = v;
        }
        if let Some(v) = var("BOORU_LIGHTBOX_TIMEOUT_MS").and_then(|s| s.parse().ok()) {
            self.request_timeout_ms = v;
        }
        if let Some(v) = var("BOORU_LIGHTBOX_CONCURRENCY").and_then(|s| s.parse().ok()) {
            self.resolve_concurrency = v;
        }
        if let Some(v) = var("BOORU_LIGHTBOX_GELBOORU_API_KEY") {
            self.gelbooru_api_key = Some(v).filter(|s| !s.is_empty());
        }
    }

    fn validate(&self) -> Result<(), crate::Error> {
        if self.resolve_concurrency == 0 {
            return Err(crate::Error::Config("resolve_concurrency must be at least 1".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(crate::Error::Config("request_timeout_ms must be positive".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(crate::Error::Config("poll_interval_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn rescan_debounce(&self) -> Duration {
        Duration::from_millis(self.rescan_debounce_ms)
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("dev", "booru-lightbox", "booru-lightbox")?;
    Some(proj.config_dir().join("config.toml"))
}
