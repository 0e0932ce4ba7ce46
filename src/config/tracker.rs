// src/config/tracker.rs
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CACHE_PATH: &str = "state/cache.json";
pub const DEFAULT_LOG_PATH: &str = "docs/data/metrics.jsonl";
pub const DEFAULT_LATEST_PATH: &str = "docs/data/latest.json";
pub const DEFAULT_USER_AGENT: &str = "eval-tracker/0.1";

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    /// Extra attempts after the first transport failure.
    pub max_retries: u8,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_retries: 2,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Where state lives and how pages are fetched.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub cache_path: PathBuf,
    pub log_path: PathBuf,
    pub latest_path: PathBuf,
    pub sources_path: Option<PathBuf>,
    pub metrics_path: Option<PathBuf>,
    pub fetch: FetchSettings,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            cache_path: PathBuf::from(DEFAULT_CACHE_PATH),
            log_path: PathBuf::from(DEFAULT_LOG_PATH),
            latest_path: PathBuf::from(DEFAULT_LATEST_PATH),
            sources_path: None,
            metrics_path: None,
            fetch: FetchSettings::default(),
        }
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl TrackerConfig {
    /// Defaults overridden by `TRACKER_*` env vars. Bad numbers fall back to defaults.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(p) = env_path("TRACKER_CACHE_PATH") {
            cfg.cache_path = p;
        }
        if let Some(p) = env_path("TRACKER_LOG_PATH") {
            cfg.log_path = p;
        }
        if let Some(p) = env_path("TRACKER_LATEST_PATH") {
            cfg.latest_path = p;
        }
        cfg.sources_path = env_path("TRACKER_SOURCES_PATH");
        cfg.metrics_path = env_path("TRACKER_METRICS_PATH");

        if let Some(secs) = env_parse::<u64>("TRACKER_FETCH_TIMEOUT_SECS").filter(|s| *s > 0) {
            cfg.fetch.timeout = Duration::from_secs(secs);
        }
        if let Some(r) = env_parse::<u8>("TRACKER_FETCH_RETRIES") {
            cfg.fetch.max_retries = r;
        }
        if let Ok(ua) = env::var("TRACKER_USER_AGENT") {
            if !ua.trim().is_empty() {
                cfg.fetch.user_agent = ua.trim().to_string();
            }
        }
        cfg
    }
}
