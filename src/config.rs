use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub fetch: FetchConfig,
    pub extract: ExtractConfig,
}

/// Tuning for the paginated review fetcher
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Attempts per page before the session fails
    pub max_retries: u32,
    /// First backoff delay; doubles per attempt
    pub backoff_base_ms: u64,
    /// Upper bound on any single backoff sleep
    pub backoff_cap_ms: u64,
    /// Random jitter added on top of each backoff sleep
    pub backoff_jitter_ms: u64,
    /// Items requested per page (the source caps this at 100)
    pub page_size: u32,
    /// Pause between successful pages
    pub page_delay_ms: u64,
    /// HTTP request timeout
    pub request_timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_base_ms: 500,
            backoff_cap_ms: 15_000,
            backoff_jitter_ms: 300,
            page_size: 100,
            page_delay_ms: 500,
            request_timeout_secs: 20,
        }
    }
}

/// Tuning for the extraction worker pool
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Local model name passed to the worker command
    pub model: String,
    /// Concurrent in-flight worker invocations
    pub concurrency: usize,
    /// Wall-clock budget per review, including process startup
    pub timeout_secs: u64,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            model: "analyst".to_string(),
            concurrency: 6,
            timeout_secs: 90,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        info!(path = %path.display(), "Loaded configuration");

        Ok(config)
    }

    /// Load configuration from the default location (.review-miner/config.yml)
    pub fn load_default() -> Result<Self> {
        Self::load(".review-miner/config.yml")
    }
}
