use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::layout::config::FittingConfig;

const DEFAULT_PAGE_TIMEOUT_MS: u64 = 30_000;

/// Engine-level settings: fitting parameters plus the page worker pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub fitting: FittingConfig,
    /// Pages processed in parallel.
    pub worker_concurrency: usize,
    /// Wall-clock ceiling per page; a page over it is returned unmodified.
    pub page_timeout_ms: u64,
    /// Fail the whole job when any conflict is left unresolved.
    pub strict: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fitting: FittingConfig::default(),
            worker_concurrency: default_workers(),
            page_timeout_ms: DEFAULT_PAGE_TIMEOUT_MS,
            strict: false,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_concurrency == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        self.fitting.validate()
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Application configuration loaded from environment variables.
/// Every variable is optional; unset ones fall back to the engine defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub engine: EngineConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let defaults = EngineConfig::default();
        let fitting = FittingConfig {
            max_layout_adjustment: env_or(
                "LAYOUT_MAX_ADJUSTMENT",
                defaults.fitting.max_layout_adjustment,
            )?,
            min_font_scale: env_or("LAYOUT_MIN_FONT_SCALE", defaults.fitting.min_font_scale)?,
            length_ratio_slack: env_or("LAYOUT_LENGTH_SLACK", defaults.fitting.length_ratio_slack)?,
            max_resolution_passes: env_or(
                "LAYOUT_MAX_PASSES",
                defaults.fitting.max_resolution_passes,
            )?,
            overlap_epsilon: env_or("LAYOUT_OVERLAP_EPSILON", defaults.fitting.overlap_epsilon)?,
            ..defaults.fitting.clone()
        };
        let engine = EngineConfig {
            fitting,
            worker_concurrency: env_or("LAYOUT_WORKERS", defaults.worker_concurrency)?,
            page_timeout_ms: env_or("LAYOUT_PAGE_TIMEOUT_MS", defaults.page_timeout_ms)?,
            strict: env_or("LAYOUT_STRICT", defaults.strict)?,
        };
        engine
            .validate()
            .context("Invalid layout engine configuration")?;

        Ok(Config {
            port: env_or("PORT", 8080u16).context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            engine,
        })
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has invalid value '{raw}'")),
        Err(_) => Ok(default),
    }
}
