use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::DEFAULT_CONTEXT_LENGTH;
use crate::monitor::DEFAULT_POLL_INTERVAL;

/// Environment variable that overrides the configured context length.
pub const CONTEXT_LENGTH_ENV: &str = "AGENTFIT_CONTEXT_LENGTH";

const CONFIG_FILE: &str = "config.toml";

/// User defaults, read from `config.toml` in the platform config directory.
/// Every key is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub parallel_agents: f64,
    pub context_length: u32,
    pub poll_interval_ms: u64,
    /// Catalog JSON to use instead of the embedded one.
    pub catalog_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            parallel_agents: 1.0,
            context_length: DEFAULT_CONTEXT_LENGTH,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            catalog_path: None,
        }
    }
}

impl Config {
    /// `~/.config/agentfit/config.toml` on Linux, the equivalent elsewhere.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "agentfit", "agentfit")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    /// Load from the default location; a missing file yields defaults.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&text)?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.context_length == 0 {
            return Err(Error::Config("context_length must be positive".to_string()));
        }
        if !self.parallel_agents.is_finite() {
            return Err(Error::Config("parallel_agents must be a number".to_string()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// CLI value, then `AGENTFIT_CONTEXT_LENGTH`, then the config file.
    pub fn resolve_context_length(&self, cli: Option<u32>) -> u32 {
        if let Some(ctx) = cli {
            return ctx;
        }
        match std::env::var(CONTEXT_LENGTH_ENV) {
            Ok(raw) => parse_context_env(&raw).unwrap_or_else(|| {
                tracing::warn!(
                    "could not parse {CONTEXT_LENGTH_ENV}='{raw}', expected a positive integer"
                );
                self.context_length
            }),
            Err(_) => self.context_length,
        }
    }

    pub fn resolve_parallel_agents(&self, cli: Option<f64>) -> f64 {
        cli.unwrap_or(self.parallel_agents)
    }
}

pub fn parse_context_env(raw: &str) -> Option<u32> {
    match raw.trim().parse::<u32>() {
        Ok(v) if v > 0 => Some(v),
        _ => None,
    }
}
