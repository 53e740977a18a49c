use crate::resolver::ResolverSettings;
use crate::ui::StatusUI;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,
    #[error("Failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub resolver: ResolverConfig,
    pub pipeline: PipelineConfig,
    pub styles: StyleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Provider results at or above this confidence are accepted outright.
    pub accept_confidence: f32,
    /// Minimum self-reported confidence for an oracle guess.
    pub oracle_confidence: f32,
    pub provider_timeout_secs: u64,
    /// Wall-clock budget for one whole provider fan-out.
    pub resolve_timeout_secs: u64,
    pub provider_workers: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        ResolverConfig {
            accept_confidence: 0.6,
            oracle_confidence: 0.5,
            provider_timeout_secs: 5,
            resolve_timeout_secs: 12,
            provider_workers: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Concurrent note lookups in the parallel phase.
    pub note_workers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig { note_workers: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleConfig {
    pub notes: String,
    pub references: String,
}

impl Default for StyleConfig {
    fn default() -> Self {
        StyleConfig {
            notes: "Chicago Manual of Style".to_string(),
            references: "APA (7th ed.)".to_string(),
        }
    }
}

impl Config {
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(dirs::config_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join("recite")
            .join("config.toml"))
    }

    /// Load the config file, falling back to defaults when none exists.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(Config::default());
        }
        let contents = fs::read_to_string(&path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Write the current defaults so they can be edited.
    pub fn init() -> Result<Self, ConfigError> {
        let config = Config::default();
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml::to_string_pretty(&config)?)?;
        StatusUI::success(&format!("Config saved to: {}", path.display()));
        Ok(config)
    }

    pub fn resolver_settings(&self) -> ResolverSettings {
        ResolverSettings {
            accept_confidence: self.resolver.accept_confidence,
            oracle_confidence: self.resolver.oracle_confidence,
            provider_timeout: Duration::from_secs(self.resolver.provider_timeout_secs),
            overall_timeout: Duration::from_secs(self.resolver.resolve_timeout_secs),
            workers: self.resolver.provider_workers,
        }
    }
}
