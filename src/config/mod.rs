//! Configuration system for Perch

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Global application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub sampling: SamplingConfig,
    pub display: DisplayConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.sampling.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("perch").join("config.toml"))
    }
}

/// Sampling cadence knobs. Tunable defaults, not correctness properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    pub refresh_interval_ms: u64,
    pub adapter_timeout_ms: u64,
    /// Consecutive transient failures (K) after which a field shows as unavailable
    /// instead of its last good value
    pub transient_failure_threshold: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 1000,
            adapter_timeout_ms: 750,
            transient_failure_threshold: 3,
        }
    }
}

impl SamplingConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn adapter_timeout(&self) -> Duration {
        Duration::from_millis(self.adapter_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.refresh_interval_ms == 0 {
            anyhow::bail!("sampling.refresh_interval_ms must be greater than zero");
        }
        if self.adapter_timeout_ms == 0 {
            anyhow::bail!("sampling.adapter_timeout_ms must be greater than zero");
        }
        if self.transient_failure_threshold == 0 {
            anyhow::bail!("sampling.transient_failure_threshold must be at least 1");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub theme: String,
    /// Hide cards for hardware this machine does not have (battery, GPU)
    pub hide_unavailable: bool,
    pub render_interval_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            theme: "midnight".to_string(),
            hide_unavailable: true,
            render_interval_ms: 250,
        }
    }
}

/// Write a default configuration file
pub fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Configuration already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    Config::default().save(path)?;
    println!("Created {}", path.display());
    Ok(())
}
