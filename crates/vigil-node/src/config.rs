use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};
use vigil_protocol::{ProtocolConfig, SelectionPolicy};
use vigil_types::Timestamp;

pub const DEFAULT_CONFIG_FILE: &str = "vigil.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub protocol: ProtocolConfig,
    pub logging: LoggingConfig,
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty`, `compact` or `json`
    pub format: String,
    pub module_filters: BTreeMap<String, String>,
    pub file_output: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            module_filters: BTreeMap::new(),
            file_output: None,
        }
    }
}

/// Inputs for in-memory scripted runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Published phrase the panel beacon is seeded from
    pub beacon_seed: String,
    pub start_time: Timestamp,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            beacon_seed: "vigil-genesis".to_string(),
            start_time: 1_700_000_000,
        }
    }
}

impl NodeConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Explicit path, else `./vigil.toml` when present, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = env::var("VIGIL_LOG_LEVEL") {
            if !level.is_empty() {
                self.logging.level = level;
            }
        }
        if let Ok(format) = env::var("VIGIL_LOG_FORMAT") {
            if !format.is_empty() {
                self.logging.format = format;
            }
        }
        if let Ok(seed) = env::var("VIGIL_BEACON_SEED") {
            if !seed.is_empty() {
                self.simulation.beacon_seed = seed;
            }
        }
        if let Ok(start) = env::var("VIGIL_START_TIME") {
            if let Ok(val) = start.parse() {
                self.simulation.start_time = val;
            }
        }

        // Protocol parameters (optional overrides)
        if let Ok(window) = env::var("VIGIL_DISPUTE_WINDOW_SECS") {
            if let Ok(val) = window.parse() {
                self.protocol.escrow.dispute_window = val;
            }
        }
        if let Ok(size) = env::var("VIGIL_PANEL_SIZE") {
            if let Ok(val) = size.parse() {
                self.protocol.committee.panel_size = val;
            }
        }
        if let Ok(fee) = env::var("VIGIL_PLATFORM_FEE_BPS") {
            if let Ok(val) = fee.parse() {
                self.protocol.factory.platform_fee_bps = val;
            }
        }
        if let Ok(policy) = env::var("VIGIL_SELECTION_POLICY") {
            match policy.as_str() {
                "round_robin" => {
                    self.protocol.factory.selection_policy = SelectionPolicy::RoundRobin
                }
                "highest_stake" => {
                    self.protocol.factory.selection_policy = SelectionPolicy::HighestStake
                }
                _ => {}
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.protocol
            .validate()
            .context("invalid protocol configuration")?;
        if !matches!(self.logging.format.as_str(), "pretty" | "compact" | "json") {
            anyhow::bail!("unknown log format '{}'", self.logging.format);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_overrides() {
        env::set_var("VIGIL_LOG_LEVEL", "debug");
        env::set_var("VIGIL_BEACON_SEED", "override-seed");
        env::set_var("VIGIL_START_TIME", "42");
        env::set_var("VIGIL_PANEL_SIZE", "5");
        env::set_var("VIGIL_SELECTION_POLICY", "highest_stake");

        let mut config = NodeConfig::default();
        config.apply_env_overrides();

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.simulation.beacon_seed, "override-seed");
        assert_eq!(config.simulation.start_time, 42);
        assert_eq!(config.protocol.committee.panel_size, 5);
        assert_eq!(
            config.protocol.factory.selection_policy,
            SelectionPolicy::HighestStake
        );

        env::remove_var("VIGIL_LOG_LEVEL");
        env::remove_var("VIGIL_BEACON_SEED");
        env::remove_var("VIGIL_START_TIME");
        env::remove_var("VIGIL_PANEL_SIZE");
        env::remove_var("VIGIL_SELECTION_POLICY");
    }

    #[test]
    fn test_default_config_validates() {
        NodeConfig::default().validate().unwrap();

        let mut config = NodeConfig::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }
}
