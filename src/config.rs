use std::path::{Path, PathBuf};
use std::fs;
use std::time::Duration;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{ProbeError, Result};

pub const DEFAULT_COUNT: u32 = 4;
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;
pub const MAX_HISTORY: usize = 200;
/// Upper bound accepted for `history_capacity` from a config file.
pub const HISTORY_CAPACITY_LIMIT: usize = 100_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub default_count: u32,
    pub default_timeout_ms: u64,
    pub history_capacity: usize,
    pub dns_ttl_secs: u64,
    /// Name or path of the system probing utility.
    pub utility: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_count: DEFAULT_COUNT,
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            history_capacity: MAX_HISTORY,
            dns_ttl_secs: 60,
            utility: "ping".to_string(),
        }
    }
}

impl AppConfig {
    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ProbeError::Config("could not find config directory".into()))?
            .join("PingProbe");
        Ok(config_dir.join("config.json"))
    }

    /// Loads the user config, falling back to defaults on any problem.
    pub fn load() -> Self {
        match Self::get_config_path() {
            Ok(path) => Self::load_from(&path),
            Err(e) => {
                warn!("{e}; using default configuration");
                AppConfig::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return AppConfig::default();
        }
        let parsed = fs::read_to_string(path)
            .map_err(ProbeError::from)
            .and_then(|content| serde_json::from_str::<AppConfig>(&content).map_err(ProbeError::from));
        match parsed {
            Ok(config) => config.sanitized(),
            Err(e) => {
                warn!("Failed to load config from {}: {e}", path.display());
                AppConfig::default()
            }
        }
    }

    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::get_config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn dns_ttl(&self) -> Duration {
        Duration::from_secs(self.dns_ttl_secs)
    }

    // Zero counts or timeouts in a hand-edited file would make every request
    // invalid; an absurd history capacity would exhaust memory.
    fn sanitized(mut self) -> Self {
        let defaults = AppConfig::default();
        if self.default_count == 0 {
            self.default_count = defaults.default_count;
        }
        if self.default_timeout_ms == 0 {
            self.default_timeout_ms = defaults.default_timeout_ms;
        }
        if self.history_capacity == 0 || self.history_capacity > HISTORY_CAPACITY_LIMIT {
            self.history_capacity = defaults.history_capacity;
        }
        if self.utility.trim().is_empty() {
            self.utility = defaults.utility;
        }
        self
    }
}
