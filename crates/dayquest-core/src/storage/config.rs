//! TOML-based application configuration.
//!
//! Stores:
//! - Energy economy tuning (gate threshold, reward band, candidate count)
//! - Timing of fades, save-status decay and the echo window
//! - Sync settings (echo policy, shared remote directory, group key)
//! - Project id and optional catalog path
//!
//! Configuration is stored at `~/.config/dayquest/config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::energizer::EnergySettings;
use crate::error::ConfigError;
use crate::progress::MAX_ENERGY;
use crate::sync::{EchoPolicy, SyncSettings};

/// Energy economy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnergyConfig {
    #[serde(default = "default_low_threshold")]
    pub low_threshold: u32,
    #[serde(default = "default_reward_min")]
    pub reward_min: u32,
    #[serde(default = "default_reward_max")]
    pub reward_max: u32,
    #[serde(default = "default_candidates")]
    pub candidates: usize,
}

/// Timing configuration, all in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_fade_ms")]
    pub fade_ms: u64,
    #[serde(default = "default_status_decay_ms")]
    pub status_decay_ms: u64,
    #[serde(default = "default_echo_window_ms")]
    pub echo_window_ms: u64,
}

/// Remote sync configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub echo_policy: EchoPolicy,
    /// Shared directory used by the file-based remote store.
    #[serde(default)]
    pub remote_dir: Option<String>,
    /// Group ("class") whose shared record this device follows.
    #[serde(default)]
    pub group_key: Option<String>,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/dayquest/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Namespaces the local snapshot.
    #[serde(default)]
    pub project_id: Option<String>,
    /// Content catalog file (TOML or JSON). The built-in catalog is used
    /// when unset.
    #[serde(default)]
    pub catalog_path: Option<String>,
    #[serde(default)]
    pub energy: EnergyConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

fn default_low_threshold() -> u32 {
    20
}
fn default_reward_min() -> u32 {
    20
}
fn default_reward_max() -> u32 {
    40
}
fn default_candidates() -> usize {
    3
}
fn default_fade_ms() -> u64 {
    300
}
fn default_status_decay_ms() -> u64 {
    3000
}
fn default_echo_window_ms() -> u64 {
    100
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            low_threshold: default_low_threshold(),
            reward_min: default_reward_min(),
            reward_max: default_reward_max(),
            candidates: default_candidates(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            fade_ms: default_fade_ms(),
            status_decay_ms: default_status_decay_ms(),
            echo_window_ms: default_echo_window_ms(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            echo_policy: EchoPolicy::default(),
            remote_dir: None,
            group_key: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_id: None,
            catalog_path: None,
            energy: EnergyConfig::default(),
            timing: TimingConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().map_or(true, |p| p.is_empty()) {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|e| invalid(e.to_string()))?,
                    ),
                    serde_json::Value::Number(_) => {
                        let n = value
                            .parse::<u64>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?;
                        serde_json::Value::Number(n.into())
                    }
                    serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    // Optional strings: an empty value clears them.
                    serde_json::Value::Null | serde_json::Value::String(_) if value.is_empty() => {
                        serde_json::Value::Null
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults there if it is missing.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content)?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Reject combinations the engines cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let energy = &self.energy;
        if energy.reward_min > energy.reward_max {
            return Err(ConfigError::InvalidValue {
                key: "energy.reward_min".into(),
                message: format!(
                    "reward_min ({}) exceeds reward_max ({})",
                    energy.reward_min, energy.reward_max
                ),
            });
        }
        if energy.low_threshold > MAX_ENERGY {
            return Err(ConfigError::InvalidValue {
                key: "energy.low_threshold".into(),
                message: format!("must be at most {MAX_ENERGY}"),
            });
        }
        if energy.candidates == 0 {
            return Err(ConfigError::InvalidValue {
                key: "energy.candidates".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => Some(String::new()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed, or
    /// the resulting configuration is invalid.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json =
            serde_json::to_value(&*self).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    pub fn energy_settings(&self) -> EnergySettings {
        EnergySettings {
            low_threshold: self.energy.low_threshold,
            reward_min: self.energy.reward_min,
            reward_max: self.energy.reward_max,
            candidates: self.energy.candidates,
        }
    }

    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            echo_policy: self.sync.echo_policy,
            echo_window_ms: self.timing.echo_window_ms,
            status_decay_ms: self.timing.status_decay_ms,
        }
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}
