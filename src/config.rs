//! User configuration, loaded from a YAML file in the user's config
//! directory.
//!
//! Values are addressable with dotted keys (e.g. `core.location`,
//! `dmv.api_key`) for the `config get`/`config set` commands. Everything else
//! in the crate reads typed fields off the deserialized [`Config`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::TransitError;

pub const DEFAULT_WATCH_INTERVAL: u64 = 10;
pub const DEFAULT_MAX_STATION_MATCHES: usize = 5;

/// Options for a per-agency section of the config file (`dmv`, `sf`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgencyConfig {
    pub api_key: String,
}

/// Options for the `core` section of the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Active location slug (e.g. "dmv", "sf").
    pub location: String,
    /// Seconds between refreshes in watch mode.
    pub watch_interval: u64,
    /// Fuzzy matches beyond this count are treated as too ambiguous.
    pub max_station_matches: usize,
    pub verbose: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            location: String::new(),
            watch_interval: DEFAULT_WATCH_INTERVAL,
            max_station_matches: DEFAULT_MAX_STATION_MATCHES,
            verbose: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub core: CoreConfig,
    pub dmv: AgencyConfig,
    pub sf: AgencyConfig,
}

impl Config {
    /// Reads the config file at `path`, creating an empty one (and its parent
    /// directories) if it does not exist yet.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create config directory {parent:?}"))?;
            }
            fs::write(path, b"")
                .with_context(|| format!("failed to create config file {path:?}"))?;
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {path:?}"))?;

        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse config file {path:?}"))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_yaml::to_string(self).context("failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("failed to write config file {path:?}"))
    }

    /// Looks up a value by dotted key. Returns `None` for unknown keys.
    pub fn get_value(&self, key: &str) -> Option<String> {
        let root = serde_yaml::to_value(self).ok()?;
        let mut current = &root;
        for part in key.split('.') {
            current = current.get(part)?;
        }

        match current {
            serde_yaml::Value::String(s) => Some(s.clone()),
            serde_yaml::Value::Bool(b) => Some(b.to_string()),
            serde_yaml::Value::Number(n) => Some(n.to_string()),
            serde_yaml::Value::Null => Some(String::new()),
            _ => None,
        }
    }

    /// Sets a value by dotted key, re-deserializing to keep typed fields in
    /// sync. Unknown keys or type mismatches surface as errors.
    pub fn set_value(&mut self, key: &str, raw: &str) -> Result<()> {
        let mut root = serde_yaml::to_value(&*self).context("failed to serialize config")?;

        let mut current = &mut root;
        let parts: Vec<&str> = key.split('.').collect();
        let (last, path) = parts
            .split_last()
            .ok_or_else(|| TransitError::Config("empty config key".into()))?;

        for part in path {
            current = current
                .get_mut(*part)
                .ok_or_else(|| TransitError::Config(format!("unknown config key '{key}'")))?;
        }

        let mapping = current
            .as_mapping_mut()
            .ok_or_else(|| TransitError::Config(format!("unknown config key '{key}'")))?;
        let entry = serde_yaml::Value::String((*last).to_string());
        if !mapping.contains_key(&entry) {
            return Err(TransitError::Config(format!("unknown config key '{key}'")).into());
        }
        mapping.insert(entry, yaml_scalar(raw));

        *self = serde_yaml::from_value(root)
            .with_context(|| format!("invalid value for config key '{key}'"))?;
        Ok(())
    }
}

/// Parses a raw CLI string into the most specific YAML scalar.
fn yaml_scalar(raw: &str) -> serde_yaml::Value {
    if let Ok(b) = raw.parse::<bool>() {
        return serde_yaml::Value::Bool(b);
    }
    if let Ok(n) = raw.parse::<i64>() {
        return serde_yaml::Value::Number(n.into());
    }
    serde_yaml::Value::String(raw.to_string())
}

/// Directory holding the config file and the local database.
pub fn config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir()
        .ok_or_else(|| TransitError::Config("could not determine the user config directory".into()))?;
    Ok(base.join("transit"))
}

pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.yml"))
}

pub fn database_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("transit.db"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.core.watch_interval, DEFAULT_WATCH_INTERVAL);
        assert_eq!(config.core.max_station_matches, DEFAULT_MAX_STATION_MATCHES);
        assert!(!config.core.verbose);
        assert!(config.core.location.is_empty());
    }

    #[test]
    fn test_load_missing_file_creates_empty_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.yml");

        let config = Config::load(&path).unwrap();
        assert!(path.exists());
        assert!(config.core.location.is_empty());
    }

    #[test]
    fn test_load_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, "core:\n  location: dmv\ndmv:\n  api_key: abc123\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.core.location, "dmv");
        assert_eq!(config.dmv.api_key, "abc123");
        assert_eq!(config.core.watch_interval, DEFAULT_WATCH_INTERVAL);
    }

    #[test]
    fn test_get_value_dotted_keys() {
        let mut config = Config::default();
        config.core.location = "sf".to_string();
        config.sf.api_key = "secret".to_string();

        assert_eq!(config.get_value("core.location").as_deref(), Some("sf"));
        assert_eq!(config.get_value("sf.api_key").as_deref(), Some("secret"));
        assert_eq!(config.get_value("core.watch_interval").as_deref(), Some("10"));
        assert_eq!(config.get_value("core.verbose").as_deref(), Some("false"));
        assert_eq!(config.get_value("core.nope"), None);
        assert_eq!(config.get_value("nope.nope"), None);
    }

    #[test]
    fn test_set_value_round_trip() {
        let mut config = Config::default();

        config.set_value("core.location", "dmv").unwrap();
        assert_eq!(config.core.location, "dmv");

        config.set_value("core.watch_interval", "30").unwrap();
        assert_eq!(config.core.watch_interval, 30);

        config.set_value("core.verbose", "true").unwrap();
        assert!(config.core.verbose);

        config.set_value("dmv.api_key", "abc").unwrap();
        assert_eq!(config.dmv.api_key, "abc");
    }

    #[test]
    fn test_set_value_unknown_key_errors() {
        let mut config = Config::default();
        assert!(config.set_value("core.bogus", "1").is_err());
        assert!(config.set_value("bogus.api_key", "1").is_err());
        assert!(config.set_value("", "1").is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");

        let mut config = Config::default();
        config.set_value("core.location", "sf").unwrap();
        config.set_value("sf.api_key", "key-123").unwrap();
        config.save(&path).unwrap();

        let reloaded = Config::load(&path).unwrap();
        assert_eq!(reloaded.core.location, "sf");
        assert_eq!(reloaded.sf.api_key, "key-123");
    }
}
