//! Runtime configuration
//!
//! Layers, lowest priority first:
//! 1. Embedded defaults
//! 2. TOML file (explicit path, or `<data dir>/tally/config.toml` if present)
//! 3. Environment: `TALLY_DB`, `TALLY_TICK_HOUR`

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

pub const ENV_DB: &str = "TALLY_DB";
pub const ENV_TICK_HOUR: &str = "TALLY_TICK_HOUR";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    /// SQLite database file
    pub database_path: PathBuf,
    /// Local hour (0-23) at which the daily tick runs
    pub tick_hour: u32,
    /// Run one catch-up tick as soon as the daily loop starts
    pub run_on_start: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: data_dir().join("tally.db"),
            tick_hour: 0,
            run_on_start: true,
        }
    }
}

/// Base directory for the database and config file
pub fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("tally"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Default config file location
pub fn default_config_path() -> PathBuf {
    data_dir().join("config.toml")
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    database_path: Option<PathBuf>,
    tick_hour: Option<u32>,
    run_on_start: Option<bool>,
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit `path` must exist; the default location is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        let content = match path {
            Some(path) => Some(fs::read_to_string(path).map_err(|e| {
                Error::Config(format!("cannot read {}: {}", path.display(), e))
            })?),
            None => {
                let default_path = default_config_path();
                if default_path.exists() {
                    Some(fs::read_to_string(&default_path)?)
                } else {
                    None
                }
            }
        };

        if let Some(content) = content {
            config.apply_toml(&content)?;
        }
        config.apply_env(|key| std::env::var(key).ok())?;

        debug!(?config, "Configuration loaded");
        Ok(config)
    }

    /// Overlay values from a TOML document
    pub fn apply_toml(&mut self, content: &str) -> Result<()> {
        let raw: RawConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("invalid config TOML: {}", e)))?;

        if let Some(path) = raw.database_path {
            self.database_path = path;
        }
        if let Some(hour) = raw.tick_hour {
            self.tick_hour = validate_hour(hour)?;
        }
        if let Some(run_on_start) = raw.run_on_start {
            self.run_on_start = run_on_start;
        }
        Ok(())
    }

    /// Overlay values from environment variables, read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DB).filter(|v| !v.trim().is_empty()) {
            self.database_path = PathBuf::from(path);
        }
        if let Some(hour) = lookup(ENV_TICK_HOUR) {
            let hour: u32 = hour.trim().parse().map_err(|_| {
                Error::Config(format!("{} must be an hour between 0 and 23, got '{}'", ENV_TICK_HOUR, hour))
            })?;
            self.tick_hour = validate_hour(hour)?;
        }
        Ok(())
    }
}

fn validate_hour(hour: u32) -> Result<u32> {
    if hour > 23 {
        return Err(Error::Config(format!(
            "tick_hour must be between 0 and 23, got {}",
            hour
        )));
    }
    Ok(hour)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.tick_hour, 0);
        assert!(config.run_on_start);
        assert!(config.database_path.ends_with("tally.db"));
    }

    #[test]
    fn test_toml_overlay() {
        let mut config = Config::default();
        config
            .apply_toml(
                r#"
                database_path = "/tmp/ledger.db"
                tick_hour = 6
                "#,
            )
            .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/tmp/ledger.db"));
        assert_eq!(config.tick_hour, 6);
        assert!(config.run_on_start);
    }

    #[test]
    fn test_invalid_toml() {
        let mut config = Config::default();
        assert!(matches!(
            config.apply_toml("tick_hour = 24"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            config.apply_toml("unknown_key = true"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_env_overrides_file() {
        let env: HashMap<&str, &str> = [(ENV_DB, "/data/env.db"), (ENV_TICK_HOUR, "3")]
            .into_iter()
            .collect();

        let mut config = Config::default();
        config.apply_toml("tick_hour = 6").unwrap();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/data/env.db"));
        assert_eq!(config.tick_hour, 3);
    }

    #[test]
    fn test_env_rejects_bad_hour() {
        let mut config = Config::default();
        let err = config
            .apply_env(|key| (key == ENV_TICK_HOUR).then(|| "noon".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tally.toml");
        std::fs::write(&path, "run_on_start = false\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert!(!config.run_on_start);

        let missing = dir.path().join("missing.toml");
        assert!(matches!(Config::load(Some(&missing)), Err(Error::Config(_))));
    }
}
