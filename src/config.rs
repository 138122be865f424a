//! Persisted run configuration.
//!
//! One small JSON file in the working directory, created by the first-run
//! wizard and reloaded on later runs. The field names are the file format.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default config file name, resolved relative to the working directory.
pub const CONFIG_FILE: &str = "imgur-sweep.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path} is not a valid configuration file: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    pub username: String,
    pub storage_file: PathBuf,
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,
    #[serde(default = "default_max_items")]
    pub max_items: u32,
    #[serde(default)]
    pub headless: bool,
}

fn default_dry_run() -> bool {
    true
}

fn default_max_items() -> u32 {
    10
}

impl SweepConfig {
    /// Loads the saved configuration. A missing file is `Ok(None)`; an
    /// unreadable or malformed one is an error so callers can warn before
    /// falling back to the wizard.
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&raw).map_err(|source| ConfigError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Some(config))
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let rendered =
            serde_json::to_string_pretty(self).map_err(|source| ConfigError::Malformed {
                path: path.to_path_buf(),
                source,
            })?;
        fs::write(path, rendered).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Whether the record carries enough to run without the wizard.
    pub fn is_complete(&self) -> bool {
        !self.username.trim().is_empty() && !self.storage_file.as_os_str().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> SweepConfig {
        SweepConfig {
            username: "demo-user".into(),
            storage_file: PathBuf::from("imgur_storage_state.json"),
            dry_run: false,
            max_items: 25,
            headless: true,
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        sample().save(&path).unwrap();
        let loaded = SweepConfig::load(&path).unwrap().expect("config present");
        assert_eq!(loaded, sample());
    }

    #[test]
    fn missing_file_is_none() {
        let dir = tempdir().unwrap();
        let loaded = SweepConfig::load(&dir.path().join(CONFIG_FILE)).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "{not json").unwrap();

        let err = SweepConfig::load(&path).expect_err("garbage should not parse");
        assert!(matches!(err, ConfigError::Malformed { .. }));
    }

    #[test]
    fn optional_fields_get_safe_defaults() {
        let raw = r#"{ "username": "demo", "storage_file": "state.json" }"#;
        let config: SweepConfig = serde_json::from_str(raw).unwrap();

        assert!(config.dry_run, "deletion must be opt-in");
        assert_eq!(config.max_items, 10);
        assert!(!config.headless);
    }

    #[test]
    fn completeness_requires_a_username() {
        let mut config = sample();
        assert!(config.is_complete());

        config.username = "   ".into();
        assert!(!config.is_complete());
    }
}
