//! Configuration for schema loading, rendering, and form persistence.
//!
//! Settings live in a small JSON file (`~/.config/schemaform/config.json` on
//! most platforms, overridable through [`CONFIG_PATH_ENV`]). A missing file
//! yields defaults; a malformed one logs a warning and also yields defaults.
//! [`API_BASE_ENV`] and [`STORAGE_PATH_ENV`] override individual settings.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::{default_config_dir, expand_tilde};

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "SCHEMAFORM_CONFIG_PATH";

/// Environment variable overriding the backend base URL.
pub const API_BASE_ENV: &str = "SCHEMAFORM_API_BASE";

/// Environment variable overriding the saved form data location.
pub const STORAGE_PATH_ENV: &str = "SCHEMAFORM_STORAGE_PATH";

/// Default filename for the config payload.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Default filename for the persisted form data store.
pub const STORAGE_FILE_NAME: &str = "form_data.json";

pub const DEFAULT_API_BASE: &str = "http://localhost:8000";
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

/// Error surfaced when reading the config file fails for reasons other than absence.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// How union alternatives are presented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnionStyle {
    /// A single `<select>` listing every alternative.
    #[default]
    Dropdown,
    /// One clickable card per alternative.
    Cards,
}

/// Persisted and environment-derived settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormsConfig {
    /// Backend base URL serving workflow schemas.
    pub api_base: String,
    /// Seconds to wait for a schema fetch before falling back.
    pub fetch_timeout_secs: u64,
    /// Location of the saved form data; defaults next to the config file.
    pub storage_path: Option<String>,
    /// Mirror the form data store to disk after every mutation.
    pub persist: bool,
    pub union_style: UnionStyle,
    /// Field names rendered at full width regardless of kind.
    pub full_width_fields: Vec<String>,
    /// Render nested models inside collapsible sections.
    pub collapsible_sections: bool,
}

impl Default for FormsConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            storage_path: None,
            persist: true,
            union_style: UnionStyle::default(),
            full_width_fields: Vec::new(),
            collapsible_sections: true,
        }
    }
}

impl FormsConfig {
    /// Loads the config from the default location and applies environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&default_config_path())
    }

    /// Loads the config from `path` and applies environment overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let mut config = read_config_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(api_base) = env::var(API_BASE_ENV)
            && !api_base.trim().is_empty()
        {
            self.api_base = api_base.trim().to_string();
        }
        if let Ok(storage_path) = env::var(STORAGE_PATH_ENV)
            && !storage_path.trim().is_empty()
        {
            self.storage_path = Some(storage_path);
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    /// Resolved location of the saved form data file.
    pub fn storage_file(&self) -> PathBuf {
        match self.storage_path.as_deref() {
            Some(path) if !path.trim().is_empty() => expand_tilde(path),
            _ => default_config_dir().join(STORAGE_FILE_NAME),
        }
    }
}

/// Location of the config file, honoring [`CONFIG_PATH_ENV`].
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = env::var(CONFIG_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return expand_tilde(trimmed);
        }
    }
    default_config_dir().join(CONFIG_FILE_NAME)
}

fn read_config_file(path: &Path) -> Result<FormsConfig, ConfigError> {
    match fs::read_to_string(path) {
        Ok(data) => match serde_json::from_str(&data) {
            Ok(config) => Ok(config),
            Err(error) => {
                warn!(
                    path = %path.display(),
                    error = %error,
                    "Failed to parse config file; using defaults"
                );
                Ok(FormsConfig::default())
            }
        },
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(FormsConfig::default()),
        Err(error) => Err(ConfigError::Io(error)),
    }
}
