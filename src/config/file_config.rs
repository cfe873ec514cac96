//! Configuration file support for springer-client.
//!
//! The file uses the same keys as the `SPRINGER_*` environment variables,
//! with nested tables separated by `__` in the environment
//! (`SPRINGER_REQUESTS__TIMEOUT_SECS=30`).
//!
//! # Configuration File Format
//!
//! ```toml
//! api_key = "your-api-key"
//! base_url = "http://api.springernature.com"
//! plan = "basic"
//!
//! [directories]
//! metadata = "~/.cache/springer-client/metadata"
//! meta = "~/.cache/springer-client/meta"
//! open_access = "~/.cache/springer-client/open_access"
//!
//! [requests]
//! timeout_secs = 20
//! retries = 5
//! backoff_factor = 2.0
//!
//! [cache]
//! enabled = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{CacheSettings, Config, Directories, RequestSettings};
use crate::models::{Plan, DEFAULT_BASE_URL};

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub plan: Plan,

    #[serde(default)]
    pub directories: Directories,

    #[serde(default)]
    pub requests: RequestSettings,

    #[serde(default)]
    pub cache: CacheSettings,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::create_default(None)
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigFileError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigFileError::Io(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigFileError::Parse(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigFileError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigFileError::Serialize(e.to_string()))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ConfigFileError::Io(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| ConfigFileError::Io(e.to_string()))
    }

    /// Create default configuration with the default cache directories
    pub fn create_default(api_key: Option<String>) -> Self {
        Self {
            api_key,
            base_url: default_base_url(),
            plan: Plan::default(),
            directories: Directories::default(),
            requests: RequestSettings::default(),
            cache: CacheSettings::default(),
        }
    }

    /// Convert into a runtime configuration
    pub fn into_config(self) -> Config {
        Config {
            api_key: self.api_key,
            base_url: self.base_url,
            plan: self.plan,
            directories: self.directories,
            requests: self.requests,
            cache: self.cache,
        }
    }
}

/// Configuration file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialize error: {0}")]
    Serialize(String),
}
