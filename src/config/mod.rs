//! Configuration management.
//!
//! Values are resolved once, lowest to highest precedence: built-in defaults,
//! a TOML file, `SPRINGER_*` environment variables, then an explicit API key.

mod file_config;

pub use file_config::{ConfigFile, ConfigFileError};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::models::{Endpoint, Plan, DEFAULT_BASE_URL};

/// Name of the configuration file looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "springer-client.toml";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Springer Nature API key
    #[serde(default)]
    pub api_key: Option<String>,

    /// Base URL of the API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Subscription plan
    #[serde(default)]
    pub plan: Plan,

    /// Cache directory per endpoint
    #[serde(default)]
    pub directories: Directories,

    /// Request tuning
    #[serde(default)]
    pub requests: RequestSettings,

    /// Cache settings
    #[serde(default)]
    pub cache: CacheSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: api_key_from_env(),
            base_url: default_base_url(),
            plan: Plan::default(),
            directories: Directories::default(),
            requests: RequestSettings::default(),
            cache: CacheSettings::default(),
        }
    }
}

impl Config {
    /// Override the API key
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Resolved, non-blank API key
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

/// Cache directory of each endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directories {
    pub metadata: PathBuf,
    pub meta: PathBuf,
    pub open_access: PathBuf,
}

impl Default for Directories {
    fn default() -> Self {
        Self::under(default_cache_dir())
    }
}

impl Directories {
    /// One subdirectory per endpoint below `root`
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            metadata: root.join(Endpoint::Metadata.cache_subdir()),
            meta: root.join(Endpoint::Meta.cache_subdir()),
            open_access: root.join(Endpoint::OpenAccess.cache_subdir()),
        }
    }

    /// Directory of `endpoint`
    pub fn for_endpoint(&self, endpoint: Endpoint) -> &Path {
        match endpoint {
            Endpoint::Metadata => &self.metadata,
            Endpoint::Meta => &self.meta,
            Endpoint::OpenAccess => &self.open_access,
        }
    }
}

/// Request tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSettings {
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Retries of a request answered with a transient status
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Base of the exponential backoff in seconds
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
}

impl Default for RequestSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            retries: default_retries(),
            backoff_factor: default_backoff_factor(),
        }
    }
}

fn default_timeout() -> u64 {
    20
}

fn default_retries() -> u32 {
    5
}

fn default_backoff_factor() -> f64 {
    2.0
}

/// Cache settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// When false, every window is fetched and nothing is written
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_true() -> bool {
    true
}

/// Root of the default cache directories
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("springer-client")
}

/// API key from `SPRINGER_API_KEY` or `API_KEY`
pub fn api_key_from_env() -> Option<String> {
    ["SPRINGER_API_KEY", "API_KEY"]
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .map(|key| key.trim().to_string())
        .find(|key| !key.is_empty())
}

/// Look for a configuration file in the usual locations
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|dir| dir.join("springer-client").join("config.toml"))
        .filter(|path| path.is_file())
}

/// Load configuration from an optional file and the environment
pub fn load_config(path: Option<&Path>) -> Result<Config, config::ConfigError> {
    let mut builder = config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path));
    }
    let settings = builder
        .add_source(
            config::Environment::with_prefix("SPRINGER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let mut config: Config = settings.try_deserialize()?;
    if config.api_key().is_none() {
        config.api_key = api_key_from_env();
    }
    Ok(config)
}

/// Get the default configuration (from env vars or defaults)
pub fn get_config() -> Config {
    Config::default()
}
