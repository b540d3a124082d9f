//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/tealium/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/tealium/` (~/.config/tealium/)
//! - Data: `$XDG_DATA_HOME/tealium/` (~/.local/share/tealium/)
//! - State/Logs: `$XDG_STATE_HOME/tealium/` (~/.local/state/tealium/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default Tealium Collect endpoint
pub const DEFAULT_ENDPOINT: &str = "https://collect.tealiumiq.com/event";

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Identity of the library instance, handed to every component that needs it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryContext {
    pub account: String,
    pub profile: String,
    pub environment: String,
    pub datasource: Option<String>,
}

impl LibraryContext {
    pub fn new(
        account: impl Into<String>,
        profile: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            account: account.into(),
            profile: profile.into(),
            environment: environment.into(),
            datasource: None,
        }
    }

    pub fn with_datasource(mut self, datasource: impl Into<String>) -> Self {
        self.datasource = Some(datasource.into());
        self
    }

    /// Account, profile, and environment must all be non-empty
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("account", &self.account),
            ("profile", &self.profile),
            ("environment", &self.environment),
        ] {
            if value.is_empty() {
                return Err(Error::Config(format!("{} must not be empty", name)));
            }
        }
        Ok(())
    }
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Tealium account name
    #[serde(default)]
    pub account: String,

    /// Tealium profile name
    #[serde(default)]
    pub profile: String,

    /// Tealium environment, usually dev, qa, or prod
    #[serde(default)]
    pub environment: String,

    /// Optional data source id
    #[serde(default)]
    pub datasource: Option<String>,

    /// Dispatch configuration
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Persistent storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where and how events are sent
#[derive(Debug, Deserialize, Clone)]
pub struct DispatchConfig {
    /// Collect endpoint URL, without query string
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Upper bound in milliseconds on how long one dispatch may block
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl DispatchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}

/// Persistent storage configuration
#[derive(Debug, Deserialize, Default, Clone)]
pub struct StorageConfig {
    /// Override for the directory holding persisted payloads
    pub dir: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Validate configuration, returning error message if invalid
    pub fn validate(&self) -> Result<()> {
        self.library_context().validate()?;
        if self.dispatch.timeout_ms == 0 {
            return Err(Error::Config(
                "dispatch.timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// The identity part of this configuration
    pub fn library_context(&self) -> LibraryContext {
        LibraryContext {
            account: self.account.clone(),
            profile: self.profile.clone(),
            environment: self.environment.clone(),
            datasource: self.datasource.clone(),
        }
    }

    /// Directory holding persisted payloads, honoring `storage.dir`
    pub fn storage_dir(&self) -> PathBuf {
        self.storage.dir.clone().unwrap_or_else(Self::data_dir)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/tealium/config.toml` (~/.config/tealium/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("tealium").join("config.toml")
    }

    /// Returns the data directory path (for persisted payloads)
    ///
    /// `$XDG_DATA_HOME/tealium/` (~/.local/share/tealium/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("tealium")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/tealium/` (~/.local/state/tealium/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("tealium")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.dispatch.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.dispatch.timeout(), Duration::from_millis(5000));
        assert_eq!(config.logging.level, "info");
        assert!(config.storage.dir.is_none());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
account = "tealiummobile"
profile = "demo"
environment = "dev"
datasource = "abc123"

[dispatch]
endpoint = "https://collect.example.com/event"
timeout_ms = 1500

[storage]
dir = "/var/lib/tealium"

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.account, "tealiummobile");
        assert_eq!(config.datasource.as_deref(), Some("abc123"));
        assert_eq!(config.dispatch.endpoint, "https://collect.example.com/event");
        assert_eq!(config.dispatch.timeout_ms, 1500);
        assert_eq!(config.storage_dir(), PathBuf::from("/var/lib/tealium"));
        assert_eq!(config.logging.level, "debug");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        // Missing identity fails
        let config = Config::default();
        assert!(config.validate().is_err());

        let mut config = Config {
            account: "a".to_string(),
            profile: "p".to_string(),
            environment: "prod".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        config.dispatch.timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_library_context_validation() {
        assert!(LibraryContext::new("a", "p", "dev").validate().is_ok());
        let err = LibraryContext::new("a", "", "dev").validate().unwrap_err();
        assert!(err.to_string().contains("profile"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "account = \"a\"\nprofile = \"p\"\nenvironment = \"qa\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.library_context(), LibraryContext::new("a", "p", "qa"));
    }

    #[test]
    fn test_load_from_invalid_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "account = [").unwrap();
        assert!(matches!(Config::load_from(&path), Err(Error::Config(_))));
    }
}
