//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::ApiConfig;
use crate::channel::{
    endpoint_for, ManagerOptions, ReconnectPolicy, TransportError, DEFAULT_CONNECTIVITY_LOST_AFTER,
    DEFAULT_PATH,
};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub channel: ChannelConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Client channel configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    /// Origin of the page hosting the client; the endpoint is derived from it
    #[serde(default = "default_page_url")]
    pub page_url: String,

    #[serde(default = "default_path")]
    pub path: String,

    #[serde(default = "default_reconnect_ms")]
    pub reconnect_delay_ms: u64,

    /// Cap for exponential backoff; equal to the delay means fixed retries
    #[serde(default = "default_reconnect_ms")]
    pub max_reconnect_delay_ms: u64,

    #[serde(default)]
    pub jitter_ms: u64,

    #[serde(default = "default_connectivity_lost_after")]
    pub connectivity_lost_after: u32,
}

fn default_page_url() -> String {
    "http://127.0.0.1:8088".to_string()
}

fn default_path() -> String {
    DEFAULT_PATH.to_string()
}

fn default_reconnect_ms() -> u64 {
    3000
}

fn default_connectivity_lost_after() -> u32 {
    DEFAULT_CONNECTIVITY_LOST_AFTER
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            page_url: default_page_url(),
            path: default_path(),
            reconnect_delay_ms: default_reconnect_ms(),
            max_reconnect_delay_ms: default_reconnect_ms(),
            jitter_ms: 0,
            connectivity_lost_after: default_connectivity_lost_after(),
        }
    }
}

impl ChannelConfig {
    /// Reconnect policy described by this section
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        let initial = Duration::from_millis(self.reconnect_delay_ms);
        let max = Duration::from_millis(self.max_reconnect_delay_ms);

        let policy = if max > initial {
            ReconnectPolicy::exponential(initial, max)
        } else {
            ReconnectPolicy::fixed(initial)
        };
        policy.with_jitter(Duration::from_millis(self.jitter_ms))
    }

    /// Manager options for the derived endpoint
    pub fn manager_options(&self) -> Result<ManagerOptions, TransportError> {
        let endpoint = endpoint_for(&self.page_url, &self.path)?;
        let mut options = ManagerOptions::new(endpoint).reconnect(self.reconnect_policy());
        options.connectivity_lost_after = match self.connectivity_lost_after {
            0 => None,
            n => Some(n),
        };
        Ok(options)
    }
}

/// Event hub server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8088
}

fn default_max_connections() -> usize {
    1000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_connections: default_max_connections(),
        }
    }
}

impl ServerConfig {
    pub fn api_config(&self) -> ApiConfig {
        ApiConfig {
            host: self.host.clone(),
            port: self.port,
            max_connections: self.max_connections,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Standard config file locations, in search order
    pub fn default_paths() -> Vec<PathBuf> {
        [
            dirs::config_dir().map(|p| p.join("wsbridge").join("config.toml")),
            Some(PathBuf::from("/etc/wsbridge/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    /// First config file that exists among the standard locations
    pub fn find_default_path() -> Option<PathBuf> {
        first_existing(&Self::default_paths())
    }

    /// Load from the first existing default location, or from the
    /// environment alone when there is none.
    ///
    /// A config file that exists but cannot be read or parsed is an error,
    /// not a silent fallback to defaults.
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load_first(&Self::default_paths())
    }

    fn load_first(candidates: &[PathBuf]) -> Result<Self, ConfigError> {
        match first_existing(candidates) {
            Some(path) => Self::load_with_env(&path),
            None => Ok(Self::from_env()),
        }
    }

    /// Apply environment variable overrides to an existing config
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        // Channel overrides
        if let Some(url) = var("WSBRIDGE_PAGE_URL") {
            self.channel.page_url = url;
        }
        if let Some(ms) = var("WSBRIDGE_RECONNECT_MS").and_then(|v| v.parse().ok()) {
            let fixed = self.channel.max_reconnect_delay_ms <= self.channel.reconnect_delay_ms;
            self.channel.reconnect_delay_ms = ms;
            self.channel.max_reconnect_delay_ms = if fixed {
                ms
            } else {
                self.channel.max_reconnect_delay_ms.max(ms)
            };
        }

        // Server overrides
        if let Some(host) = var("WSBRIDGE_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("WSBRIDGE_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }

        // Logging overrides
        if let Some(level) = var("WSBRIDGE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("WSBRIDGE_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

fn first_existing(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates.iter().find(|path| path.exists()).cloned()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# wsbridge Configuration
#
# Environment variables override these settings:
# - WSBRIDGE_PAGE_URL
# - WSBRIDGE_RECONNECT_MS
# - WSBRIDGE_HOST
# - WSBRIDGE_PORT
# - WSBRIDGE_LOG_LEVEL
# - WSBRIDGE_LOG_FORMAT

[channel]
# Origin of the page hosting the client (http -> ws, https -> wss)
page_url = "http://127.0.0.1:8088"

# WebSocket path on that origin
path = "/ws"

# Delay before each reconnect attempt (ms)
reconnect_delay_ms = 3000

# Raise above reconnect_delay_ms for capped exponential backoff (ms)
max_reconnect_delay_ms = 3000

# Random extra delay added to each attempt (ms)
jitter_ms = 0

# Consecutive failures before connectivity is reported lost (0 = never)
connectivity_lost_after = 10

[server]
# Event hub host
host = "127.0.0.1"

# Event hub port
port = 8088

# Maximum concurrent WebSocket clients
max_connections = 1000

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.channel.page_url, "http://127.0.0.1:8088");
        assert_eq!(config.channel.path, "/ws");
        assert_eq!(config.server.api_config().addr(), "127.0.0.1:8088");
        assert_eq!(config.logging.format, "pretty");

        let options = config.channel.manager_options().unwrap();
        assert_eq!(options.endpoint, "ws://127.0.0.1:8088/ws");
        assert_eq!(options.reconnect, ReconnectPolicy::default());
        assert_eq!(options.connectivity_lost_after, Some(10));
    }

    #[test]
    fn test_generated_config_parses_to_defaults() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        let defaults = Config::default();
        assert_eq!(config.channel.page_url, defaults.channel.page_url);
        assert_eq!(config.channel.reconnect_delay_ms, 3000);
        assert_eq!(config.server.port, defaults.server.port);
        assert_eq!(config.logging.level, defaults.logging.level);
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[channel]\npage_url = \"https://app.example.com\"\nmax_reconnect_delay_ms = 30000\n"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.server.port, 8088);

        let options = config.channel.manager_options().unwrap();
        assert_eq!(options.endpoint, "wss://app.example.com/ws");
        assert_eq!(options.reconnect.multiplier, 2.0);
        assert_eq!(options.reconnect.max_delay, Duration::from_secs(30));
    }

    #[test]
    fn test_load_errors() {
        let missing = Config::load(Path::new("/nonexistent/wsbridge.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = \"not a port\"").unwrap();
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_malformed_default_file_is_an_error() {
        let mut broken = NamedTempFile::new().unwrap();
        writeln!(broken, "[channel\npage_url = ").unwrap();
        let mut valid = NamedTempFile::new().unwrap();
        writeln!(valid, "[server]\nport = 9000").unwrap();

        let candidates = vec![
            PathBuf::from("/nonexistent/wsbridge.toml"),
            broken.path().to_path_buf(),
            valid.path().to_path_buf(),
        ];
        assert!(matches!(
            Config::load_first(&candidates),
            Err(ConfigError::Parse { .. })
        ));

        // Missing candidates are skipped
        let config = Config::load_first(&candidates[2..]).unwrap();
        assert_eq!(config.server.port, 9000);

        let none = vec![PathBuf::from("/nonexistent/wsbridge.toml")];
        assert!(Config::load_first(&none).is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("WSBRIDGE_PAGE_URL", "https://remote.example"),
            ("WSBRIDGE_RECONNECT_MS", "500"),
            ("WSBRIDGE_HOST", "0.0.0.0"),
            ("WSBRIDGE_PORT", "9000"),
            ("WSBRIDGE_LOG_LEVEL", "debug"),
            ("WSBRIDGE_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.channel.page_url, "https://remote.example");
        assert_eq!(config.channel.reconnect_delay_ms, 500);
        assert_eq!(
            config.channel.reconnect_policy(),
            ReconnectPolicy::fixed(Duration::from_millis(500))
        );
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_invalid_port_override_ignored() {
        let mut config = Config::default();
        config.apply_overrides(|key| (key == "WSBRIDGE_PORT").then(|| "abc".to_string()));
        assert_eq!(config.server.port, 8088);
    }

    #[test]
    fn test_zero_disables_degraded_reporting() {
        let mut config = Config::default();
        config.channel.connectivity_lost_after = 0;
        let options = config.channel.manager_options().unwrap();
        assert_eq!(options.connectivity_lost_after, None);
    }
}
