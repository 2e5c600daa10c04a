//! Application configuration management.
//!
//! Holds the persisted device address, the reconnect policy and logging
//! settings. Configuration is persisted as TOML on disk; the device address
//! is stored under the fixed key `server.address`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use serde::{Deserialize, Serialize};

use crate::constants;
use crate::error::{DgError, DgResult};

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Device connection settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Reconnection policy.
    #[serde(default)]
    pub reconnect: ReconnectSettings,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Deployment environment, which selects `wss` over `ws` for bare addresses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    /// Parse an environment name; anything unrecognised is `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" => Some(Self::Development),
            "production" | "prod" => Some(Self::Production),
            _ => None,
        }
    }

    /// The configured environment, overridden by `DOORGUARD_ENV` when set.
    pub fn resolve(configured: Self) -> Self {
        std::env::var(constants::ENVIRONMENT_VAR)
            .ok()
            .and_then(|v| Self::parse(&v))
            .unwrap_or(configured)
    }

    /// Whether bare addresses should use the secure transport.
    pub fn is_secure(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Device connection configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Saved device address (e.g. "192.168.1.40" or "door.local:8765").
    #[serde(default)]
    pub address: String,

    /// Deployment environment.
    #[serde(default)]
    pub environment: Environment,
}

/// Reconnect policy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectSettings {
    /// Delay before the first retry, in milliseconds.
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    /// Cap on any single retry delay, in milliseconds.
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Consecutive failures after which retrying stops.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for log files. If empty, uses default location.
    #[serde(default)]
    pub directory: String,

    /// Enable JSON structured logging output.
    #[serde(default)]
    pub json_output: bool,
}

// Default value functions for serde

fn default_base_delay() -> u64 {
    constants::RECONNECT_BASE_DELAY_MS
}

fn default_max_delay() -> u64 {
    constants::RECONNECT_MAX_DELAY_MS
}

fn default_max_attempts() -> u32 {
    constants::MAX_RECONNECT_ATTEMPTS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: String::new(),
            json_output: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default config file path.
    pub fn load_default() -> DgResult<Self> {
        let path = Self::default_config_path()?;
        if path.exists() {
            Self::load_from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> DgResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to the default config file path.
    pub fn save_default(&self) -> DgResult<()> {
        let path = Self::default_config_path()?;
        self.save_to_file(&path)
    }

    /// Save configuration to a specific file path.
    pub fn save_to_file(&self, path: &Path) -> DgResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| DgError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> DgResult<PathBuf> {
        Ok(config_dir()?.join("config.toml"))
    }

    /// Get the effective log directory, using the configured path or the default.
    pub fn effective_log_dir(&self) -> DgResult<PathBuf> {
        if self.logging.directory.is_empty() {
            Ok(data_dir()?.join("logs"))
        } else {
            Ok(PathBuf::from(&self.logging.directory))
        }
    }

    /// Whether a device address has been saved.
    pub fn is_server_configured(&self) -> bool {
        !self.server.address.trim().is_empty()
    }

    /// Resolve the saved address into a connect target.
    pub fn target(&self) -> DgResult<TargetAddress> {
        let env = Environment::resolve(self.server.environment);
        TargetAddress::parse(&self.server.address, env)
    }
}

/// Platform configuration directory, e.g. `~/.config/DoorGuard` on Linux.
fn config_dir() -> DgResult<PathBuf> {
    let base = dirs::config_dir()
        .ok_or_else(|| DgError::Config("could not determine config directory".into()))?;
    Ok(base.join(constants::APP_NAME))
}

/// Platform data directory (logs live here), e.g. `~/.local/share/DoorGuard`.
fn data_dir() -> DgResult<PathBuf> {
    let base = dirs::data_dir()
        .ok_or_else(|| DgError::Config("could not determine data directory".into()))?;
    Ok(base.join(constants::APP_NAME))
}

/// Where the device's WebSocket server lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetAddress {
    pub host: String,
    pub port: u16,
    /// `wss` when true, `ws` otherwise.
    pub secure: bool,
}

impl TargetAddress {
    /// Build a target from parts.
    pub fn new(host: impl Into<String>, port: u16, secure: bool) -> Self {
        Self {
            host: host.into(),
            port,
            secure,
        }
    }

    /// Parse a user-supplied address.
    ///
    /// Accepts `host`, `host:port`, `[v6]:port` and `ws://`/`wss://`
    /// (or `http://`/`https://`) URLs. Quotes, whitespace, paths and trailing
    /// slashes are stripped. Without a scheme, `env` decides the transport.
    pub fn parse(input: &str, env: Environment) -> DgResult<Self> {
        let trimmed = input.trim().trim_matches('"').trim();
        if trimmed.is_empty() {
            return Err(DgError::InvalidAddress("address is empty".into()));
        }

        let (secure, rest) = if let Some(r) = trimmed.strip_prefix("wss://") {
            (true, r)
        } else if let Some(r) = trimmed.strip_prefix("https://") {
            (true, r)
        } else if let Some(r) = trimmed.strip_prefix("ws://") {
            (false, r)
        } else if let Some(r) = trimmed.strip_prefix("http://") {
            (false, r)
        } else {
            (env.is_secure(), trimmed)
        };

        let authority = rest.split('/').next().unwrap_or_default();
        if authority.is_empty() {
            return Err(DgError::InvalidAddress(format!("no host in {trimmed:?}")));
        }

        let (host, port) = split_host_port(authority)?;
        Ok(Self::new(host, port, secure))
    }

    /// The WebSocket URL for this target.
    pub fn url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        if self.host.contains(':') {
            format!("{scheme}://[{}]:{}", self.host, self.port)
        } else {
            format!("{scheme}://{}:{}", self.host, self.port)
        }
    }
}

impl std::fmt::Display for TargetAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.url())
    }
}

fn split_host_port(authority: &str) -> DgResult<(String, u16)> {
    if let Some(inner) = authority.strip_prefix('[') {
        let (host, tail) = inner
            .split_once(']')
            .ok_or_else(|| DgError::InvalidAddress(format!("unclosed bracket in {authority:?}")))?;
        let port = match tail.strip_prefix(':') {
            Some(p) => parse_port(p)?,
            None if tail.is_empty() => constants::DEFAULT_DEVICE_PORT,
            None => return Err(DgError::InvalidAddress(format!("garbage after host in {authority:?}"))),
        };
        return Ok((host.to_string(), port));
    }

    match authority.split_once(':') {
        Some((host, port)) if !host.is_empty() => Ok((host.to_string(), parse_port(port)?)),
        Some(_) => Err(DgError::InvalidAddress(format!("no host in {authority:?}"))),
        None => Ok((authority.to_string(), constants::DEFAULT_DEVICE_PORT)),
    }
}

fn parse_port(s: &str) -> DgResult<u16> {
    s.parse::<u16>()
        .map_err(|_| DgError::InvalidAddress(format!("bad port {s:?}")))
}

/// Thread-safe configuration holder for shared access.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<AppConfig>>,
    path: Option<PathBuf>,
}

impl ConfigHandle {
    /// Create a new configuration handle saved to the default location.
    pub fn new(config: AppConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
            path: None,
        }
    }

    /// Create a handle that saves to an explicit file.
    pub fn with_path(config: AppConfig, path: PathBuf) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
            path: Some(path),
        }
    }

    /// Read the configuration.
    pub async fn read(&self) -> tokio::sync::RwLockReadGuard<'_, AppConfig> {
        self.inner.read().await
    }

    /// Write/update the configuration.
    pub async fn write(&self) -> tokio::sync::RwLockWriteGuard<'_, AppConfig> {
        self.inner.write().await
    }

    /// Save the current configuration to disk.
    pub async fn save(&self) -> DgResult<()> {
        let config = self.inner.read().await;
        match &self.path {
            Some(path) => config.save_to_file(path),
            None => config.save_default(),
        }
    }

    /// Replace the saved device address and persist it.
    pub async fn save_address(&self, address: &str) -> DgResult<()> {
        // Reject garbage before it reaches disk.
        TargetAddress::parse(address, Environment::Development)?;
        self.inner.write().await.server.address = address.trim().to_string();
        self.save().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.reconnect.base_delay_ms, 1_000);
        assert_eq!(config.reconnect.max_delay_ms, 10_000);
        assert_eq!(config.reconnect.max_attempts, 5);
        assert_eq!(config.logging.level, "info");
        assert!(!config.is_server_configured());
    }

    #[test]
    fn test_parse_bare_host_uses_default_port() {
        let t = TargetAddress::parse("192.168.1.40", Environment::Development).unwrap();
        assert_eq!(t, TargetAddress::new("192.168.1.40", 8765, false));
        assert_eq!(t.url(), "ws://192.168.1.40:8765");
    }

    #[test]
    fn test_parse_production_is_secure() {
        let t = TargetAddress::parse("door.example.com", Environment::Production).unwrap();
        assert_eq!(t.url(), "wss://door.example.com:8765");
    }

    #[test]
    fn test_parse_explicit_scheme_wins_over_environment() {
        let t = TargetAddress::parse("ws://door.local:9000/", Environment::Production).unwrap();
        assert!(!t.secure);
        assert_eq!(t.port, 9000);

        let t = TargetAddress::parse("  \"wss://door.local\"  ", Environment::Development).unwrap();
        assert_eq!(t.url(), "wss://door.local:8765");
    }

    #[test]
    fn test_parse_ipv6() {
        let t = TargetAddress::parse("[fe80::1]:8000", Environment::Development).unwrap();
        assert_eq!(t.host, "fe80::1");
        assert_eq!(t.url(), "ws://[fe80::1]:8000");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(TargetAddress::parse("", Environment::Development).is_err());
        assert!(TargetAddress::parse("host:notaport", Environment::Development).is_err());
        assert!(TargetAddress::parse(":8765", Environment::Development).is_err());
        assert!(TargetAddress::parse("[::1", Environment::Development).is_err());
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::parse("PROD"), Some(Environment::Production));
        assert_eq!(Environment::parse("dev"), Some(Environment::Development));
        assert_eq!(Environment::parse("staging"), None);
    }

    #[test]
    fn test_default_paths_are_namespaced() {
        if let Ok(path) = AppConfig::default_config_path() {
            assert!(path.ends_with("DoorGuard/config.toml"));
        }
        if let Ok(dir) = AppConfig::default().effective_log_dir() {
            assert!(dir.ends_with("DoorGuard/logs"));
        }
        let mut config = AppConfig::default();
        config.logging.directory = "/var/log/doorguard".into();
        assert_eq!(config.effective_log_dir().unwrap(), PathBuf::from("/var/log/doorguard"));
    }

    #[test]
    fn test_roundtrip_toml() {
        let mut config = AppConfig::default();
        config.server.address = "door.local:8765".into();
        config.server.environment = Environment::Production;
        let serialized = toml::to_string_pretty(&config).unwrap();
        assert!(serialized.contains("environment = \"production\""));
        let deserialized: AppConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized.server.address, "door.local:8765");
        assert_eq!(deserialized.server.environment, Environment::Production);
    }
}
