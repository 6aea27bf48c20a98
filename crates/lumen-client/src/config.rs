//! TOML-based configuration persistence for the client.
//!
//! Reads and writes [`ClientConfig`] at the platform-appropriate location:
//! - Windows:  `%APPDATA%\LumenLink\config.toml`
//! - Linux:    `~/.config/lumenlink/config.toml`
//! - macOS:    `~/Library/Application Support/LumenLink/config.toml`
//!
//! Fields absent from the file fall back to their defaults, so the client
//! works on first run and across upgrades that add new fields.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::device::DeviceOptions;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Persisted client configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    /// Endpoint path tried first when no explicit endpoint is given.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Time budget for opening the endpoint, in milliseconds.
    #[serde(default = "default_connect_budget_ms")]
    pub connect_budget_ms: u64,
    /// Per-operation response budget, in milliseconds.
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_endpoint() -> String {
    "/dev/ttyUSB0".to_string()
}
fn default_connect_budget_ms() -> u64 {
    3000
}
fn default_response_timeout_ms() -> u64 {
    1000
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            connect_budget_ms: default_connect_budget_ms(),
            response_timeout_ms: default_response_timeout_ms(),
            log_level: default_log_level(),
        }
    }
}

impl ClientConfig {
    /// The connect budget as a [`Duration`].
    pub fn connect_budget(&self) -> Duration {
        Duration::from_millis(self.connect_budget_ms)
    }

    /// Device options derived from this configuration.
    pub fn device_options(&self) -> DeviceOptions {
        DeviceOptions {
            response_timeout: Duration::from_millis(self.response_timeout_ms),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config
/// base directory cannot be determined from the environment.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot
/// be determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Loads [`ClientConfig`] from disk, returning defaults if the file does not
/// yet exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not
/// found", and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config() -> Result<ClientConfig, ConfigError> {
    let path = config_file_path()?;

    match std::fs::read_to_string(&path) {
        Ok(content) => {
            let config: ClientConfig = toml::from_str(&content)?;
            Ok(config)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ClientConfig::default()),
        Err(e) => Err(ConfigError::Io { path, source: e }),
    }
}

/// Persists `config` to disk, creating the config directory if needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(config: &ClientConfig) -> Result<(), ConfigError> {
    let path = config_file_path()?;

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(&path, content).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(())
}

/// Resolves the platform config base directory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("LumenLink"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("lumenlink"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("LumenLink")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let config = ClientConfig::default();
        assert_eq!(config.endpoint, "/dev/ttyUSB0");
        assert_eq!(config.connect_budget_ms, 3000);
        assert_eq!(config.response_timeout_ms, 1000);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_durations_derive_from_millis_fields() {
        let config = ClientConfig {
            connect_budget_ms: 250,
            response_timeout_ms: 75,
            ..ClientConfig::default()
        };
        assert_eq!(config.connect_budget(), Duration::from_millis(250));
        assert_eq!(
            config.device_options().response_timeout,
            Duration::from_millis(75)
        );
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        // Arrange
        let config = ClientConfig {
            endpoint: "/dev/ttyACM3".to_string(),
            connect_budget_ms: 500,
            response_timeout_ms: 2000,
            log_level: "debug".to_string(),
        };

        // Act
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let restored: ClientConfig = toml::from_str(&toml_str).expect("deserialize");

        // Assert
        assert_eq!(config, restored);
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: ClientConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(config, ClientConfig::default());
    }

    #[test]
    fn test_partial_toml_overrides_only_named_fields() {
        let config: ClientConfig =
            toml::from_str("response_timeout_ms = 42").expect("deserialize partial");
        assert_eq!(config.response_timeout_ms, 42);
        assert_eq!(config.endpoint, "/dev/ttyUSB0");
        assert_eq!(config.connect_budget_ms, 3000);
    }

    #[test]
    fn test_invalid_toml_is_a_parse_error() {
        let result: Result<ClientConfig, toml::de::Error> = toml::from_str("[[[ not valid toml");
        assert!(result.is_err());
    }

    #[test]
    fn test_save_and_load_round_trip_via_temp_dir() {
        // Arrange – unique temp path, mirrors save_config/load_config logic
        let dir = std::env::temp_dir().join(format!(
            "lumenlink-test-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir");
        let path = dir.join("config.toml");

        let config = ClientConfig {
            endpoint: "/dev/ttyUSB9".to_string(),
            log_level: "trace".to_string(),
            ..ClientConfig::default()
        };

        // Act
        let content = toml::to_string_pretty(&config).expect("serialize");
        std::fs::write(&path, &content).expect("write");
        let loaded: ClientConfig =
            toml::from_str(&std::fs::read_to_string(&path).expect("read")).expect("parse");

        // Assert
        assert_eq!(loaded, config);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_config_file_path_ends_with_config_toml() {
        if let Ok(path) = config_file_path() {
            assert!(path.ends_with("config.toml"));
        }
        // NoPlatformConfigDir in a stripped environment is also acceptable.
    }
}
