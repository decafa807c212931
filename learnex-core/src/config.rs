//! Configuration management

use crate::error::LearnexResult;
use crate::logging::LoggingConfig;
use crate::types::{AccessPolicy, Role};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level LearnEx configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnexConfig {
    pub server: ServerConfig,
    pub session: SessionSettings,
    pub access: AccessSettings,
    pub storage: StorageSettings,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub dev_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            dev_mode: false,
        }
    }
}

/// Upper bound for every session timeout and interval: one year
pub const MAX_SESSION_SECS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Idle timeout in seconds
    pub timeout_secs: u64,
    /// Absolute lifetime in seconds; falls back to `timeout_secs`
    pub absolute_timeout_secs: Option<u64>,
    /// Per-session expiry watcher interval; no watcher when unset
    pub watch_interval_secs: Option<u64>,
    /// Server-side sweep interval over all registered sessions
    pub sweep_interval_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 1800,
            absolute_timeout_secs: None,
            watch_interval_secs: Some(60),
            sweep_interval_secs: 60,
        }
    }
}

impl SessionSettings {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn absolute_timeout(&self) -> Duration {
        Duration::from_secs(self.absolute_timeout_secs.unwrap_or(self.timeout_secs))
    }

    pub fn watch_interval(&self) -> Option<Duration> {
        self.watch_interval_secs.map(Duration::from_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessSettings {
    pub policy: AccessPolicy,
    /// Resource → allowed roles. Empty means the built-in LearnEx table.
    pub rules: BTreeMap<String, Vec<Role>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    #[default]
    Memory,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub session_backend: SessionBackend,
    /// Directory for file-backed session slots (`~` is expanded)
    pub session_dir: String,
    /// SQLite URL for the user table; in-memory accounts when unset
    pub database_url: Option<String>,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            session_backend: SessionBackend::Memory,
            session_dir: "~/.learnex/sessions".to_string(),
            database_url: None,
        }
    }
}

impl StorageSettings {
    /// Session directory with a leading `~` resolved against the home directory
    pub fn session_dir_path(&self) -> PathBuf {
        expand_home(&self.session_dir)
    }
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

impl LearnexConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> LearnexResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::config_error!(
                format!("Failed to read config file: {}", e),
                e,
                "read_file",
                "Check if the config file exists and is readable"
            )
        })?;

        let config: LearnexConfig = toml::from_str(&content).map_err(|e| {
            crate::config_error!(
                format!("Failed to parse config: {}", e),
                e,
                "parse_toml",
                "Check TOML syntax in config file"
            )
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> LearnexResult<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            crate::config_error!(
                format!("Failed to serialize config: {}", e),
                e,
                "serialize_toml",
                "Report the configuration that failed to serialize"
            )
        })?;

        std::fs::write(path, content).map_err(|e| {
            crate::config_error!(
                format!("Failed to write config file: {}", e),
                e,
                "write_file",
                "Check if the directory exists and is writable"
            )
        })?;

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> LearnexResult<()> {
        if self.session.timeout_secs == 0 {
            return Err(crate::validation_error!(
                "Session timeout must be greater than 0",
                "session.timeout_secs",
                "config"
            ));
        }

        let bounded = [
            ("session.timeout_secs", Some(self.session.timeout_secs)),
            ("session.absolute_timeout_secs", self.session.absolute_timeout_secs),
            ("session.watch_interval_secs", self.session.watch_interval_secs),
            ("session.sweep_interval_secs", Some(self.session.sweep_interval_secs)),
        ];
        if let Some((field, _)) = bounded
            .iter()
            .find(|(_, secs)| secs.is_some_and(|secs| secs > MAX_SESSION_SECS))
        {
            return Err(crate::validation_error!(
                format!("{} cannot exceed {} seconds", field, MAX_SESSION_SECS),
                *field,
                "config"
            ));
        }

        if let Some(absolute) = self.session.absolute_timeout_secs {
            if absolute < self.session.timeout_secs {
                return Err(crate::validation_error!(
                    "Absolute session timeout cannot be shorter than the idle timeout",
                    "session.absolute_timeout_secs",
                    "config"
                ));
            }
        }

        if self.session.watch_interval_secs == Some(0) {
            return Err(crate::validation_error!(
                "Watch interval must be greater than 0",
                "session.watch_interval_secs",
                "config"
            ));
        }

        if self.session.sweep_interval_secs == 0 {
            return Err(crate::validation_error!(
                "Sweep interval must be greater than 0",
                "session.sweep_interval_secs",
                "config"
            ));
        }

        if let Some((resource, _)) = self.access.rules.iter().find(|(_, roles)| roles.is_empty())
        {
            return Err(crate::validation_error!(
                format!("Access rule '{}' allows no roles", resource),
                "access.rules",
                "config"
            ));
        }

        Ok(())
    }
}
