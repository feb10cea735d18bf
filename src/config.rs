//! Configuration types for the reminder service.

use crate::error::{ReminderError, Result};
use reminders_notify::NotifierConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration for the reminder service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderConfig {
    /// HTTP transport settings.
    pub server: ServerConfig,
    /// Reminder file and background saver settings.
    pub storage: StorageConfig,
    /// Notifier service and background notifier settings.
    pub notifier: NotifierSettings,
}

/// HTTP transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address, e.g. `127.0.0.1:8080`. Port `0` picks a free port.
    pub addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8080".to_owned(),
        }
    }
}

/// Persistent store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Reminder array file.
    pub db_path: PathBuf,
    /// Counter record file (`{"id": .., "checksum": ..}`).
    pub db_config_path: PathBuf,
    /// Seconds between background saves.
    pub save_interval_secs: u64,
    /// Upper bound for a single save, in seconds.
    pub write_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("db.json"),
            db_config_path: PathBuf::from(".db.config.json"),
            save_interval_secs: 30,
            write_timeout_secs: 15,
        }
    }
}

impl StorageConfig {
    /// Background save period.
    pub fn save_interval(&self) -> Duration {
        Duration::from_secs(self.save_interval_secs)
    }

    /// Upper bound for a single save.
    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}

/// Notifier configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierSettings {
    /// Base URL of the notifier service.
    pub base_url: String,
    /// Milliseconds between due-reminder scans.
    pub tick_interval_ms: u64,
    /// Per-notification request timeout in seconds.
    pub timeout_secs: u64,
    /// Delay before a failed notification is attempted again, in seconds.
    pub default_backoff_secs: u64,
}

impl Default for NotifierSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9000".to_owned(),
            tick_interval_ms: 1_000,
            timeout_secs: 20,
            default_backoff_secs: 60,
        }
    }
}

impl NotifierSettings {
    /// Scan period (also the width of the due window).
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Per-notification timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Fallback re-arm delay after a failed notification.
    pub fn default_backoff(&self) -> Duration {
        Duration::from_secs(self.default_backoff_secs)
    }

    /// Client configuration for the `reminders-notify` crate.
    pub fn client_config(&self) -> NotifierConfig {
        NotifierConfig {
            base_url: self.base_url.clone(),
            timeout_seconds: self.timeout_secs,
            user_agent: None,
        }
    }
}

impl ReminderConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| ReminderError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ReminderError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validates this configuration, returning an error if any field is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.server.addr.trim().is_empty() {
            return Err(ReminderError::Config("server.addr must not be empty".into()));
        }
        if self.storage.db_path.as_os_str().is_empty() {
            return Err(ReminderError::Config(
                "storage.db_path must not be empty".into(),
            ));
        }
        if self.storage.db_config_path.as_os_str().is_empty() {
            return Err(ReminderError::Config(
                "storage.db_config_path must not be empty".into(),
            ));
        }
        if self.storage.db_path == self.storage.db_config_path {
            return Err(ReminderError::Config(
                "storage.db_path and storage.db_config_path must differ".into(),
            ));
        }
        for (name, value) in [
            ("storage.save_interval_secs", self.storage.save_interval_secs),
            ("storage.write_timeout_secs", self.storage.write_timeout_secs),
            ("notifier.tick_interval_ms", self.notifier.tick_interval_ms),
            ("notifier.timeout_secs", self.notifier.timeout_secs),
            (
                "notifier.default_backoff_secs",
                self.notifier.default_backoff_secs,
            ),
        ] {
            if value == 0 {
                return Err(ReminderError::Config(format!(
                    "{name} must be greater than 0"
                )));
            }
        }
        self.notifier
            .client_config()
            .validate()
            .map_err(|e| ReminderError::Config(format!("notifier: {e}")))?;
        Ok(())
    }
}
