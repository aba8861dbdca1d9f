//! Session settings.
//!
//! Stored as `settings.json` in the config directory. Every field has a
//! default, so a missing file or a partial one is fine:
//!
//! ```json
//! {
//!   "heartbeatIntervalMs": 2000,
//!   "coordinator": {
//!     "roles": ["primary", "secondary"],
//!     "watchdogIntervalMs": 3000,
//!     "livenessThresholdMs": 5000,
//!     "credentialRefreshMs": 10000,
//!     "openOnActivate": true,
//!     "reopenEvicted": true,
//!     "logDir": "/var/log/vera"
//!   }
//! }
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::protocol::Role;

pub const SETTINGS_FILE: &str = "settings.json";

pub const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 2000;
pub const DEFAULT_WATCHDOG_INTERVAL_MS: u64 = 3000;
pub const DEFAULT_LIVENESS_THRESHOLD_MS: u64 = 5000;
pub const DEFAULT_CREDENTIAL_REFRESH_MS: u64 = 10_000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Launcher coordinator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoordinatorConfig {
    /// Window roles the launcher keeps open.
    pub roles: Vec<Role>,
    /// How often the watchdog scans for dead windows.
    pub watchdog_interval_ms: u64,
    /// A window not heard from for longer than this is considered dead.
    pub liveness_threshold_ms: u64,
    /// How often the identity provider is polled for a new credential.
    pub credential_refresh_ms: u64,
    /// Open missing windows right after activation.
    pub open_on_activate: bool,
    /// Keep reopening windows that are missing while the launcher runs,
    /// e.g. after the watchdog evicted them.
    pub reopen_evicted: bool,
    /// Directory for the session audit log. No audit log when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            roles: vec![Role::Primary, Role::Secondary],
            watchdog_interval_ms: DEFAULT_WATCHDOG_INTERVAL_MS,
            liveness_threshold_ms: DEFAULT_LIVENESS_THRESHOLD_MS,
            credential_refresh_ms: DEFAULT_CREDENTIAL_REFRESH_MS,
            open_on_activate: true,
            reopen_evicted: true,
            log_dir: None,
        }
    }
}

impl CoordinatorConfig {
    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_millis(self.watchdog_interval_ms)
    }

    pub fn credential_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.credential_refresh_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.watchdog_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "watchdogIntervalMs must be greater than zero".into(),
            ));
        }
        if self.liveness_threshold_ms == 0 {
            return Err(ConfigError::Invalid(
                "livenessThresholdMs must be greater than zero".into(),
            ));
        }
        if self.credential_refresh_ms == 0 {
            return Err(ConfigError::Invalid(
                "credentialRefreshMs must be greater than zero".into(),
            ));
        }
        if self.roles.contains(&Role::Launcher) {
            return Err(ConfigError::Invalid(
                "the launcher role cannot be opened as a window".into(),
            ));
        }
        for (i, role) in self.roles.iter().enumerate() {
            if self.roles[..i].contains(role) {
                return Err(ConfigError::Invalid(format!("role {role} listed twice")));
            }
        }
        Ok(())
    }
}

/// Settings shared by windows and the launcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// How often each window publishes a heartbeat.
    pub heartbeat_interval_ms: u64,
    pub coordinator: CoordinatorConfig,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            heartbeat_interval_ms: DEFAULT_HEARTBEAT_INTERVAL_MS,
            coordinator: CoordinatorConfig::default(),
        }
    }
}

impl SessionSettings {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.coordinator.validate()?;
        if self.heartbeat_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "heartbeatIntervalMs must be greater than zero".into(),
            ));
        }
        // Otherwise healthy windows are evicted between two heartbeats.
        if self.heartbeat_interval_ms >= self.coordinator.liveness_threshold_ms {
            return Err(ConfigError::Invalid(format!(
                "heartbeatIntervalMs ({}) must be below livenessThresholdMs ({})",
                self.heartbeat_interval_ms, self.coordinator.liveness_threshold_ms
            )));
        }
        Ok(())
    }
}

/// Load settings from `{dir}/settings.json`.
///
/// Returns defaults if the file doesn't exist.
pub fn load_settings(dir: &Path) -> Result<SessionSettings, ConfigError> {
    let file_path = dir.join(SETTINGS_FILE);

    if !file_path.exists() {
        return Ok(SessionSettings::default());
    }

    let contents = fs::read_to_string(&file_path)?;
    let settings: SessionSettings = serde_json::from_str(&contents)?;
    settings.validate()?;

    Ok(settings)
}

/// Save settings to `{dir}/settings.json` (write-then-rename).
pub fn save_settings(dir: &Path, settings: &SessionSettings) -> Result<(), ConfigError> {
    fs::create_dir_all(dir)?;

    let file_path = dir.join(SETTINGS_FILE);
    let temp_path = dir.join(format!("{SETTINGS_FILE}.tmp"));

    let json = serde_json::to_string_pretty(settings)?;
    fs::write(&temp_path, json)?;
    fs::rename(&temp_path, &file_path)?;

    Ok(())
}
