//! Application settings loaded from `renewal_hub.toml`.
//!
//! Every section is optional; a missing file or a missing key falls back to
//! the defaults below. The API token is never stored in the file and is read
//! from `RENEWAL_HUB_API_TOKEN` instead.

use crate::core::status::DEFAULT_EXPIRING_SOON_DAYS;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Default settings file name.
pub const DEFAULT_SETTINGS_FILE: &str = "renewal_hub.toml";

/// Environment variable overriding the settings file path.
pub const SETTINGS_PATH_ENV: &str = "RENEWAL_HUB_CONFIG";

/// Environment variable holding the API bearer token.
pub const API_TOKEN_ENV: &str = "RENEWAL_HUB_API_TOKEN";

/// Top-level settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Backend API
    pub api: ApiSettings,
    /// Export destination
    pub export: ExportSettings,
    /// Reminder defaults
    pub reminders: ReminderSettings,
    /// Dashboard tuning
    pub dashboard: DashboardSettings,
}

/// `[api]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Base URL including the `/api` prefix
    pub base_url: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
        }
    }
}

/// `[export]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Directory downloaded reports are saved to
    pub output_dir: PathBuf,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("exports"),
        }
    }
}

/// `[reminders]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReminderSettings {
    /// Lead times used for services without their own thresholds
    pub default_thresholds: Vec<i64>,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            default_thresholds: vec![30, 7, 1],
        }
    }
}

/// `[dashboard]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DashboardSettings {
    /// Window, in days, for "expiring soon"
    pub expiring_soon_days: i64,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            expiring_soon_days: DEFAULT_EXPIRING_SOON_DAYS,
        }
    }
}

/// Parses settings from TOML text.
pub fn parse_settings(contents: &str) -> Result<Settings> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse settings: {e}"),
    })
}

/// Loads settings from `path`; a missing file yields the defaults.
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path = path.as_ref();
    if !path.exists() {
        tracing::info!("No settings file at {:?}, using defaults", path);
        return Ok(Settings::default());
    }

    tracing::debug!("Loading settings from {:?}", path);
    let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
        message: format!("Failed to read settings file {path:?}: {e}"),
    })?;
    parse_settings(&contents)
}

/// Loads settings from `RENEWAL_HUB_CONFIG` or `./renewal_hub.toml`.
pub fn load_default_settings() -> Result<Settings> {
    let path = std::env::var(SETTINGS_PATH_ENV).unwrap_or_else(|_| DEFAULT_SETTINGS_FILE.to_string());
    load_settings(path)
}

/// Reads the API token from the environment, if set.
#[must_use]
pub fn api_token() -> Option<String> {
    std::env::var(API_TOKEN_ENV).ok().filter(|t| !t.trim().is_empty())
}
