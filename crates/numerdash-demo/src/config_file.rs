#![forbid(unsafe_code)]

//! TOML configuration file.
//!
//! ```toml
//! [dashboard]
//! auto_train_after_download = true
//! required_download_ids = ["train", "validation", "live"]
//! refresh_rate_active_ms = 150
//! ```
//!
//! Missing tables and fields take their defaults.

use std::path::Path;

use numerdash::{ConfigError, DashboardConfig};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    dashboard: DashboardConfig,
}

/// Parse TOML text.
pub fn parse(text: &str) -> Result<DashboardConfig, ConfigError> {
    toml::from_str::<ConfigFile>(text)
        .map(|file| file.dashboard)
        .map_err(|err| ConfigError::Parse(err.to_string()))
}

/// Read and parse a file.
pub fn load(path: &Path) -> Result<DashboardConfig, ConfigError> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| ConfigError::Parse(format!("{}: {err}", path.display())))?;
    parse(&text).map_err(|err| match err {
        ConfigError::Parse(msg) => ConfigError::Parse(format!("{}: {msg}", path.display())),
        other => other,
    })
}
