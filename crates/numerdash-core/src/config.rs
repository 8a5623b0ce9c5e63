#![forbid(unsafe_code)]

//! Dashboard configuration.
//!
//! The loader that reads this from disk lives outside the core; the struct
//! derives `Deserialize` so any serde format can feed it. Missing fields take
//! their defaults.
//!
//! # Environment overrides
//!
//! | Variable | Field |
//! |----------|-------|
//! | `NUMERDASH_AUTO_TRAIN` | `auto_train_after_download` (`1`/`true`/`0`/`false`) |
//! | `NUMERDASH_REFRESH_IDLE_MS` | `refresh_rate_idle_ms` |
//! | `NUMERDASH_REFRESH_ACTIVE_MS` | `refresh_rate_active_ms` |
//! | `NUMERDASH_NO_RAW` | disables `raw_input` when set |

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::event_log::DEFAULT_EVENT_LOG_CAPACITY;

/// Dataset ids that must download before auto-training fires.
pub const DEFAULT_REQUIRED_DOWNLOADS: [&str; 3] = ["train", "validation", "live"];

/// Read-only dashboard settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Start training automatically once all required downloads complete.
    pub auto_train_after_download: bool,
    /// Dataset ids that gate the auto-trigger.
    pub required_download_ids: BTreeSet<String>,
    /// Frame interval while nothing is active.
    pub refresh_rate_idle_ms: u64,
    /// Frame interval while any operation is active.
    pub refresh_rate_active_ms: u64,
    /// Retained footer events.
    pub event_log_capacity: usize,
    /// Fail an active operation that has not reported for this long.
    pub stale_after_secs: Option<u64>,
    /// Read single keystrokes in raw mode when stdin is a terminal.
    pub raw_input: bool,
    /// Paint on the alternate screen instead of inline.
    pub alternate_screen: bool,
    /// Directory whose disk is reported in the metrics line.
    pub data_dir: PathBuf,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            auto_train_after_download: true,
            required_download_ids: DEFAULT_REQUIRED_DOWNLOADS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            refresh_rate_idle_ms: 750,
            refresh_rate_active_ms: 150,
            event_log_capacity: DEFAULT_EVENT_LOG_CAPACITY,
            stale_after_secs: Some(600),
            raw_input: true,
            alternate_screen: false,
            data_dir: PathBuf::from("."),
        }
    }
}

impl DashboardConfig {
    /// Idle frame interval.
    #[must_use]
    pub const fn refresh_rate_idle(&self) -> Duration {
        Duration::from_millis(self.refresh_rate_idle_ms)
    }

    /// Active frame interval.
    #[must_use]
    pub const fn refresh_rate_active(&self) -> Duration {
        Duration::from_millis(self.refresh_rate_active_ms)
    }

    /// Staleness threshold, if enabled.
    #[must_use]
    pub fn stale_after(&self) -> Option<Duration> {
        self.stale_after_secs.map(Duration::from_secs)
    }

    /// Set the required download ids.
    #[must_use]
    pub fn with_required_downloads(
        mut self,
        ids: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.required_download_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Set auto-training.
    #[must_use]
    pub fn with_auto_train(mut self, enabled: bool) -> Self {
        self.auto_train_after_download = enabled;
        self
    }

    /// Set both refresh intervals.
    #[must_use]
    pub fn with_refresh_rates(mut self, idle: Duration, active: Duration) -> Self {
        self.refresh_rate_idle_ms = duration_ms(idle);
        self.refresh_rate_active_ms = duration_ms(active);
        self
    }

    /// Set the event log capacity.
    #[must_use]
    pub fn with_event_log_capacity(mut self, capacity: usize) -> Self {
        self.event_log_capacity = capacity;
        self
    }

    /// Set or clear the staleness threshold.
    #[must_use]
    pub fn with_stale_after(mut self, after: Option<Duration>) -> Self {
        self.stale_after_secs = after.map(|d| d.as_secs().max(1));
        self
    }

    /// Enable or disable raw keyboard input.
    #[must_use]
    pub fn with_raw_input(mut self, enabled: bool) -> Self {
        self.raw_input = enabled;
        self
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_rate_active_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "refresh_rate_active_ms",
                reason: "must be greater than zero".into(),
            });
        }
        if self.refresh_rate_idle_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "refresh_rate_idle_ms",
                reason: "must be greater than zero".into(),
            });
        }
        if self.refresh_rate_idle_ms < self.refresh_rate_active_ms {
            return Err(ConfigError::Invalid {
                field: "refresh_rate_idle_ms",
                reason: format!(
                    "idle interval ({}ms) is shorter than active interval ({}ms)",
                    self.refresh_rate_idle_ms, self.refresh_rate_active_ms
                ),
            });
        }
        if self.event_log_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "event_log_capacity",
                reason: "must be at least 1".into(),
            });
        }
        if self.stale_after_secs == Some(0) {
            return Err(ConfigError::Invalid {
                field: "stale_after_secs",
                reason: "must be greater than zero when set".into(),
            });
        }
        Ok(())
    }

    /// Apply `NUMERDASH_*` environment overrides.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(v) = lookup("NUMERDASH_AUTO_TRAIN") {
            self.auto_train_after_download = parse_bool("NUMERDASH_AUTO_TRAIN", &v)?;
        }
        if let Some(v) = lookup("NUMERDASH_REFRESH_IDLE_MS") {
            self.refresh_rate_idle_ms = parse_ms("NUMERDASH_REFRESH_IDLE_MS", &v)?;
        }
        if let Some(v) = lookup("NUMERDASH_REFRESH_ACTIVE_MS") {
            self.refresh_rate_active_ms = parse_ms("NUMERDASH_REFRESH_ACTIVE_MS", &v)?;
        }
        if lookup("NUMERDASH_NO_RAW").is_some() {
            self.raw_input = false;
        }
        Ok(())
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn parse_bool(field: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim() {
        "1" => Ok(true),
        "0" => Ok(false),
        v if v.eq_ignore_ascii_case("true") => Ok(true),
        v if v.eq_ignore_ascii_case("false") => Ok(false),
        other => Err(ConfigError::Invalid {
            field,
            reason: format!("expected a boolean, got `{other}`"),
        }),
    }
}

fn parse_ms(field: &'static str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        field,
        reason: format!("expected milliseconds, got `{value}`"),
    })
}
