#![forbid(unsafe_code)]

//! Error types shared across the dashboard crates.

use std::fmt;
use std::time::Duration;

/// Errors raised by configuration validation or parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A field holds a value outside its accepted range.
    Invalid {
        /// Name of the offending field.
        field: &'static str,
        /// Human-readable reason.
        reason: String,
    },
    /// The configuration source could not be parsed.
    Parse(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Invalid { field, reason } => {
                write!(f, "invalid config field `{field}`: {reason}")
            }
            ConfigError::Parse(msg) => write!(f, "config parse error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Errors surfaced by the dashboard core and runtime.
#[derive(Debug)]
pub enum DashboardError {
    /// The shared state lock could not be acquired within the retry budget,
    /// or the lock was poisoned by a panicking holder.
    LockUnavailable {
        /// How long acquisition was attempted.
        waited: Duration,
        /// Whether the mutex was poisoned.
        poisoned: bool,
    },
    /// I/O error on the terminal or a configuration file.
    Io(std::io::Error),
    /// Configuration was rejected.
    Config(ConfigError),
    /// Terminal setup failed for a reason other than plain I/O.
    Terminal(String),
    /// The dashboard was stopped by a fatal error in one of its loops.
    Stopped(String),
}

impl DashboardError {
    /// Whether this error must stop the orchestrator.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, DashboardError::LockUnavailable { .. })
    }
}

impl fmt::Display for DashboardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DashboardError::LockUnavailable {
                poisoned: true, ..
            } => write!(f, "dashboard state lock poisoned"),
            DashboardError::LockUnavailable { waited, .. } => write!(
                f,
                "dashboard state lock unavailable after {}ms",
                waited.as_millis()
            ),
            DashboardError::Io(e) => write!(f, "I/O error: {e}"),
            DashboardError::Config(e) => write!(f, "{e}"),
            DashboardError::Terminal(msg) => write!(f, "terminal error: {msg}"),
            DashboardError::Stopped(reason) => write!(f, "dashboard stopped: {reason}"),
        }
    }
}

impl std::error::Error for DashboardError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DashboardError::Io(e) => Some(e),
            DashboardError::Config(e) => Some(e),
            DashboardError::LockUnavailable { .. }
            | DashboardError::Terminal(_)
            | DashboardError::Stopped(_) => None,
        }
    }
}

impl From<std::io::Error> for DashboardError {
    fn from(e: std::io::Error) -> Self {
        DashboardError::Io(e)
    }
}

impl From<ConfigError> for DashboardError {
    fn from(e: ConfigError) -> Self {
        DashboardError::Config(e)
    }
}

/// Result alias for dashboard operations.
pub type DashboardResult<T> = Result<T, DashboardError>;
