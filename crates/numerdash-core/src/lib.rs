#![forbid(unsafe_code)]

//! Core: shared dashboard state, progress tracking, event log, auto-trigger
//! policy and the callback adapter used by background operations.

pub mod adapter;
pub mod auto_trigger;
pub mod config;
pub mod error;
pub mod event_log;
pub mod format;
pub mod metrics;
pub mod operations;
pub mod progress;
pub mod signal;
pub mod state;

pub use adapter::{DashboardHandle, OperationReporter};
pub use auto_trigger::{AutoTriggerPolicy, TriggerDecision};
pub use config::DashboardConfig;
pub use error::{ConfigError, DashboardError, DashboardResult};
pub use event_log::{EventLog, EventLogEntry, Severity};
pub use metrics::SystemMetricsSnapshot;
pub use operations::{NoOperations, Operations};
pub use progress::{OperationKind, ProgressDetail, ProgressEntry, ProgressState, ProgressUpdate};
pub use signal::{LoopSignal, Wake};
pub use state::{DashboardState, FrameSnapshot, Instance, Report, ReportOutcome, SharedState};
