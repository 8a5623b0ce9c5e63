#![forbid(unsafe_code)]

//! Numerai terminal dashboard.
//!
//! This crate is the stable surface: it re-exports the core state and
//! callback types, the renderer, and (with the default `runtime` feature) the
//! orchestrator and its loops, plus a prelude for embedding.
//!
//! ```no_run
//! use numerdash::prelude::*;
//!
//! # fn main() -> numerdash::DashboardResult<()> {
//! let mut dashboard = Dashboard::builder(DashboardConfig::default()).build()?;
//! dashboard.run()
//! # }
//! ```

// --- Core re-exports -------------------------------------------------------

pub use numerdash_core::{
    AutoTriggerPolicy, ConfigError, DashboardConfig, DashboardError, DashboardHandle,
    DashboardResult, EventLog, EventLogEntry, FrameSnapshot, Instance, LoopSignal, NoOperations,
    OperationKind, OperationReporter, Operations, ProgressDetail, ProgressEntry, ProgressState,
    ProgressUpdate, Report, ReportOutcome, Severity, SharedState, SystemMetricsSnapshot,
    TriggerDecision,
};

// --- Render re-exports -----------------------------------------------------

pub use numerdash_render::{
    Color, FOOTER_ROWS, Frame, HEADER_ROWS, Line, StickyLayout, StickyRenderer, Style,
    TerminalCaps,
};

// --- Runtime re-exports ----------------------------------------------------

#[cfg(feature = "runtime")]
pub use numerdash_runtime::{
    ChannelKeySource, Dashboard, DashboardBuilder, FixedMetrics, FixedSize, KeyCode, KeyEvent,
    MetricsSource, PanelSource, SharedPanel, SizeSource, SysinfoMetrics,
};

// --- Prelude --------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        DashboardConfig, DashboardError, DashboardHandle, DashboardResult, Line, OperationKind,
        OperationReporter, Operations, Severity, Style,
    };

    #[cfg(feature = "runtime")]
    pub use crate::{Dashboard, PanelSource, SharedPanel};

    pub use crate::{core, render};

    #[cfg(feature = "runtime")]
    pub use crate::runtime;
}

pub use numerdash_core as core;
pub use numerdash_render as render;
#[cfg(feature = "runtime")]
pub use numerdash_runtime as runtime;
