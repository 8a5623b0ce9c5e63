#![forbid(unsafe_code)]

//! Runtime: the threads and terminal plumbing behind the dashboard.
//!
//! # Key Components
//!
//! - [`Dashboard`] - orchestrator that owns the render and input threads
//! - [`RenderLoop`] - cadence-driven frame painter
//! - [`InputLoop`] - raw single-key reader with a `/` command mode
//! - [`TerminalSession`] - raw mode, signal and panic cleanup guard
//! - [`MetricsSource`] / [`SizeSource`] / [`KeySource`] / [`PanelSource`] -
//!   seams for the real terminal and for tests

pub mod dashboard;
pub mod debug_trace;
pub mod input;
pub mod metrics;
pub mod panel;
pub mod render_loop;
pub mod terminal_session;

pub use dashboard::{Dashboard, DashboardBuilder};
pub use input::{
    ChannelKeySource, Command, CrosstermKeySource, INPUT_POLL_INTERVAL, InputHandler, InputLoop,
    KeyCode, KeyEvent, KeyPoll, KeySource, Modifiers, NullKeySource,
};
pub use metrics::{FixedMetrics, MetricsSource, SysinfoMetrics};
pub use panel::{PanelSource, SharedPanel};
pub use render_loop::{RenderLoop, cadence};
pub use terminal_session::{
    CrosstermSize, FixedSize, SessionOptions, SizeSource, TerminalSession,
};
