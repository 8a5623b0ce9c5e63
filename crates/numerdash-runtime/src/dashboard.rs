#![forbid(unsafe_code)]

//! Dashboard orchestrator.
//!
//! [`Dashboard`] owns the render thread, the input thread and the terminal
//! session. Collaborators talk to it through the
//! [`DashboardHandle`] and [`OperationReporter`]s it hands out.
//!
//! # Lifecycle
//!
//! - [`start`](Dashboard::start) enters raw mode when stdin and stdout are
//!   terminals, installs the sticky layout and spawns both threads. A second
//!   call does nothing.
//! - [`stop`](Dashboard::stop) clears `running`, stops the loop signal, joins
//!   both threads and restores the terminal. A second call does nothing;
//!   `Drop` calls it.
//! - [`run`](Dashboard::run) is start, wait for the signal to stop (quit key,
//!   SIGINT/SIGTERM, fatal error), stop.
//!
//! A stopped dashboard cannot be restarted; build a new one.

use std::any::Any;
use std::fmt;
use std::io::{self, IsTerminal};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use numerdash_core::{
    DashboardConfig, DashboardError, DashboardHandle, DashboardResult, LoopSignal, NoOperations,
    OperationKind, OperationReporter, Operations, Severity, SharedState,
};
use numerdash_render::{StickyLayout, StickyRenderer, TerminalCaps};

use crate::input::{CrosstermKeySource, InputLoop, KeySource, NullKeySource};
use crate::metrics::{MetricsSource, SysinfoMetrics};
use crate::panel::PanelSource;
use crate::render_loop::{Output, RenderLoop};
use crate::terminal_session::{CrosstermSize, SessionOptions, SizeSource, TerminalSession};

/// Size used until the first successful size query.
const FALLBACK_SIZE: (u16, u16) = (80, 24);

/// Parts consumed by `start`.
struct Parts {
    output: Option<Output>,
    size: Option<Box<dyn SizeSource>>,
    keys: Option<Box<dyn KeySource>>,
    metrics: Option<Box<dyn MetricsSource>>,
    panel: Option<Box<dyn PanelSource>>,
    caps: Option<TerminalCaps>,
}

/// Builder for [`Dashboard`].
///
/// Every source defaults to the real terminal: stdout, the crossterm size
/// and keyboard, and `sysinfo` metrics for `config.data_dir`.
pub struct DashboardBuilder {
    config: DashboardConfig,
    operations: Arc<dyn Operations>,
    parts: Parts,
}

impl fmt::Debug for DashboardBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DashboardBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DashboardBuilder {
    fn new(config: DashboardConfig) -> Self {
        Self {
            config,
            operations: Arc::new(NoOperations),
            parts: Parts {
                output: None,
                size: None,
                keys: None,
                metrics: None,
                panel: None,
                caps: None,
            },
        }
    }

    /// Paint into `output` instead of stdout. No terminal session is opened.
    #[must_use]
    pub fn output(mut self, output: impl io::Write + Send + 'static) -> Self {
        self.parts.output = Some(Box::new(output));
        self
    }

    #[must_use]
    pub fn size_source(mut self, size: impl SizeSource + 'static) -> Self {
        self.parts.size = Some(Box::new(size));
        self
    }

    /// Read keys from `keys`. Raw mode is not entered.
    #[must_use]
    pub fn key_source(mut self, keys: impl KeySource + 'static) -> Self {
        self.parts.keys = Some(Box::new(keys));
        self
    }

    #[must_use]
    pub fn metrics_source(mut self, metrics: impl MetricsSource + 'static) -> Self {
        self.parts.metrics = Some(Box::new(metrics));
        self
    }

    /// Content for the middle region.
    #[must_use]
    pub fn panel(mut self, panel: impl PanelSource + 'static) -> Self {
        self.parts.panel = Some(Box::new(panel));
        self
    }

    #[must_use]
    pub fn operations(mut self, operations: impl Operations + 'static) -> Self {
        self.operations = Arc::new(operations);
        self
    }

    /// Share an operations collaborator the caller keeps a handle to.
    #[must_use]
    pub fn operations_arc(mut self, operations: Arc<dyn Operations>) -> Self {
        self.operations = operations;
        self
    }

    /// Override capability detection.
    #[must_use]
    pub fn caps(mut self, caps: TerminalCaps) -> Self {
        self.parts.caps = Some(caps);
        self
    }

    /// Validate the configuration and build the dashboard.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::Config`] if the configuration is invalid.
    pub fn build(self) -> DashboardResult<Dashboard> {
        self.config.validate()?;
        let state = SharedState::from_config(&self.config);
        let handle = DashboardHandle::new(state, LoopSignal::new(), self.operations);
        tracing::debug!(
            auto_train = self.config.auto_train_after_download,
            required = self.config.required_download_ids.len(),
            "dashboard built"
        );
        Ok(Dashboard {
            handle,
            config: self.config,
            parts: Some(self.parts),
            render_thread: None,
            input_thread: None,
            session: None,
            stopped: false,
        })
    }
}

/// The running dashboard.
pub struct Dashboard {
    handle: DashboardHandle,
    config: DashboardConfig,
    parts: Option<Parts>,
    render_thread: Option<JoinHandle<()>>,
    input_thread: Option<JoinHandle<()>>,
    session: Option<TerminalSession>,
    stopped: bool,
}

impl fmt::Debug for Dashboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dashboard")
            .field("handle", &self.handle)
            .field("started", &self.parts.is_none())
            .field("stopped", &self.stopped)
            .finish_non_exhaustive()
    }
}

impl Dashboard {
    /// Start building a dashboard.
    #[must_use]
    pub fn builder(config: DashboardConfig) -> DashboardBuilder {
        DashboardBuilder::new(config)
    }

    /// Handle for collaborators.
    #[must_use]
    pub fn handle(&self) -> &DashboardHandle {
        &self.handle
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    /// Reporter for a non-download operation.
    #[must_use]
    pub fn reporter(&self, kind: OperationKind) -> OperationReporter {
        self.handle.reporter(kind)
    }

    /// Reporter for the download of dataset `id`.
    #[must_use]
    pub fn download_reporter(&self, id: impl Into<String>) -> OperationReporter {
        self.handle.download_reporter(id)
    }

    /// Whether `start` has run and nothing has stopped the dashboard since:
    /// no `stop`, quit key, signal or fatal error.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.parts.is_none() && !self.stopped && !self.handle.signal().is_stopped()
    }

    /// Spawn the render and input threads.
    ///
    /// # Errors
    ///
    /// Returns an error if a thread cannot be spawned or the state lock is
    /// unavailable.
    pub fn start(&mut self) -> DashboardResult<()> {
        if self.stopped {
            return Ok(());
        }
        let Some(parts) = self.parts.take() else {
            return Ok(());
        };
        let signal = self.handle.signal().clone();

        let on_terminal = parts.output.is_none() && io::stdout().is_terminal();
        let want_raw = on_terminal
            && parts.keys.is_none()
            && self.config.raw_input
            && io::stdin().is_terminal();

        let mut raw = false;
        if on_terminal && (want_raw || self.config.alternate_screen) {
            let options = SessionOptions {
                raw_mode: want_raw,
                alternate_screen: self.config.alternate_screen,
            };
            match TerminalSession::new(options, signal.clone()) {
                Ok(session) => {
                    raw = session.is_raw();
                    self.session = Some(session);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "terminal session setup failed");
                    self.handle.add_event(
                        Severity::Error,
                        format!("Raw keyboard input unavailable: {err}"),
                    );
                }
            }
        }

        let keys: Box<dyn KeySource> = match parts.keys {
            Some(keys) => keys,
            None if raw => Box::new(CrosstermKeySource),
            None => Box::new(NullKeySource),
        };
        let caps = parts.caps.unwrap_or_else(|| {
            if parts.output.is_some() {
                TerminalCaps::ansi()
            } else {
                TerminalCaps::detect()
            }
        });
        let output: Output = parts.output.unwrap_or_else(|| Box::new(io::stdout()));
        let mut size = parts.size.unwrap_or_else(|| Box::new(CrosstermSize));
        let (width, height) = size.size().unwrap_or(FALLBACK_SIZE);
        let metrics = parts
            .metrics
            .unwrap_or_else(|| Box::new(SysinfoMetrics::new(&self.config.data_dir)));

        self.handle.state().with_state(|s| {
            s.set_running(true);
            s.add_event(Severity::Info, "Dashboard started");
        })?;
        tracing::info!(width, height, raw, ?caps, "dashboard starting");

        let render = RenderLoop::new(
            self.handle.clone(),
            StickyRenderer::new(output, caps, StickyLayout::compute(width, height)),
            size,
            metrics,
            parts.panel,
            self.config.clone(),
        );
        self.render_thread = Some(
            thread::Builder::new()
                .name("numerdash-render".into())
                .spawn(move || render.run())?,
        );

        let input = InputLoop::new(keys, self.handle.clone());
        self.input_thread = Some(
            thread::Builder::new()
                .name("numerdash-input".into())
                .spawn(move || input.run())?,
        );
        Ok(())
    }

    /// Stop both loops and restore the terminal.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        if let Err(err) = self.handle.state().with_state(|s| s.set_running(false)) {
            tracing::warn!(error = %err, "could not clear running flag");
        }
        self.handle.signal().stop();

        join("input", self.input_thread.take());
        join("render", self.render_thread.take());
        self.session = None;
        tracing::info!("dashboard stopped");
    }

    /// Start, block until the signal stops, then stop.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::Stopped`] if a fatal error stopped the
    /// dashboard, or any error from [`start`](Self::start).
    pub fn run(&mut self) -> DashboardResult<()> {
        if let Err(err) = self.start() {
            self.stop();
            return Err(err);
        }
        self.handle.signal().wait_stopped();
        self.stop();
        match self.handle.signal().fatal_reason() {
            Some(reason) => Err(DashboardError::Stopped(reason)),
            None => Ok(()),
        }
    }

    /// Block new operations. Returns whether the flag changed.
    pub fn pause(&self) -> DashboardResult<bool> {
        self.set_paused(true)
    }

    /// Allow new operations again. Returns whether the flag changed.
    pub fn resume(&self) -> DashboardResult<bool> {
        self.set_paused(false)
    }

    fn set_paused(&self, paused: bool) -> DashboardResult<bool> {
        let changed = self.handle.state().with_state(|s| s.set_paused(paused))?;
        self.handle.signal().request_refresh();
        Ok(changed)
    }

    pub fn is_paused(&self) -> DashboardResult<bool> {
        self.handle.state().with_state(|s| s.is_paused())
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.stop();
    }
}

fn join(name: &str, handle: Option<JoinHandle<()>>) {
    let Some(handle) = handle else {
        return;
    };
    if let Err(payload) = handle.join() {
        tracing::error!(thread = name, "thread panicked: {}", panic_message(&*payload));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}
