#![forbid(unsafe_code)]

//! The render thread.
//!
//! Each frame:
//!
//! 1. In one critical section: expire stalled operations, pick the cadence,
//!    record it, and take a [`FrameSnapshot`](numerdash_core::FrameSnapshot).
//! 2. Outside the lock: sample metrics, query the size, fetch panel lines,
//!    compose and present.
//! 3. Sleep on the [`LoopSignal`](numerdash_core::LoopSignal) for the chosen
//!    interval; a refresh request or stop wakes it early.
//!
//! Terminal I/O failures skip the frame. The first failure in a streak adds
//! one `Error` event; the streak ends at the next successful frame. A lock
//! failure is fatal and stops the dashboard.

use std::fmt;
use std::io::{self, Write};
use std::time::{Duration, Instant};

use numerdash_core::{DashboardConfig, DashboardHandle, DashboardResult, Severity, Wake};
use numerdash_render::{FrameInput, StickyLayout, StickyRenderer, compose};

use crate::metrics::MetricsSource;
use crate::panel::PanelSource;
use crate::terminal_session::SizeSource;

/// Frame interval: the active rate while anything is active, else idle.
#[must_use]
pub fn cadence(any_active: bool, config: &DashboardConfig) -> Duration {
    if any_active {
        config.refresh_rate_active()
    } else {
        config.refresh_rate_idle()
    }
}

/// Writer type the render loop paints into.
pub type Output = Box<dyn Write + Send>;

/// Render thread body.
pub struct RenderLoop {
    handle: DashboardHandle,
    renderer: StickyRenderer<Output>,
    size: Box<dyn SizeSource>,
    metrics: Box<dyn MetricsSource>,
    panel: Option<Box<dyn PanelSource>>,
    config: DashboardConfig,
    io_failing: bool,
    frames: u64,
}

impl fmt::Debug for RenderLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderLoop")
            .field("renderer", &self.renderer)
            .field("io_failing", &self.io_failing)
            .field("frames", &self.frames)
            .finish_non_exhaustive()
    }
}

impl RenderLoop {
    pub fn new(
        handle: DashboardHandle,
        renderer: StickyRenderer<Output>,
        size: Box<dyn SizeSource>,
        metrics: Box<dyn MetricsSource>,
        panel: Option<Box<dyn PanelSource>>,
        config: DashboardConfig,
    ) -> Self {
        Self {
            handle,
            renderer,
            size,
            metrics,
            panel,
            config,
            io_failing: false,
            frames: 0,
        }
    }

    /// Frames presented so far.
    #[must_use]
    pub const fn frames(&self) -> u64 {
        self.frames
    }

    /// Paint until the signal stops, then paint a last frame and restore the
    /// terminal.
    pub fn run(mut self) {
        let signal = self.handle.signal().clone();
        if let Err(err) = self.renderer.enter() {
            self.io_failure("setup", &err);
        }

        loop {
            let interval = match self.render_once() {
                Ok(interval) => interval,
                Err(err) => {
                    self.handle.fatal(&err);
                    break;
                }
            };
            if signal.wait_timeout(interval) == Wake::Stopped {
                // Show the final state; the lock may be gone after a fatal stop.
                if signal.fatal_reason().is_none() {
                    let _ = self.render_once();
                }
                break;
            }
        }

        if let Err(err) = self.renderer.exit() {
            tracing::warn!(error = %err, "terminal restore failed");
        }
        tracing::debug!(frames = self.frames, "render loop exited");
    }

    /// Compose and present one frame. Returns the interval until the next.
    ///
    /// # Errors
    ///
    /// Only a state-lock failure is returned; terminal errors are absorbed.
    pub fn render_once(&mut self) -> DashboardResult<Duration> {
        let span = tracing::debug_span!("render_frame", frame = self.frames);
        let _guard = span.enter();
        let started = Instant::now();

        let config = &self.config;
        let (snapshot, interval) = self.handle.state().with_state(|s| {
            if let Some(after) = config.stale_after() {
                s.expire_stale(started, after);
            }
            let interval = cadence(s.progress().any_active(), config);
            s.set_refresh_interval(interval);
            (s.snapshot(), interval)
        })?;

        let metrics = self.metrics.sample();
        let (width, height) = match self.size.size() {
            Ok(size) => size,
            Err(err) => {
                self.io_failure("size query", &err);
                return Ok(interval);
            }
        };
        let layout = StickyLayout::compute(width, height);
        if let Err(err) = self.renderer.resize(layout) {
            self.io_failure("resize", &err);
            return Ok(interval);
        }

        let panel = match self.panel.as_mut() {
            Some(panel) if layout.middle_rows > 0 && !snapshot.show_help => {
                Some(panel.lines(layout.width, layout.middle_rows))
            }
            _ => None,
        };

        let frame = compose(
            &FrameInput {
                snapshot: &snapshot,
                metrics: &metrics,
                panel: panel.as_deref(),
                now: started,
            },
            &layout,
            self.renderer.caps(),
        );

        match self.renderer.present(&frame) {
            Ok(()) => {
                self.frames += 1;
                if self.io_failing {
                    self.io_failing = false;
                    tracing::info!("terminal output recovered");
                }
            }
            Err(err) => self.io_failure("write", &err),
        }

        crate::debug_trace!(
            "frame {} {}x{} in {}us, next in {}ms",
            self.frames,
            width,
            height,
            started.elapsed().as_micros(),
            interval.as_millis()
        );
        Ok(interval)
    }

    fn io_failure(&mut self, what: &str, err: &io::Error) {
        tracing::warn!(error = %err, what, "terminal I/O failed; frame skipped");
        if !self.io_failing {
            self.io_failing = true;
            self.handle
                .add_event(Severity::Error, format!("Terminal {what} failed: {err}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::FixedMetrics;
    use crate::terminal_session::FixedSize;
    use numerdash_core::{
        LoopSignal, NoOperations, OperationKind, Report, SharedState, SystemMetricsSnapshot,
    };
    use numerdash_render::TerminalCaps;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken pipe"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn handle(config: &DashboardConfig) -> DashboardHandle {
        DashboardHandle::new(
            SharedState::from_config(config),
            LoopSignal::new(),
            Arc::new(NoOperations),
        )
    }

    fn render_loop(handle: &DashboardHandle, out: Output, config: DashboardConfig) -> RenderLoop {
        RenderLoop::new(
            handle.clone(),
            StickyRenderer::new(out, TerminalCaps::ansi(), StickyLayout::compute(80, 24)),
            Box::new(FixedSize::new(80, 24)),
            Box::new(FixedMetrics(SystemMetricsSnapshot::default())),
            None,
            config,
        )
    }

    #[test]
    fn cadence_follows_activity() {
        let config = DashboardConfig::default();
        assert_eq!(cadence(false, &config), Duration::from_millis(750));
        assert_eq!(cadence(true, &config), Duration::from_millis(150));
    }

    #[test]
    fn frame_records_interval_and_paints() {
        let config = DashboardConfig::default();
        let h = handle(&config);
        let buf = SharedBuf::default();
        let mut rl = render_loop(&h, Box::new(buf.clone()), config);

        assert_eq!(rl.render_once().unwrap(), Duration::from_millis(750));
        h.report(OperationKind::Train, Report::start("model"));
        assert_eq!(rl.render_once().unwrap(), Duration::from_millis(150));
        assert_eq!(
            h.state().with_state(|s| s.refresh_interval()).unwrap(),
            Duration::from_millis(150)
        );
        assert_eq!(rl.frames(), 2);
        let out = String::from_utf8_lossy(&buf.0.lock().unwrap()).into_owned();
        assert!(out.contains("\x1b[s"));
        assert!(out.contains("\x1b[u"));
    }

    #[test]
    fn write_failures_log_once_per_streak() {
        let config = DashboardConfig::default();
        let h = handle(&config);
        let mut rl = render_loop(&h, Box::new(BrokenPipe), config);
        for _ in 0..5 {
            rl.render_once().unwrap();
        }
        let errors = h
            .state()
            .with_state(|s| {
                s.events()
                    .iter()
                    .filter(|e| e.severity() == Severity::Error)
                    .count()
            })
            .unwrap();
        assert_eq!(errors, 1);
        assert_eq!(rl.frames(), 0);
    }

    #[test]
    fn run_exits_on_stop_and_resets_scroll_region() {
        let config = DashboardConfig::default();
        let h = handle(&config);
        let buf = SharedBuf::default();
        let rl = render_loop(&h, Box::new(buf.clone()), config);
        let signal = h.signal().clone();
        let thread = std::thread::spawn(move || rl.run());
        std::thread::sleep(Duration::from_millis(30));
        signal.stop();
        thread.join().unwrap();
        let out = String::from_utf8_lossy(&buf.0.lock().unwrap()).into_owned();
        assert!(out.contains("\x1b[r"));
    }
}
