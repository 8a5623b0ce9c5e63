#![forbid(unsafe_code)]

//! Terminal session lifecycle guard and size queries.
//!
//! [`TerminalSession`] owns raw-mode entry and exit and guarantees cleanup
//! even on panic.
//!
//! # Lifecycle Guarantees
//!
//! 1. Each mode (raw, alternate screen) has a flag and is undone only if it
//!    was actually enabled.
//! 2. Drop restores the terminal in reverse order of enabling.
//! 3. A panic hook runs the same cleanup best-effort, so a panicking thread
//!    never leaves the shell in raw mode with a pinned scroll region.
//! 4. On Unix, SIGINT/SIGTERM stop the dashboard through its [`LoopSignal`]
//!    (the orchestrator then restores the terminal) and SIGWINCH requests an
//!    immediate repaint.

use std::io::{self, Write};
use std::sync::OnceLock;

use numerdash_core::signal::LoopSignal;

#[cfg(unix)]
use signal_hook::consts::signal::{SIGINT, SIGTERM, SIGWINCH};
#[cfg(unix)]
use signal_hook::iterator::Signals;

/// Reset scroll region: CSI r.
const RESET_SCROLL_REGION: &[u8] = b"\x1b[r";

/// Which terminal modes a session enables.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Enter raw mode so single keystrokes arrive without Enter.
    pub raw_mode: bool,
    /// Paint on the alternate screen (`CSI ? 1049 h`).
    pub alternate_screen: bool,
}

/// RAII guard over terminal modes.
#[derive(Debug)]
pub struct TerminalSession {
    options: SessionOptions,
    raw_enabled: bool,
    alternate_screen_enabled: bool,
    #[cfg(unix)]
    signal_guard: Option<SignalGuard>,
}

impl TerminalSession {
    /// Enable the requested modes.
    ///
    /// # Errors
    ///
    /// Returns an error if raw mode or the alternate screen cannot be
    /// enabled. Whatever was enabled before the failure is undone.
    pub fn new(options: SessionOptions, signal: LoopSignal) -> io::Result<Self> {
        install_panic_hook();

        let mut session = Self {
            options: options.clone(),
            raw_enabled: false,
            alternate_screen_enabled: false,
            #[cfg(unix)]
            signal_guard: None,
        };

        if options.raw_mode {
            crossterm::terminal::enable_raw_mode()?;
            session.raw_enabled = true;
            tracing::info!("terminal raw mode enabled");
        }

        if options.alternate_screen {
            crossterm::execute!(io::stdout(), crossterm::terminal::EnterAlternateScreen)?;
            session.alternate_screen_enabled = true;
            tracing::info!("alternate screen enabled");
        }

        #[cfg(unix)]
        {
            session.signal_guard = Some(SignalGuard::new(signal)?);
        }
        #[cfg(not(unix))]
        let _ = signal;

        Ok(session)
    }

    /// Session options.
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Whether raw mode is on.
    pub fn is_raw(&self) -> bool {
        self.raw_enabled
    }

    fn cleanup(&mut self) {
        #[cfg(unix)]
        let _ = self.signal_guard.take();

        let mut stdout = io::stdout();
        let _ = stdout.write_all(RESET_SCROLL_REGION);
        let _ = crossterm::execute!(stdout, crossterm::cursor::Show);

        if self.alternate_screen_enabled {
            let _ = crossterm::execute!(stdout, crossterm::terminal::LeaveAlternateScreen);
            self.alternate_screen_enabled = false;
            tracing::info!("alternate screen disabled");
        }

        if self.raw_enabled {
            let _ = crossterm::terminal::disable_raw_mode();
            self.raw_enabled = false;
            tracing::info!("terminal raw mode disabled");
        }

        let _ = stdout.flush();
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn install_panic_hook() {
    static HOOK: OnceLock<()> = OnceLock::new();
    HOOK.get_or_init(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            best_effort_cleanup();
            previous(info);
        }));
    });
}

fn best_effort_cleanup() {
    let mut stdout = io::stdout();
    let _ = stdout.write_all(RESET_SCROLL_REGION);
    let _ = crossterm::execute!(stdout, crossterm::cursor::Show);
    let _ = crossterm::execute!(stdout, crossterm::terminal::LeaveAlternateScreen);
    let _ = crossterm::terminal::disable_raw_mode();
    let _ = stdout.flush();
}

#[cfg(unix)]
#[derive(Debug)]
struct SignalGuard {
    handle: signal_hook::iterator::Handle,
    thread: Option<std::thread::JoinHandle<()>>,
}

#[cfg(unix)]
impl SignalGuard {
    fn new(signal: LoopSignal) -> io::Result<Self> {
        let mut signals = Signals::new([SIGINT, SIGTERM, SIGWINCH]).map_err(io::Error::other)?;
        let handle = signals.handle();
        let thread = std::thread::Builder::new()
            .name("numerdash-signals".into())
            .spawn(move || {
                for sig in signals.forever() {
                    match sig {
                        SIGWINCH => {
                            tracing::debug!("SIGWINCH received");
                            signal.request_refresh();
                        }
                        SIGINT | SIGTERM => {
                            tracing::warn!(signal = sig, "termination signal received, stopping");
                            signal.stop();
                        }
                        _ => {}
                    }
                }
            })?;
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }
}

#[cfg(unix)]
impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Source of the terminal size in (columns, rows).
pub trait SizeSource: Send {
    /// Current size.
    fn size(&mut self) -> io::Result<(u16, u16)>;
}

/// Size queried from the controlling terminal.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrosstermSize;

impl SizeSource for CrosstermSize {
    fn size(&mut self) -> io::Result<(u16, u16)> {
        crossterm::terminal::size()
    }
}

/// Constant size, for tests and piped output.
#[derive(Debug, Clone, Copy)]
pub struct FixedSize {
    pub width: u16,
    pub height: u16,
}

impl FixedSize {
    #[must_use]
    pub const fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }
}

impl SizeSource for FixedSize {
    fn size(&mut self) -> io::Result<(u16, u16)> {
        Ok((self.width, self.height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_size_reports_dimensions() {
        let mut size = FixedSize::new(120, 40);
        assert_eq!(size.size().unwrap(), (120, 40));
    }

    #[test]
    fn default_options_enable_nothing() {
        let opts = SessionOptions::default();
        assert!(!opts.raw_mode);
        assert!(!opts.alternate_screen);
    }
}
