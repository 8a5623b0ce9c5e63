#![forbid(unsafe_code)]

//! Keyboard input: key sources, command parsing and the input loop.
//!
//! The input loop never writes to the terminal. Every key either mutates the
//! shared state (pause, help, command buffer), calls into the operations
//! collaborator through the [`DashboardHandle`], or appends an event; then it
//! asks the render loop for a repaint.
//!
//! # Key map
//!
//! | Key | Action |
//! |-----|--------|
//! | `q`, Ctrl-C | quit |
//! | `p`, space | pause toggle |
//! | `r` | refresh |
//! | `h`, `?` | help toggle |
//! | `d` / `t` / `s` / `n` | download / train / submit / new model |
//! | `/` | command mode |

use std::fmt;
use std::io;
use std::str::FromStr;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use bitflags::bitflags;
use crossterm::event as cte;
use numerdash_core::{DashboardHandle, DashboardResult, Severity};

/// Bound on a single key poll; the stop signal is checked between polls.
pub const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// A key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    /// Key with no modifiers.
    #[must_use]
    pub const fn new(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: Modifiers::NONE,
        }
    }

    /// Plain character key.
    #[must_use]
    pub const fn char(c: char) -> Self {
        Self::new(KeyCode::Char(c))
    }

    #[must_use]
    pub const fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Ctrl-C.
    #[must_use]
    pub fn is_interrupt(&self) -> bool {
        self.modifiers.contains(Modifiers::CTRL)
            && matches!(self.code, KeyCode::Char('c' | 'C'))
    }
}

/// Key identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCode {
    Char(char),
    Enter,
    Escape,
    Backspace,
    Tab,
    Up,
    Down,
    Left,
    Right,
    /// Any key the dashboard has no use for.
    Other,
}

impl fmt::Display for KeyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Char(' ') => f.write_str("space"),
            Self::Char(c) => write!(f, "{c}"),
            Self::Enter => f.write_str("enter"),
            Self::Escape => f.write_str("esc"),
            Self::Backspace => f.write_str("backspace"),
            Self::Tab => f.write_str("tab"),
            Self::Up => f.write_str("up"),
            Self::Down => f.write_str("down"),
            Self::Left => f.write_str("left"),
            Self::Right => f.write_str("right"),
            Self::Other => f.write_str("special key"),
        }
    }
}

bitflags! {
    /// Modifier keys held during a key press.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        const NONE  = 0b0000;
        const SHIFT = 0b0001;
        const ALT   = 0b0010;
        const CTRL  = 0b0100;
        const SUPER = 0b1000;
    }
}

/// Result of one key poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPoll {
    Key(KeyEvent),
    /// Nothing arrived within the timeout.
    Timeout,
    /// The terminal was resized.
    Resize,
    /// The source will never produce another key.
    Closed,
}

/// Where keys come from.
pub trait KeySource: Send {
    /// Wait at most `timeout` for the next key.
    fn next_key(&mut self, timeout: Duration) -> io::Result<KeyPoll>;
}

/// Keys read from the terminal through crossterm. Requires raw mode.
#[derive(Debug, Default)]
pub struct CrosstermKeySource;

impl KeySource for CrosstermKeySource {
    fn next_key(&mut self, timeout: Duration) -> io::Result<KeyPoll> {
        if !cte::poll(timeout)? {
            return Ok(KeyPoll::Timeout);
        }
        Ok(match cte::read()? {
            cte::Event::Key(key) if key.kind != cte::KeyEventKind::Release => {
                KeyPoll::Key(map_key_event(key))
            }
            cte::Event::Resize(..) => KeyPoll::Resize,
            _ => KeyPoll::Timeout,
        })
    }
}

fn map_key_event(event: cte::KeyEvent) -> KeyEvent {
    KeyEvent {
        code: map_key_code(event.code),
        modifiers: map_modifiers(event.modifiers),
    }
}

fn map_key_code(code: cte::KeyCode) -> KeyCode {
    match code {
        cte::KeyCode::Char(c) => KeyCode::Char(c),
        cte::KeyCode::Enter => KeyCode::Enter,
        cte::KeyCode::Esc => KeyCode::Escape,
        cte::KeyCode::Backspace => KeyCode::Backspace,
        cte::KeyCode::Tab => KeyCode::Tab,
        cte::KeyCode::Up => KeyCode::Up,
        cte::KeyCode::Down => KeyCode::Down,
        cte::KeyCode::Left => KeyCode::Left,
        cte::KeyCode::Right => KeyCode::Right,
        _ => KeyCode::Other,
    }
}

fn map_modifiers(modifiers: cte::KeyModifiers) -> Modifiers {
    let mut out = Modifiers::NONE;
    if modifiers.contains(cte::KeyModifiers::SHIFT) {
        out |= Modifiers::SHIFT;
    }
    if modifiers.contains(cte::KeyModifiers::ALT) {
        out |= Modifiers::ALT;
    }
    if modifiers.contains(cte::KeyModifiers::CONTROL) {
        out |= Modifiers::CTRL;
    }
    if modifiers.contains(cte::KeyModifiers::SUPER) {
        out |= Modifiers::SUPER;
    }
    out
}

/// Keys delivered over a channel, for tests and embedding.
#[derive(Debug)]
pub struct ChannelKeySource {
    rx: Receiver<KeyEvent>,
}

impl ChannelKeySource {
    #[must_use]
    pub fn new(rx: Receiver<KeyEvent>) -> Self {
        Self { rx }
    }

    /// A connected sender and source.
    #[must_use]
    pub fn channel() -> (Sender<KeyEvent>, Self) {
        let (tx, rx) = mpsc::channel();
        (tx, Self::new(rx))
    }
}

impl KeySource for ChannelKeySource {
    fn next_key(&mut self, timeout: Duration) -> io::Result<KeyPoll> {
        match self.rx.recv_timeout(timeout) {
            Ok(key) => Ok(KeyPoll::Key(key)),
            Err(RecvTimeoutError::Timeout) => Ok(KeyPoll::Timeout),
            Err(RecvTimeoutError::Disconnected) => Ok(KeyPoll::Closed),
        }
    }
}

/// No keyboard: the source is closed from the start.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullKeySource;

impl KeySource for NullKeySource {
    fn next_key(&mut self, _timeout: Duration) -> io::Result<KeyPoll> {
        Ok(KeyPoll::Closed)
    }
}

/// A dashboard action, from an instant key or a `/` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Quit,
    TogglePause,
    Pause,
    Resume,
    Refresh,
    Help,
    Download,
    Train,
    Submit,
    Predict,
    NewModel,
    Status,
}

impl Command {
    /// Instant-key binding.
    #[must_use]
    pub fn from_key(key: KeyEvent) -> Option<Self> {
        if key.is_interrupt() {
            return Some(Self::Quit);
        }
        if key
            .modifiers
            .intersects(Modifiers::CTRL | Modifiers::ALT | Modifiers::SUPER)
        {
            return None;
        }
        let KeyCode::Char(c) = key.code else {
            return None;
        };
        Some(match c {
            'q' => Self::Quit,
            'p' | ' ' => Self::TogglePause,
            'r' => Self::Refresh,
            'h' | '?' => Self::Help,
            'd' => Self::Download,
            't' => Self::Train,
            's' => Self::Submit,
            'n' => Self::NewModel,
            _ => return None,
        })
    }

    /// Commands that start work; refused while paused.
    #[must_use]
    pub const fn is_initiating(self) -> bool {
        matches!(
            self,
            Self::Download | Self::Train | Self::Submit | Self::Predict | Self::NewModel
        )
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Quit => "quit",
            Self::TogglePause => "pause toggle",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Refresh => "refresh",
            Self::Help => "help",
            Self::Download => "download",
            Self::Train => "train",
            Self::Submit => "submit",
            Self::Predict => "predict",
            Self::NewModel => "new",
            Self::Status => "status",
        }
    }
}

/// A command-mode line that names no command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCommand(pub String);

impl fmt::Display for UnknownCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown command: /{}", self.0)
    }
}

impl std::error::Error for UnknownCommand {}

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let word = s.trim().trim_start_matches('/');
        Ok(match word.to_ascii_lowercase().as_str() {
            "quit" | "exit" | "q" => Self::Quit,
            "pause" => Self::Pause,
            "resume" => Self::Resume,
            "refresh" => Self::Refresh,
            "help" => Self::Help,
            "download" => Self::Download,
            "train" => Self::Train,
            "submit" => Self::Submit,
            "predict" => Self::Predict,
            "new" => Self::NewModel,
            "status" => Self::Status,
            _ => return Err(UnknownCommand(word.to_string())),
        })
    }
}

/// Key-to-action state machine.
///
/// Holds the command-mode buffer and mirrors it into the shared state so the
/// footer can show the prompt.
#[derive(Debug)]
pub struct InputHandler {
    handle: DashboardHandle,
    command: Option<String>,
}

impl InputHandler {
    #[must_use]
    pub fn new(handle: DashboardHandle) -> Self {
        Self {
            handle,
            command: None,
        }
    }

    /// Whether command mode is open.
    #[must_use]
    pub fn in_command_mode(&self) -> bool {
        self.command.is_some()
    }

    /// Handle one key press.
    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.is_interrupt() {
            self.close_command_mode();
            self.execute(Command::Quit);
            return;
        }
        if self.command.is_some() {
            self.command_mode_key(key);
        } else if key.code == KeyCode::Char('/') {
            self.command = Some(String::new());
            self.sync_buffer();
        } else if let Some(command) = Command::from_key(key) {
            self.execute(command);
        } else {
            self.handle.add_event(
                Severity::Warning,
                format!("Unknown key: {} (h for help)", key.code),
            );
            self.handle.signal().request_refresh();
        }
    }

    fn command_mode_key(&mut self, key: KeyEvent) {
        let Some(buffer) = self.command.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Escape => self.close_command_mode(),
            KeyCode::Enter => {
                let line = std::mem::take(buffer);
                self.close_command_mode();
                if line.trim().is_empty() {
                    return;
                }
                match line.parse::<Command>() {
                    Ok(command) => self.execute(command),
                    Err(unknown) => {
                        self.handle.add_event(Severity::Warning, unknown.to_string());
                        self.handle.signal().request_refresh();
                    }
                }
            }
            KeyCode::Backspace => {
                if buffer.pop().is_none() {
                    self.close_command_mode();
                } else {
                    self.sync_buffer();
                }
            }
            KeyCode::Char(c) if !key.modifiers.intersects(Modifiers::CTRL | Modifiers::ALT) => {
                buffer.push(c);
                self.sync_buffer();
            }
            _ => {}
        }
    }

    fn close_command_mode(&mut self) {
        if self.command.take().is_some() {
            self.sync_buffer();
        }
    }

    fn sync_buffer(&self) {
        let buffer = self.command.clone();
        self.with_state(|s| s.set_command_buffer(buffer));
        self.handle.signal().request_refresh();
    }

    fn with_state(&self, f: impl FnOnce(&mut numerdash_core::DashboardState)) {
        let result: DashboardResult<()> = self.handle.state().with_state(f);
        if let Err(err) = result {
            self.handle.fatal(&err);
        }
    }

    /// Run one command.
    pub fn execute(&mut self, command: Command) {
        tracing::debug!(command = command.name(), "input command");
        if command.is_initiating() {
            let paused = self.handle.state().with_state(|s| s.is_paused());
            match paused {
                Ok(true) => {
                    self.handle.add_event(
                        Severity::Warning,
                        format!("Paused: {} refused (p to resume)", command.name()),
                    );
                    self.handle.signal().request_refresh();
                    return;
                }
                Ok(false) => {}
                Err(err) => {
                    self.handle.fatal(&err);
                    return;
                }
            }
        }

        match command {
            Command::Quit => {
                self.with_state(|s| {
                    s.add_event(Severity::Info, "Quitting");
                    s.set_running(false);
                });
                self.handle.signal().stop();
            }
            Command::TogglePause => self.with_state(|s| {
                s.toggle_pause();
            }),
            Command::Pause => self.with_state(|s| {
                if !s.set_paused(true) {
                    s.add_event(Severity::Info, "Already paused");
                }
            }),
            Command::Resume => self.with_state(|s| {
                if !s.set_paused(false) {
                    s.add_event(Severity::Info, "Not paused");
                }
            }),
            Command::Refresh => {}
            Command::Help => self.with_state(|s| {
                s.toggle_help();
            }),
            Command::Download => {
                self.handle.start_download();
            }
            Command::Train => {
                self.handle.start_training();
            }
            Command::Submit => {
                self.handle.start_submit();
            }
            Command::Predict => {
                self.handle.start_prediction();
            }
            Command::NewModel => self.handle.new_model_wizard(),
            Command::Status => self.with_state(|s| {
                let line = s.status_line();
                s.add_event(Severity::Info, line);
            }),
        }
        self.handle.signal().request_refresh();
    }
}

/// The keyboard thread body.
pub struct InputLoop {
    source: Box<dyn KeySource>,
    handler: InputHandler,
}

impl fmt::Debug for InputLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputLoop")
            .field("handler", &self.handler)
            .finish_non_exhaustive()
    }
}

impl InputLoop {
    #[must_use]
    pub fn new(source: Box<dyn KeySource>, handle: DashboardHandle) -> Self {
        Self {
            source,
            handler: InputHandler::new(handle),
        }
    }

    /// Poll keys until the signal stops or the source closes.
    ///
    /// A read error is reported once and ends keyboard input; the dashboard
    /// keeps rendering.
    pub fn run(mut self) {
        let signal = self.handler.handle.signal().clone();
        while !signal.is_stopped() {
            match self.source.next_key(INPUT_POLL_INTERVAL) {
                Ok(KeyPoll::Key(key)) => self.handler.handle_key(key),
                Ok(KeyPoll::Resize) => signal.request_refresh(),
                Ok(KeyPoll::Timeout) => {}
                Ok(KeyPoll::Closed) => {
                    tracing::debug!("key source closed; input loop exiting");
                    return;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "keyboard read failed; input disabled");
                    self.handler.handle.add_event(
                        Severity::Error,
                        format!("Keyboard input disabled: {err}"),
                    );
                    signal.request_refresh();
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use numerdash_core::{DashboardConfig, LoopSignal, NoOperations, SharedState};
    use std::sync::Arc;

    fn handle() -> DashboardHandle {
        DashboardHandle::new(
            SharedState::from_config(&DashboardConfig::default()),
            LoopSignal::new(),
            Arc::new(NoOperations),
        )
    }

    fn last_event(handle: &DashboardHandle) -> String {
        handle
            .state()
            .with_state(|s| s.events().last().map(|e| e.message().to_string()))
            .unwrap()
            .unwrap_or_default()
    }

    #[test]
    fn parses_commands_and_aliases() {
        assert_eq!("quit".parse::<Command>(), Ok(Command::Quit));
        assert_eq!("/exit".parse::<Command>(), Ok(Command::Quit));
        assert_eq!(" Status ".parse::<Command>(), Ok(Command::Status));
        assert_eq!("new".parse::<Command>(), Ok(Command::NewModel));
        assert_eq!(
            "bogus".parse::<Command>(),
            Err(UnknownCommand("bogus".into()))
        );
    }

    #[test]
    fn instant_keys_map() {
        assert_eq!(Command::from_key(KeyEvent::char('q')), Some(Command::Quit));
        assert_eq!(
            Command::from_key(KeyEvent::char(' ')),
            Some(Command::TogglePause)
        );
        assert_eq!(
            Command::from_key(KeyEvent::char('c').with_modifiers(Modifiers::CTRL)),
            Some(Command::Quit)
        );
        assert_eq!(Command::from_key(KeyEvent::char('x')), None);
        assert_eq!(Command::from_key(KeyEvent::new(KeyCode::Up)), None);
    }

    #[test]
    fn unknown_key_warns() {
        let h = handle();
        let mut input = InputHandler::new(h.clone());
        input.handle_key(KeyEvent::char('x'));
        assert_eq!(last_event(&h), "Unknown key: x (h for help)");
        assert!(!h.signal().is_stopped());
    }

    #[test]
    fn command_mode_edits_and_dispatches() {
        let h = handle();
        let mut input = InputHandler::new(h.clone());
        input.handle_key(KeyEvent::char('/'));
        assert!(input.in_command_mode());
        for c in "pausx".chars() {
            input.handle_key(KeyEvent::char(c));
        }
        input.handle_key(KeyEvent::new(KeyCode::Backspace));
        input.handle_key(KeyEvent::char('e'));
        let buffer = h
            .state()
            .with_state(|s| s.command_buffer().map(str::to_string))
            .unwrap();
        assert_eq!(buffer.as_deref(), Some("pause"));

        input.handle_key(KeyEvent::new(KeyCode::Enter));
        assert!(!input.in_command_mode());
        assert!(h.state().with_state(|s| s.is_paused()).unwrap());
        assert_eq!(
            h.state()
                .with_state(|s| s.command_buffer().map(str::to_string))
                .unwrap(),
            None
        );
    }

    #[test]
    fn escape_cancels_without_dispatch() {
        let h = handle();
        let mut input = InputHandler::new(h.clone());
        input.handle_key(KeyEvent::char('/'));
        input.handle_key(KeyEvent::char('q'));
        input.handle_key(KeyEvent::new(KeyCode::Escape));
        assert!(!input.in_command_mode());
        assert!(!h.signal().is_stopped());
    }

    #[test]
    fn unknown_command_warns() {
        let h = handle();
        let mut input = InputHandler::new(h.clone());
        input.handle_key(KeyEvent::char('/'));
        for c in "frobnicate".chars() {
            input.handle_key(KeyEvent::char(c));
        }
        input.handle_key(KeyEvent::new(KeyCode::Enter));
        assert_eq!(last_event(&h), "Unknown command: /frobnicate");
    }

    #[test]
    fn paused_refuses_initiating_commands() {
        let h = handle();
        let mut input = InputHandler::new(h.clone());
        input.handle_key(KeyEvent::char('p'));
        input.handle_key(KeyEvent::char('d'));
        assert_eq!(last_event(&h), "Paused: download refused (p to resume)");
        input.execute(Command::Resume);
        input.execute(Command::Resume);
        assert_eq!(last_event(&h), "Not paused");
    }

    #[test]
    fn quit_key_stops_signal() {
        let h = handle();
        let mut input = InputHandler::new(h.clone());
        h.state().with_state(|s| s.set_running(true)).unwrap();
        input.handle_key(KeyEvent::char('q'));
        assert!(h.signal().is_stopped());
        assert!(!h.state().with_state(|s| s.is_running()).unwrap());
        assert_eq!(last_event(&h), "Quitting");
    }

    #[test]
    fn status_logs_summary() {
        let h = handle();
        let mut input = InputHandler::new(h.clone());
        input.execute(Command::Status);
        assert!(last_event(&h).starts_with("Status: idle; datasets 0/3"));
    }

    #[test]
    fn closed_source_ends_loop() {
        let h = handle();
        let (tx, source) = ChannelKeySource::channel();
        drop(tx);
        InputLoop::new(Box::new(source), h.clone()).run();
        assert!(!h.signal().is_stopped());
    }

    struct FailingSource;

    impl KeySource for FailingSource {
        fn next_key(&mut self, _timeout: Duration) -> io::Result<KeyPoll> {
            Err(io::Error::other("tty gone"))
        }
    }

    #[test]
    fn read_error_logs_once_and_exits() {
        let h = handle();
        InputLoop::new(Box::new(FailingSource), h.clone()).run();
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
        assert_eq!(last_event(&h), "Keyboard input disabled: tty gone");
    }
}
