#![forbid(unsafe_code)]

//! Terminal capability detection.
//!
//! Detection is environment-only; nothing is written to the terminal to probe
//! it. When in doubt a feature is disabled: a plain frame is always readable,
//! a stray escape sequence is not.
//!
//! # Environment Variables
//!
//! - `NO_COLOR`: disables SGR colors
//! - `TERM`: `dumb` or empty disables escapes beyond cursor movement and
//!   switches glyphs to ASCII
//! - `TERM_PROGRAM`, `KITTY_WINDOW_ID`: synchronized-output support
//! - `TMUX`, `STY`, `ZELLIJ`: multiplexer detection
//!
//! # Mux Policy
//!
//! Inside a multiplexer, synchronized output and the DECSTBM scroll region
//! are not used. Passthrough of mode-setting sequences is unreliable there.

use std::env;
use std::io::{self, IsTerminal};

/// Terminals known to implement DEC 2026 synchronized output.
const SYNC_OUTPUT_TERMINALS: &[&str] = &["WezTerm", "Alacritty", "Ghostty", "kitty", "Contour"];

#[derive(Debug, Clone, Default)]
struct DetectInputs {
    no_color: bool,
    term: String,
    term_program: String,
    in_tmux: bool,
    in_screen: bool,
    in_zellij: bool,
    kitty_window_id: bool,
    stdout_tty: bool,
}

impl DetectInputs {
    fn from_env() -> Self {
        Self {
            no_color: env::var_os("NO_COLOR").is_some(),
            term: env::var("TERM").unwrap_or_default(),
            term_program: env::var("TERM_PROGRAM").unwrap_or_default(),
            in_tmux: env::var_os("TMUX").is_some(),
            in_screen: env::var_os("STY").is_some(),
            in_zellij: env::var_os("ZELLIJ").is_some(),
            kitty_window_id: env::var_os("KITTY_WINDOW_ID").is_some(),
            stdout_tty: io::stdout().is_terminal(),
        }
    }
}

/// What the output terminal can be trusted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalCaps {
    /// SGR colors and attributes.
    pub color: bool,
    /// Block and icon glyphs; ASCII fallbacks otherwise.
    pub unicode: bool,
    /// DEC 2026 synchronized output.
    pub sync_output: bool,
    /// DECSTBM scroll regions.
    pub scroll_region: bool,
    /// Running inside tmux.
    pub in_tmux: bool,
    /// Running inside GNU screen.
    pub in_screen: bool,
    /// Running inside Zellij.
    pub in_zellij: bool,
    /// Stdout is a terminal.
    pub is_tty: bool,
}

impl Default for TerminalCaps {
    fn default() -> Self {
        Self::plain()
    }
}

impl TerminalCaps {
    /// Detect capabilities from the environment and stdout.
    #[must_use]
    pub fn detect() -> Self {
        let caps = Self::detect_from_inputs(&DetectInputs::from_env());
        tracing::debug!(?caps, "terminal capabilities detected");
        caps
    }

    fn detect_from_inputs(env: &DetectInputs) -> Self {
        let term = env.term.as_str();
        let is_dumb = term == "dumb" || term.is_empty();
        let usable = env.stdout_tty && !is_dumb;
        let is_kitty = env.kitty_window_id || term.contains("kitty");

        let sync_output = usable
            && (is_kitty
                || SYNC_OUTPUT_TERMINALS
                    .iter()
                    .any(|t| env.term_program.contains(t)));

        Self {
            color: usable && !env.no_color,
            unicode: !is_dumb,
            sync_output,
            scroll_region: usable,
            in_tmux: env.in_tmux,
            in_screen: env.in_screen,
            in_zellij: env.in_zellij,
            is_tty: env.stdout_tty,
        }
    }

    /// No escapes beyond cursor movement; ASCII glyphs.
    #[must_use]
    pub const fn plain() -> Self {
        Self {
            color: false,
            unicode: false,
            sync_output: false,
            scroll_region: false,
            in_tmux: false,
            in_screen: false,
            in_zellij: false,
            is_tty: false,
        }
    }

    /// A typical modern terminal outside any multiplexer.
    #[must_use]
    pub const fn ansi() -> Self {
        Self {
            color: true,
            unicode: true,
            sync_output: false,
            scroll_region: true,
            in_tmux: false,
            in_screen: false,
            in_zellij: false,
            is_tty: true,
        }
    }

    /// Running inside any terminal multiplexer.
    #[must_use]
    #[inline]
    pub const fn in_any_mux(&self) -> bool {
        self.in_tmux || self.in_screen || self.in_zellij
    }

    /// Whether frames should be wrapped in synchronized output.
    #[must_use]
    #[inline]
    pub const fn use_sync_output(&self) -> bool {
        self.sync_output && !self.in_any_mux()
    }

    /// Whether the middle region should be pinned with DECSTBM.
    #[must_use]
    #[inline]
    pub const fn use_scroll_region(&self) -> bool {
        self.scroll_region && !self.in_any_mux()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(term: &str, term_program: &str) -> DetectInputs {
        DetectInputs {
            term: term.to_string(),
            term_program: term_program.to_string(),
            stdout_tty: true,
            ..Default::default()
        }
    }

    #[test]
    fn detect_does_not_panic() {
        let _caps = TerminalCaps::detect();
    }

    #[test]
    fn modern_terminal_gets_everything() {
        let caps = TerminalCaps::detect_from_inputs(&inputs("xterm-256color", "WezTerm"));
        assert!(caps.color);
        assert!(caps.unicode);
        assert!(caps.use_sync_output());
        assert!(caps.use_scroll_region());
    }

    #[test]
    fn no_color_keeps_layout_features() {
        let mut env = inputs("xterm-256color", "");
        env.no_color = true;
        let caps = TerminalCaps::detect_from_inputs(&env);
        assert!(!caps.color);
        assert!(caps.unicode);
        assert!(caps.scroll_region);
    }

    #[test]
    fn dumb_terminal_is_plain() {
        let caps = TerminalCaps::detect_from_inputs(&inputs("dumb", "WezTerm"));
        assert!(!caps.color);
        assert!(!caps.unicode);
        assert!(!caps.sync_output);
        assert!(!caps.scroll_region);
    }

    #[test]
    fn piped_stdout_is_plain() {
        let mut env = inputs("xterm-256color", "WezTerm");
        env.stdout_tty = false;
        let caps = TerminalCaps::detect_from_inputs(&env);
        assert!(!caps.color);
        assert!(!caps.use_scroll_region());
        assert!(!caps.is_tty);
    }

    #[test]
    fn mux_disables_sync_and_scroll_region() {
        let mut env = inputs("screen-256color", "WezTerm");
        env.in_tmux = true;
        let caps = TerminalCaps::detect_from_inputs(&env);
        assert!(caps.color);
        assert!(caps.in_any_mux());
        assert!(!caps.use_sync_output());
        assert!(!caps.use_scroll_region());
    }

    #[test]
    fn kitty_window_implies_sync() {
        let mut env = inputs("xterm", "");
        env.kitty_window_id = true;
        assert!(TerminalCaps::detect_from_inputs(&env).use_sync_output());
    }
}
