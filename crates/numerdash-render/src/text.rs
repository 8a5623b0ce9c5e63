#![forbid(unsafe_code)]

//! Styled text lines and width-aware truncation.

use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

use crate::ansi::{SGR_RESET, sgr};

bitflags::bitflags! {
    /// Text attribute flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Attrs: u8 {
        /// Bold / increased intensity.
        const BOLD    = 0b0000_0001;
        /// Dim / decreased intensity.
        const DIM     = 0b0000_0010;
        /// Reverse video.
        const REVERSE = 0b0000_0100;
    }
}

/// Foreground color from the basic 8-color palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Color {
    /// Terminal default.
    #[default]
    Default,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
}

impl Color {
    const fn sgr_code(self) -> Option<u8> {
        match self {
            Color::Default => None,
            Color::Red => Some(31),
            Color::Green => Some(32),
            Color::Yellow => Some(33),
            Color::Blue => Some(34),
            Color::Magenta => Some(35),
            Color::Cyan => Some(36),
        }
    }
}

/// Foreground color plus attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Style {
    pub fg: Color,
    pub attrs: Attrs,
}

impl Style {
    /// No color, no attributes.
    pub const PLAIN: Style = Style {
        fg: Color::Default,
        attrs: Attrs::empty(),
    };

    /// Plain style with a foreground color.
    #[must_use]
    pub const fn fg(color: Color) -> Self {
        Self {
            fg: color,
            attrs: Attrs::empty(),
        }
    }

    #[must_use]
    pub const fn bold(self) -> Self {
        Self {
            fg: self.fg,
            attrs: self.attrs.union(Attrs::BOLD),
        }
    }

    #[must_use]
    pub const fn dim(self) -> Self {
        Self {
            fg: self.fg,
            attrs: self.attrs.union(Attrs::DIM),
        }
    }

    #[must_use]
    pub const fn reverse(self) -> Self {
        Self {
            fg: self.fg,
            attrs: self.attrs.union(Attrs::REVERSE),
        }
    }

    /// Whether writing this style emits no SGR at all.
    #[must_use]
    pub fn is_plain(&self) -> bool {
        self.fg == Color::Default && self.attrs.is_empty()
    }

    fn write_sgr(&self, buf: &mut Vec<u8>) {
        let mut codes = [0u8; 4];
        let mut n = 0;
        for (flag, code) in [(Attrs::BOLD, 1), (Attrs::DIM, 2), (Attrs::REVERSE, 7)] {
            if self.attrs.contains(flag) {
                codes[n] = code;
                n += 1;
            }
        }
        if let Some(code) = self.fg.sgr_code() {
            codes[n] = code;
            n += 1;
        }
        sgr(buf, &codes[..n]);
    }
}

/// A run of text in one style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub style: Style,
}

/// One terminal row of styled spans.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Line {
    spans: Vec<Span>,
}

impl Line {
    /// Empty line.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Single unstyled span.
    #[must_use]
    pub fn plain(text: impl Into<String>) -> Self {
        Self::styled(text, Style::PLAIN)
    }

    /// Single styled span.
    #[must_use]
    pub fn styled(text: impl Into<String>, style: Style) -> Self {
        let mut line = Self::new();
        line.push(text, style);
        line
    }

    /// Append a span. Empty text is skipped.
    pub fn push(&mut self, text: impl Into<String>, style: Style) -> &mut Self {
        let text = text.into();
        if !text.is_empty() {
            self.spans.push(Span { text, style });
        }
        self
    }

    /// Append a span, builder style.
    #[must_use]
    pub fn with(mut self, text: impl Into<String>, style: Style) -> Self {
        self.push(text, style);
        self
    }

    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// Display width in cells.
    #[must_use]
    pub fn width(&self) -> usize {
        self.spans.iter().map(|s| s.text.width()).sum()
    }

    /// Concatenated text without styling.
    #[must_use]
    pub fn to_plain_string(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }

    /// Append the line to `buf`, clipped to `max_width` cells.
    ///
    /// Styles are emitted only when `color` is set; every styled span is
    /// followed by an SGR reset so nothing bleeds into the next row.
    pub fn write_clipped(&self, buf: &mut Vec<u8>, max_width: usize, color: bool) {
        let mut remaining = max_width;
        for span in &self.spans {
            if remaining == 0 {
                break;
            }
            let text = truncate_to_width(&span.text, remaining);
            remaining -= text.width();
            let styled = color && !span.style.is_plain();
            if styled {
                span.style.write_sgr(buf);
            }
            buf.extend_from_slice(text.as_bytes());
            if styled {
                buf.extend_from_slice(SGR_RESET);
            }
        }
    }
}

/// Longest prefix of `text` that fits in `max_width` cells.
///
/// Cuts on grapheme boundaries.
#[must_use]
pub fn truncate_to_width(text: &str, max_width: usize) -> &str {
    let mut width = 0;
    for (idx, grapheme) in text.grapheme_indices(true) {
        let w = grapheme.width();
        if width + w > max_width {
            return &text[..idx];
        }
        width += w;
    }
    text
}

/// Display width of `text` in cells.
#[inline]
#[must_use]
pub fn display_width(text: &str) -> usize {
    text.width()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_wide_chars() {
        assert_eq!(truncate_to_width("hello", 3), "hel");
        assert_eq!(truncate_to_width("日本語", 5), "日本");
        assert_eq!(truncate_to_width("abc", 10), "abc");
        assert_eq!(truncate_to_width("abc", 0), "");
    }

    #[test]
    fn clipped_write_without_color_is_plain_text() {
        let line = Line::plain("Status ").with("RUNNING", Style::fg(Color::Green).bold());
        let mut buf = Vec::new();
        line.write_clipped(&mut buf, 10, false);
        assert_eq!(buf, b"Status RUN");
    }

    #[test]
    fn colored_write_resets_after_each_span() {
        let line = Line::styled("ok", Style::fg(Color::Green).bold());
        let mut buf = Vec::new();
        line.write_clipped(&mut buf, 80, true);
        assert_eq!(buf, b"\x1b[1;32mok\x1b[0m");
    }

    #[test]
    fn empty_spans_are_dropped() {
        let line = Line::plain("").with("x", Style::PLAIN);
        assert_eq!(line.spans().len(), 1);
        assert_eq!(line.width(), 1);
    }
}
