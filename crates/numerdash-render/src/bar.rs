#![forbid(unsafe_code)]

//! Text progress bars: `[████████░░░░] 66.7%`.

/// Narrowest bar the layout will shrink to (inner cells).
pub const MIN_BAR_WIDTH: usize = 10;

/// Widest bar drawn (inner cells).
pub const MAX_BAR_WIDTH: usize = 40;

/// Glyph set used for the bar body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BarGlyphs {
    /// `█` and `░`.
    #[default]
    Unicode,
    /// `#` and `-`, for dumb terminals.
    Ascii,
}

impl BarGlyphs {
    const fn fill(self) -> char {
        match self {
            BarGlyphs::Unicode => '█',
            BarGlyphs::Ascii => '#',
        }
    }

    const fn empty(self) -> char {
        match self {
            BarGlyphs::Unicode => '░',
            BarGlyphs::Ascii => '-',
        }
    }
}

/// Number of filled cells for `percent` in a bar of `width` cells.
#[must_use]
pub fn filled_cells(percent: f64, width: usize) -> usize {
    let pct = if percent.is_finite() {
        percent.clamp(0.0, 100.0)
    } else {
        0.0
    };
    ((pct / 100.0) * width as f64).round() as usize
}

/// Render a bar with `width` inner cells followed by the percentage.
#[must_use]
pub fn progress_bar(percent: f64, width: usize, glyphs: BarGlyphs) -> String {
    let filled = filled_cells(percent, width).min(width);
    let pct = if percent.is_finite() {
        percent.clamp(0.0, 100.0)
    } else {
        0.0
    };
    let mut out = String::with_capacity(width * 3 + 10);
    out.push('[');
    out.extend(std::iter::repeat_n(glyphs.fill(), filled));
    out.extend(std::iter::repeat_n(glyphs.empty(), width - filled));
    out.push(']');
    out.push_str(&format!(" {pct:.1}%"));
    out
}
