#![forbid(unsafe_code)]

//! Sticky layout: header on top, footer at the bottom, scrollable middle.
//!
//! ```text
//!  row 1            ┌ header (HEADER_ROWS) ┐
//!  ...              │ title, metrics, bars │
//!  middle_top       ├ middle               ┤  pinned by DECSTBM; external
//!  ...              │                      │  prints scroll only here
//!  footer_top       ├ footer (FOOTER_ROWS) ┤
//!  height           └ prompt row + events  ┘
//! ```
//!
//! # Degradation
//!
//! When the terminal is shorter than the full layout the footer shrinks first
//! (down to [`MIN_FOOTER_ROWS`]) while the middle keeps [`MIN_MIDDLE_ROWS`];
//! below that the middle disappears, then the footer takes what is left.
//! The header shrinks last. Narrow terminals drop optional fields; see
//! [`StickyLayout::is_narrow`].

use crate::bar::{MAX_BAR_WIDTH, MIN_BAR_WIDTH};

/// Rows reserved for the header.
pub const HEADER_ROWS: u16 = 6;

/// Rows reserved for the footer (one prompt row plus events).
pub const FOOTER_ROWS: u16 = 9;

/// Smallest footer kept before the middle region gives way.
pub const MIN_FOOTER_ROWS: u16 = 2;

/// Smallest useful middle region.
pub const MIN_MIDDLE_ROWS: u16 = 3;

/// Below this width optional fields are dropped.
pub const NARROW_WIDTH: u16 = 60;

/// Columns a bar row spends outside the bar itself (kind, percent, spacing).
const BAR_ROW_OVERHEAD: u16 = 20;

/// Resolved region geometry for one terminal size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StickyLayout {
    /// Terminal width in columns.
    pub width: u16,
    /// Terminal height in rows.
    pub height: u16,
    /// Header rows actually used.
    pub header_rows: u16,
    /// Middle rows actually used (may be 0).
    pub middle_rows: u16,
    /// Footer rows actually used.
    pub footer_rows: u16,
}

impl StickyLayout {
    /// Compute the layout for a terminal of `width` × `height`.
    #[must_use]
    pub fn compute(width: u16, height: u16) -> Self {
        let header_rows = HEADER_ROWS.min(height);
        let rest = height - header_rows;
        let (footer_rows, middle_rows) = if rest >= FOOTER_ROWS + MIN_MIDDLE_ROWS {
            (FOOTER_ROWS, rest - FOOTER_ROWS)
        } else if rest >= MIN_FOOTER_ROWS + MIN_MIDDLE_ROWS {
            (rest - MIN_MIDDLE_ROWS, MIN_MIDDLE_ROWS)
        } else {
            (rest.min(FOOTER_ROWS), 0)
        };
        Self {
            width,
            height,
            header_rows,
            middle_rows,
            footer_rows,
        }
    }

    /// Whether any region is smaller than its full size.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        self.header_rows < HEADER_ROWS
            || self.footer_rows < FOOTER_ROWS
            || self.middle_rows < MIN_MIDDLE_ROWS
            || self.width < NARROW_WIDTH
    }

    /// Whether optional fields (detail text, metric extras) are dropped.
    #[must_use]
    pub const fn is_narrow(&self) -> bool {
        self.width < NARROW_WIDTH
    }

    /// First middle row (1-indexed).
    #[must_use]
    pub const fn middle_top(&self) -> u16 {
        self.header_rows + 1
    }

    /// Last middle row (1-indexed), or 0 when there is no middle region.
    #[must_use]
    pub const fn middle_bottom(&self) -> u16 {
        if self.middle_rows == 0 {
            0
        } else {
            self.header_rows + self.middle_rows
        }
    }

    /// First footer row (1-indexed).
    #[must_use]
    pub const fn footer_top(&self) -> u16 {
        self.height - self.footer_rows + 1
    }

    /// Rows available for events below the footer's prompt row.
    #[must_use]
    pub const fn event_rows(&self) -> u16 {
        self.footer_rows.saturating_sub(1)
    }

    /// Rows available for progress bars below the title and metrics rows.
    #[must_use]
    pub const fn bar_rows(&self) -> u16 {
        self.header_rows.saturating_sub(2)
    }

    /// Inner width of a progress bar at this terminal width.
    #[must_use]
    pub fn bar_width(&self) -> usize {
        let available = usize::from(self.width.saturating_sub(BAR_ROW_OVERHEAD));
        let target = if self.is_narrow() {
            available
        } else {
            available / 2
        };
        target.clamp(MIN_BAR_WIDTH, MAX_BAR_WIDTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_layout_on_standard_terminal() {
        let layout = StickyLayout::compute(80, 24);
        assert_eq!(layout.header_rows, 6);
        assert_eq!(layout.footer_rows, 9);
        assert_eq!(layout.middle_rows, 9);
        assert_eq!(layout.middle_top(), 7);
        assert_eq!(layout.middle_bottom(), 15);
        assert_eq!(layout.footer_top(), 16);
        assert!(!layout.is_degraded());
    }

    #[test]
    fn footer_shrinks_before_middle() {
        // rest = 10: footer gives up rows so the middle keeps its minimum.
        let layout = StickyLayout::compute(80, 16);
        assert_eq!(layout.middle_rows, MIN_MIDDLE_ROWS);
        assert_eq!(layout.footer_rows, 7);
        assert!(layout.is_degraded());
    }

    #[test]
    fn middle_disappears_when_too_short() {
        let layout = StickyLayout::compute(80, 10);
        assert_eq!(layout.middle_rows, 0);
        assert_eq!(layout.footer_rows, 4);
        assert_eq!(layout.middle_bottom(), 0);
        assert_eq!(layout.footer_top(), 7);
    }

    #[test]
    fn tiny_terminal_keeps_header_only() {
        let layout = StickyLayout::compute(20, 4);
        assert_eq!(layout.header_rows, 4);
        assert_eq!(layout.footer_rows, 0);
        assert_eq!(layout.middle_rows, 0);
        assert_eq!(layout.event_rows(), 0);
    }

    #[test]
    fn bar_width_is_bounded() {
        assert_eq!(StickyLayout::compute(20, 24).bar_width(), MIN_BAR_WIDTH);
        assert_eq!(StickyLayout::compute(300, 24).bar_width(), MAX_BAR_WIDTH);
        assert_eq!(StickyLayout::compute(80, 24).bar_width(), 30);
    }
}
