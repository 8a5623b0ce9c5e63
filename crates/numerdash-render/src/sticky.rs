#![forbid(unsafe_code)]

//! Sticky renderer: paints header and footer in place without disturbing
//! whatever is printed into the middle region.
//!
//! # Key Invariants
//!
//! 1. Cursor is saved before and restored after every frame (`CSI s`/`CSI u`),
//!    so external output keeps its position.
//! 2. A frame is built into one buffer and written with one `write_all` plus
//!    `flush`; a reader of the terminal never sees half a frame.
//! 3. One writer owns terminal output (enforced by ownership).
//! 4. The scroll region is reset on `exit` and on drop, including panics.

use std::io::{self, Write};

use crate::ansi::{
    CURSOR_RESTORE, CURSOR_SAVE, ERASE_LINE, RESET_SCROLL_REGION, SGR_RESET, SYNC_BEGIN, SYNC_END,
    cursor_position, set_scroll_region,
};
use crate::caps::TerminalCaps;
use crate::frame::Frame;
use crate::layout::StickyLayout;
use crate::text::Line;

/// Renderer owning the terminal writer.
pub struct StickyRenderer<W: Write> {
    writer: W,
    caps: TerminalCaps,
    layout: StickyLayout,
    scroll_region_set: bool,
    middle_painted: bool,
    entered: bool,
    buf: Vec<u8>,
}

impl<W: Write> std::fmt::Debug for StickyRenderer<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StickyRenderer")
            .field("caps", &self.caps)
            .field("layout", &self.layout)
            .field("scroll_region_set", &self.scroll_region_set)
            .field("entered", &self.entered)
            .finish_non_exhaustive()
    }
}

impl<W: Write> StickyRenderer<W> {
    /// Create a renderer. Nothing is written until [`enter`](Self::enter).
    pub fn new(writer: W, caps: TerminalCaps, layout: StickyLayout) -> Self {
        Self {
            writer,
            caps,
            layout,
            scroll_region_set: false,
            middle_painted: false,
            entered: false,
            buf: Vec::with_capacity(4096),
        }
    }

    /// Current layout.
    pub fn layout(&self) -> &StickyLayout {
        &self.layout
    }

    /// Capabilities in use.
    pub fn caps(&self) -> &TerminalCaps {
        &self.caps
    }

    /// Borrow the writer.
    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Mutably borrow the writer.
    pub fn writer_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Install the layout on the terminal.
    ///
    /// Pins the middle region with DECSTBM when the terminal supports it and
    /// parks the cursor at the bottom of that region so external prints
    /// scroll there.
    pub fn enter(&mut self) -> io::Result<()> {
        self.buf.clear();
        self.install_scroll_region();
        self.entered = true;
        self.flush_buf()
    }

    fn install_scroll_region(&mut self) {
        let top = self.layout.middle_top();
        let bottom = self.layout.middle_bottom();
        if self.caps.use_scroll_region() && bottom >= top && bottom > 0 {
            set_scroll_region(&mut self.buf, top, bottom);
            cursor_position(&mut self.buf, bottom, 1);
            self.scroll_region_set = true;
        } else if self.scroll_region_set {
            self.buf.extend_from_slice(RESET_SCROLL_REGION);
            self.scroll_region_set = false;
        }
    }

    /// Switch to a new terminal size. Returns whether the layout changed.
    ///
    /// The next [`present`](Self::present) repaints every region.
    pub fn resize(&mut self, layout: StickyLayout) -> io::Result<bool> {
        if layout == self.layout {
            return Ok(false);
        }
        tracing::debug!(
            width = layout.width,
            height = layout.height,
            degraded = layout.is_degraded(),
            "sticky layout changed"
        );
        self.layout = layout;
        self.middle_painted = false;
        if !self.entered {
            return Ok(true);
        }
        self.buf.clear();
        if self.scroll_region_set {
            self.buf.extend_from_slice(RESET_SCROLL_REGION);
            self.scroll_region_set = false;
        }
        self.install_scroll_region();
        self.flush_buf()?;
        Ok(true)
    }

    /// Paint one frame.
    ///
    /// A `None` middle leaves the middle region untouched, except that a
    /// region painted by the previous frame (help, panel) is cleared once.
    pub fn present(&mut self, frame: &Frame) -> io::Result<()> {
        let layout = self.layout;
        let width = usize::from(layout.width);
        let color = self.caps.color;
        self.buf.clear();

        let sync = self.caps.use_sync_output();
        if sync {
            self.buf.extend_from_slice(SYNC_BEGIN);
        }
        self.buf.extend_from_slice(CURSOR_SAVE);

        paint_rows(&mut self.buf, 1, &frame.header, width, color);

        match &frame.middle {
            Some(lines) => {
                paint_rows(&mut self.buf, layout.middle_top(), lines, width, color);
                self.middle_painted = true;
            }
            None if self.middle_painted => {
                let blank = vec![Line::new(); usize::from(layout.middle_rows)];
                paint_rows(&mut self.buf, layout.middle_top(), &blank, width, color);
                self.middle_painted = false;
            }
            None => {}
        }

        if layout.footer_rows > 0 {
            paint_rows(
                &mut self.buf,
                layout.footer_top(),
                &frame.footer,
                width,
                color,
            );
        }

        self.buf.extend_from_slice(CURSOR_RESTORE);
        if sync {
            self.buf.extend_from_slice(SYNC_END);
        }
        self.flush_buf()
    }

    fn flush_buf(&mut self) -> io::Result<()> {
        self.writer.write_all(&self.buf)?;
        self.writer.flush()
    }

    /// Restore the terminal: reset the scroll region and attributes.
    pub fn exit(&mut self) -> io::Result<()> {
        self.cleanup_internal()
    }

    fn cleanup_internal(&mut self) -> io::Result<()> {
        if !self.entered {
            return Ok(());
        }
        self.entered = false;
        self.buf.clear();
        if self.scroll_region_set {
            self.buf.extend_from_slice(RESET_SCROLL_REGION);
            self.scroll_region_set = false;
            // Leave the cursor below the footer so the shell prompt lands cleanly.
            cursor_position(&mut self.buf, self.layout.height.max(1), 1);
        }
        if self.caps.color {
            self.buf.extend_from_slice(SGR_RESET);
        }
        self.flush_buf()
    }
}

fn paint_rows(buf: &mut Vec<u8>, top: u16, lines: &[Line], width: usize, color: bool) {
    for (offset, line) in lines.iter().enumerate() {
        let Ok(offset) = u16::try_from(offset) else {
            break;
        };
        cursor_position(buf, top.saturating_add(offset), 1);
        buf.extend_from_slice(ERASE_LINE);
        line.write_clipped(buf, width, color);
    }
}

impl<W: Write> Drop for StickyRenderer<W> {
    fn drop(&mut self) {
        // Best-effort cleanup on drop (including panic)
        let _ = self.cleanup_internal();
    }
}
