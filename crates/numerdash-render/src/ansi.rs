#![forbid(unsafe_code)]

//! ANSI escape sequences used by the sticky renderer.
//!
//! Sequences are appended to a caller-owned buffer so a whole frame can be
//! written with one `write_all`.

use std::io::Write;

/// Save cursor position: CSI s.
pub const CURSOR_SAVE: &[u8] = b"\x1b[s";

/// Restore cursor position: CSI u.
pub const CURSOR_RESTORE: &[u8] = b"\x1b[u";

/// Erase entire line: CSI 2 K.
pub const ERASE_LINE: &[u8] = b"\x1b[2K";

/// Reset scroll region to full screen: CSI r.
pub const RESET_SCROLL_REGION: &[u8] = b"\x1b[r";

/// Synchronized output begin (DEC 2026): CSI ? 2026 h.
pub const SYNC_BEGIN: &[u8] = b"\x1b[?2026h";

/// Synchronized output end (DEC 2026): CSI ? 2026 l.
pub const SYNC_END: &[u8] = b"\x1b[?2026l";

/// Reset all SGR attributes.
pub const SGR_RESET: &[u8] = b"\x1b[0m";

/// Move the cursor to `row`, `col` (1-indexed): CSI row ; col H.
pub fn cursor_position(buf: &mut Vec<u8>, row: u16, col: u16) {
    // Writing into a Vec cannot fail.
    let _ = write!(buf, "\x1b[{row};{col}H");
}

/// Set scroll region (DECSTBM): CSI top ; bottom r (1-indexed, inclusive).
pub fn set_scroll_region(buf: &mut Vec<u8>, top: u16, bottom: u16) {
    let _ = write!(buf, "\x1b[{top};{bottom}r");
}

/// Write an SGR sequence with the given parameter codes.
pub fn sgr(buf: &mut Vec<u8>, codes: &[u8]) {
    if codes.is_empty() {
        return;
    }
    buf.extend_from_slice(b"\x1b[");
    for (i, code) in codes.iter().enumerate() {
        if i > 0 {
            buf.push(b';');
        }
        let _ = write!(buf, "{code}");
    }
    buf.push(b'm');
}
