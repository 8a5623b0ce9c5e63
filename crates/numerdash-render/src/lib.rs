#![forbid(unsafe_code)]

//! Render: sticky layout, frame composition and the in-place terminal painter.

pub mod ansi;
pub mod bar;
pub mod caps;
pub mod frame;
pub mod layout;
pub mod sticky;
pub mod text;

pub use bar::{BarGlyphs, progress_bar};
pub use caps::TerminalCaps;
pub use frame::{Frame, FrameInput, compose};
pub use layout::{FOOTER_ROWS, HEADER_ROWS, StickyLayout};
pub use sticky::StickyRenderer;
pub use text::{Color, Line, Style};
