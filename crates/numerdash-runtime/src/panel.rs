#![forbid(unsafe_code)]

//! Middle-region content providers.

use std::sync::{Arc, Mutex, PoisonError};

use numerdash_render::text::Line;

/// Supplies lines for the middle region (model and tournament panels).
///
/// Called once per frame on the render thread, outside the state lock, and
/// only when the middle region has rows and help is not showing.
pub trait PanelSource: Send {
    /// Lines for a region of `width` × `rows`. Extra lines are dropped.
    fn lines(&mut self, width: u16, rows: u16) -> Vec<Line>;
}

/// Panel whose content is replaced from another thread.
#[derive(Debug, Clone, Default)]
pub struct SharedPanel {
    lines: Arc<Mutex<Vec<Line>>>,
}

impl SharedPanel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the panel content.
    pub fn set(&self, lines: Vec<Line>) {
        *self.lines.lock().unwrap_or_else(PoisonError::into_inner) = lines;
    }
}

impl PanelSource for SharedPanel {
    fn lines(&mut self, _width: u16, rows: u16) -> Vec<Line> {
        let lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        lines.iter().take(usize::from(rows)).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_panel_is_truncated_to_rows() {
        let panel = SharedPanel::new();
        let mut reader = panel.clone();
        panel.set(vec![Line::plain("a"), Line::plain("b"), Line::plain("c")]);
        let lines = reader.lines(80, 2);
        assert_eq!(lines, vec![Line::plain("a"), Line::plain("b")]);
    }
}
