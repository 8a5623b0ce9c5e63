#![forbid(unsafe_code)]

//! Frame composition: turns a state snapshot plus metrics into the lines of
//! each sticky region.
//!
//! Composition is pure; it touches no terminal and holds no lock. Every
//! region is padded to exactly its row count so stale rows from the previous
//! frame are always overwritten.

use std::time::Instant;

use numerdash_core::event_log::{EventLogEntry, Severity};
use numerdash_core::format::{format_bytes, format_count, format_elapsed};
use numerdash_core::metrics::SystemMetricsSnapshot;
use numerdash_core::progress::{OperationKind, ProgressDetail, ProgressEntry};
use numerdash_core::state::FrameSnapshot;

use crate::bar::{BarGlyphs, progress_bar};
use crate::caps::TerminalCaps;
use crate::layout::StickyLayout;
use crate::text::{Color, Line, Style};

/// Key and command reference shown in the middle region.
pub const HELP_LINES: &[&str] = &[
    "Keys",
    "  q, Ctrl-C   quit              p, space   pause / resume",
    "  r           refresh now       h, ?       toggle this help",
    "  d           download data     t          train model",
    "  s           submit            n          new model wizard",
    "  /           command mode (Enter runs, Esc cancels)",
    "Commands",
    "  /quit /pause /resume /refresh /help /status",
    "  /download /train /submit /predict /new",
];

/// Everything one frame is composed from.
#[derive(Debug, Clone, Copy)]
pub struct FrameInput<'a> {
    pub snapshot: &'a FrameSnapshot,
    pub metrics: &'a SystemMetricsSnapshot,
    /// Panel content for the middle region, if a panel source is configured.
    pub panel: Option<&'a [Line]>,
    pub now: Instant,
}

/// Composed lines for each region.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame {
    /// Exactly `layout.header_rows` lines.
    pub header: Vec<Line>,
    /// Exactly `layout.middle_rows` lines, or `None` to leave the middle
    /// region to external output.
    pub middle: Option<Vec<Line>>,
    /// Exactly `layout.footer_rows` lines.
    pub footer: Vec<Line>,
}

/// Compose a frame for `layout`.
#[must_use]
pub fn compose(input: &FrameInput<'_>, layout: &StickyLayout, caps: &TerminalCaps) -> Frame {
    Frame {
        header: fit(header_lines(input, layout, caps), layout.header_rows),
        middle: middle_lines(input, layout),
        footer: footer_lines(input.snapshot, layout, caps),
    }
}

fn fit(mut lines: Vec<Line>, rows: u16) -> Vec<Line> {
    lines.resize(usize::from(rows), Line::new());
    lines
}

fn header_lines(input: &FrameInput<'_>, layout: &StickyLayout, caps: &TerminalCaps) -> Vec<Line> {
    let snap = input.snapshot;
    let mut lines = Vec::with_capacity(usize::from(layout.header_rows));
    lines.push(title_line(snap));
    lines.push(metrics_line(input.metrics, layout.is_narrow()));

    let bar_rows = usize::from(layout.bar_rows());
    if bar_rows == 0 {
        return lines;
    }
    let active: Vec<&ProgressEntry> = snap.progress.active().collect();
    if active.is_empty() {
        lines.push(Line::styled("No active operations", Style::PLAIN.dim()));
        return lines;
    }
    let glyphs = if caps.unicode {
        BarGlyphs::Unicode
    } else {
        BarGlyphs::Ascii
    };
    let shown = if active.len() > bar_rows {
        bar_rows - 1
    } else {
        active.len()
    };
    for entry in &active[..shown] {
        lines.push(bar_line(entry, layout, glyphs, input.now));
    }
    if shown < active.len() {
        lines.push(Line::styled(
            format!("+{} more active", active.len() - shown),
            Style::PLAIN.dim(),
        ));
    }
    lines
}

fn title_line(snap: &FrameSnapshot) -> Line {
    let (status, color) = match (snap.running, snap.paused) {
        (false, _) => ("STOPPED", Color::Red),
        (true, true) => ("PAUSED", Color::Yellow),
        (true, false) => ("RUNNING", Color::Green),
    };
    let mut line = Line::styled("Numerai Dashboard", Style::fg(Color::Cyan).bold());
    line.push("  ", Style::PLAIN)
        .push(format!("[{status}]"), Style::fg(color).bold());
    let auto = if snap.auto_train { "on" } else { "off" };
    line.push(
        format!(
            "  auto-train {auto} ({}/{})",
            snap.downloads_done, snap.downloads_required
        ),
        Style::PLAIN.dim(),
    );
    if snap.training_pending {
        line.push("  training queued", Style::fg(Color::Yellow));
    }
    line
}

fn metrics_line(m: &SystemMetricsSnapshot, narrow: bool) -> Line {
    if narrow {
        return Line::plain(format!(
            "CPU {:.0}%  MEM {:.0}%  DISK {:.0}%",
            m.cpu_percent,
            m.mem_percent(),
            m.disk_used_percent()
        ));
    }
    Line::plain(format!(
        "CPU {:.1}%  MEM {:.1}/{:.1} GB ({:.1}%)  DISK {:.1} GB free of {:.1} GB  UP {}",
        m.cpu_percent,
        m.mem_used_gb,
        m.mem_total_gb,
        m.mem_percent(),
        m.disk_free_gb,
        m.disk_total_gb,
        m.uptime_display()
    ))
}

const fn kind_color(kind: OperationKind) -> Color {
    match kind {
        OperationKind::Download => Color::Cyan,
        OperationKind::Upload => Color::Blue,
        OperationKind::Train => Color::Magenta,
        OperationKind::Predict => Color::Green,
    }
}

fn bar_line(
    entry: &ProgressEntry,
    layout: &StickyLayout,
    glyphs: BarGlyphs,
    now: Instant,
) -> Line {
    let kind = entry.kind();
    let mut line = Line::styled(format!("{:<9}", kind.title()), Style::PLAIN.bold());
    line.push(
        progress_bar(entry.percent(), layout.bar_width(), glyphs),
        Style::fg(kind_color(kind)),
    );
    if !entry.label().is_empty() {
        line.push(format!("  {}", entry.label()), Style::PLAIN);
    }
    if !layout.is_narrow() {
        let detail = detail_text(entry, now);
        if !detail.is_empty() {
            line.push(format!("  {detail}"), Style::PLAIN.dim());
        }
    }
    line
}

/// Kind-specific detail shown after the label, e.g. `1.24 GB / 2.00 GB · 12.3s`.
#[must_use]
pub fn detail_text(entry: &ProgressEntry, now: Instant) -> String {
    let mut parts: Vec<String> = Vec::new();
    match *entry.detail() {
        ProgressDetail::None => {}
        ProgressDetail::Transfer {
            current_bytes,
            total_bytes,
        } => {
            if total_bytes > 0 {
                parts.push(format!(
                    "{} / {}",
                    format_bytes(current_bytes),
                    format_bytes(total_bytes)
                ));
            } else {
                parts.push(format_bytes(current_bytes));
            }
        }
        ProgressDetail::Training {
            epoch,
            total_epochs,
            loss,
            validation_score,
        } => {
            parts.push(format!("epoch {epoch}/{total_epochs}"));
            if let Some(loss) = loss {
                parts.push(format!("loss {loss:.4}"));
            }
            if let Some(score) = validation_score {
                parts.push(format!("val {score:.4}"));
            }
        }
        ProgressDetail::Rows {
            rows_processed,
            total_rows,
        } => parts.push(format!(
            "{} / {} rows",
            format_count(rows_processed),
            format_count(total_rows)
        )),
    }
    if let Some(started) = entry.started_at() {
        parts.push(format_elapsed(now.saturating_duration_since(started)));
    }
    parts.join(" · ")
}

fn middle_lines(input: &FrameInput<'_>, layout: &StickyLayout) -> Option<Vec<Line>> {
    if layout.middle_rows == 0 {
        return None;
    }
    let lines = if input.snapshot.show_help {
        HELP_LINES
            .iter()
            .enumerate()
            .map(|(i, text)| {
                if text.starts_with(' ') {
                    Line::plain(*text)
                } else if i == 0 {
                    Line::styled(*text, Style::fg(Color::Cyan).bold())
                } else {
                    Line::styled(*text, Style::PLAIN.bold())
                }
            })
            .collect()
    } else {
        input.panel?.to_vec()
    };
    Some(fit(lines, layout.middle_rows))
}

fn footer_lines(snap: &FrameSnapshot, layout: &StickyLayout, caps: &TerminalCaps) -> Vec<Line> {
    if layout.footer_rows == 0 {
        return Vec::new();
    }
    let mut lines = Vec::with_capacity(usize::from(layout.footer_rows));
    lines.push(prompt_line(snap, caps));

    let rows = usize::from(layout.event_rows());
    let skip = snap.events.len().saturating_sub(rows);
    let shown = &snap.events[skip..];
    // Newest event sits on the bottom row.
    lines.resize(1 + rows - shown.len(), Line::new());
    lines.extend(shown.iter().map(|e| event_line(e, caps)));
    lines
}

fn prompt_line(snap: &FrameSnapshot, caps: &TerminalCaps) -> Line {
    match &snap.command_buffer {
        Some(buffer) => Line::styled("Command: ", Style::PLAIN.bold())
            .with(format!("/{buffer}"), Style::fg(Color::Cyan))
            .with("_", Style::PLAIN.reverse()),
        None => {
            let sep = if caps.unicode { " · " } else { " | " };
            let hints = ["q quit", "p pause", "h help", "/ command"].join(sep);
            Line::styled("Events", Style::PLAIN.bold())
                .with(format!("  {hints}"), Style::PLAIN.dim())
        }
    }
}

const fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Info => Color::Cyan,
        Severity::Warning => Color::Yellow,
        Severity::Error => Color::Red,
        Severity::Success => Color::Green,
    }
}

fn event_line(entry: &EventLogEntry, caps: &TerminalCaps) -> Line {
    let severity = entry.severity();
    let icon = if caps.unicode {
        severity.icon()
    } else {
        severity.ascii_icon()
    };
    let message_style = match severity {
        Severity::Error | Severity::Warning => Style::fg(severity_color(severity)),
        Severity::Info | Severity::Success => Style::PLAIN,
    };
    Line::styled(entry.clock(), Style::PLAIN.dim())
        .with(" ", Style::PLAIN)
        .with(icon, Style::fg(severity_color(severity)).bold())
        .with(" ", Style::PLAIN)
        .with(entry.message(), message_style)
}
