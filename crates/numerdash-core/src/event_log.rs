#![forbid(unsafe_code)]

//! Bounded, append-only event log backing the sticky footer.

use std::collections::VecDeque;
use std::fmt;

use time::{OffsetDateTime, UtcOffset};

/// Default number of retained entries.
pub const DEFAULT_EVENT_LOG_CAPACITY: usize = 30;

/// Severity of an event log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Neutral information.
    Info,
    /// Something unexpected that did not stop anything.
    Warning,
    /// An operation failed.
    Error,
    /// An operation completed.
    Success,
}

impl Severity {
    /// Single-glyph icon shown before the message.
    #[must_use]
    pub const fn icon(self) -> &'static str {
        match self {
            Severity::Info => "ℹ",
            Severity::Warning => "⚠",
            Severity::Error => "✖",
            Severity::Success => "✔",
        }
    }

    /// ASCII fallback for the icon.
    #[must_use]
    pub const fn ascii_icon(self) -> &'static str {
        match self {
            Severity::Info => "i",
            Severity::Warning => "!",
            Severity::Error => "x",
            Severity::Success => "+",
        }
    }

    /// Lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Success => "success",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One timestamped footer line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLogEntry {
    timestamp: OffsetDateTime,
    severity: Severity,
    message: String,
}

impl EventLogEntry {
    /// Create an entry stamped with the current time at `offset`.
    pub fn new(offset: UtcOffset, severity: Severity, message: impl Into<String>) -> Self {
        let timestamp = OffsetDateTime::now_utc().to_offset(offset);
        Self::with_timestamp(timestamp, severity, message)
    }

    /// Create an entry with an explicit timestamp.
    pub fn with_timestamp(
        timestamp: OffsetDateTime,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            severity,
            message: message.into(),
        }
    }

    /// Wall-clock time of the entry.
    #[must_use]
    pub const fn timestamp(&self) -> OffsetDateTime {
        self.timestamp
    }

    /// Severity of the entry.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        self.severity
    }

    /// Message text.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// `HH:MM:SS` rendering of the timestamp.
    #[must_use]
    pub fn clock(&self) -> String {
        format!(
            "{:02}:{:02}:{:02}",
            self.timestamp.hour(),
            self.timestamp.minute(),
            self.timestamp.second()
        )
    }
}

/// Capacity-bounded chronological log.
///
/// Insertion order is chronological order. Once `capacity` is exceeded the
/// oldest entry is dropped. There is no other removal path.
#[derive(Debug, Clone)]
pub struct EventLog {
    entries: VecDeque<EventLogEntry>,
    capacity: usize,
    total_added: u64,
    offset: UtcOffset,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_LOG_CAPACITY)
    }
}

impl EventLog {
    /// Create a log holding at most `capacity` entries (minimum 1), stamped
    /// in the local time zone.
    ///
    /// The local offset is looked up once, here. On Unix that lookup fails
    /// once a second thread exists, so build the log before spawning any;
    /// otherwise entries fall back to UTC.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
        Self::with_offset(capacity, offset)
    }

    /// Create a log whose entries are stamped at `offset`.
    #[must_use]
    pub fn with_offset(capacity: usize, offset: UtcOffset) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            total_added: 0,
            offset,
        }
    }

    /// Offset new entries are stamped at.
    #[must_use]
    pub const fn offset(&self) -> UtcOffset {
        self.offset
    }

    /// Append an entry stamped now.
    pub fn add(&mut self, severity: Severity, message: impl Into<String>) {
        self.push(EventLogEntry::new(self.offset, severity, message));
    }

    /// Append a prepared entry.
    pub fn push(&mut self, entry: EventLogEntry) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
        self.total_added = self.total_added.saturating_add(1);
    }

    /// The last `min(k, len)` entries, oldest first.
    pub fn recent(&self, k: usize) -> impl Iterator<Item = &EventLogEntry> {
        let skip = self.entries.len().saturating_sub(k);
        self.entries.iter().skip(skip)
    }

    /// All retained entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &EventLogEntry> {
        self.entries.iter()
    }

    /// Most recent entry.
    #[must_use]
    pub fn last(&self) -> Option<&EventLogEntry> {
        self.entries.back()
    }

    /// Number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum retained entries.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries ever added, including evicted ones.
    #[must_use]
    pub const fn total_added(&self) -> u64 {
        self.total_added
    }
}
