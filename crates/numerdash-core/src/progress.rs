#![forbid(unsafe_code)]

//! Per-kind progress tracking.
//!
//! Each [`OperationKind`] owns one [`ProgressEntry`]. Entries are mutated only
//! through the state's report entry point; everything here is `pub(crate)`
//! on the write side so that callers cannot bypass it.
//!
//! # Invariants
//!
//! 1. `percent` is always finite and within `[0, 100]`.
//! 2. Within one instance (start → complete) `percent` never decreases.
//! 3. Only `begin` resets `percent` to 0; it also bumps `generation`.
//! 4. An inactive entry keeps its last known percent (0, 100, or the value at
//!    failure).

use std::fmt;
use std::time::{Duration, Instant};

/// Category of a tracked background operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationKind {
    /// Dataset download.
    Download,
    /// Prediction upload / submission.
    Upload,
    /// Model training.
    Train,
    /// Prediction generation.
    Predict,
}

impl OperationKind {
    /// All kinds in display order.
    pub const ALL: [OperationKind; 4] = [
        OperationKind::Download,
        OperationKind::Upload,
        OperationKind::Train,
        OperationKind::Predict,
    ];

    /// Stable slot index.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            OperationKind::Download => 0,
            OperationKind::Upload => 1,
            OperationKind::Train => 2,
            OperationKind::Predict => 3,
        }
    }

    /// Lowercase name used in commands and logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            OperationKind::Download => "download",
            OperationKind::Upload => "upload",
            OperationKind::Train => "train",
            OperationKind::Predict => "predict",
        }
    }

    /// Short title used in the header.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            OperationKind::Download => "Download",
            OperationKind::Upload => "Upload",
            OperationKind::Train => "Train",
            OperationKind::Predict => "Predict",
        }
    }

    /// Past-tense verb for completion events.
    #[must_use]
    pub const fn past_tense(self) -> &'static str {
        match self {
            OperationKind::Download => "Downloaded",
            OperationKind::Upload => "Uploaded",
            OperationKind::Train => "Trained",
            OperationKind::Predict => "Predicted",
        }
    }

    /// Whether this kind moves bytes.
    #[must_use]
    pub const fn is_transfer(self) -> bool {
        matches!(self, OperationKind::Download | OperationKind::Upload)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed progress payload.
///
/// Each variant is valid only for the kinds listed in
/// [`ProgressUpdate::is_valid_for`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressUpdate {
    /// Bytes moved so far. `total_bytes == 0` means the size is unknown.
    Transfer {
        /// Bytes transferred.
        current_bytes: u64,
        /// Expected total bytes.
        total_bytes: u64,
    },
    /// Training epoch report.
    Training {
        /// Completed epochs.
        epoch: u32,
        /// Planned epochs.
        total_epochs: u32,
        /// Latest training loss.
        loss: Option<f64>,
        /// Latest validation score.
        validation_score: Option<f64>,
    },
    /// Prediction rows processed.
    Rows {
        /// Rows done.
        rows_processed: u64,
        /// Rows expected.
        total_rows: u64,
    },
    /// A bare percentage, for operations without natural units.
    Percent(f64),
}

impl ProgressUpdate {
    /// Whether this payload may be reported for `kind`.
    #[must_use]
    pub const fn is_valid_for(&self, kind: OperationKind) -> bool {
        match self {
            ProgressUpdate::Transfer { .. } => kind.is_transfer(),
            ProgressUpdate::Training { .. } => matches!(kind, OperationKind::Train),
            ProgressUpdate::Rows { .. } => matches!(kind, OperationKind::Predict),
            ProgressUpdate::Percent(_) => true,
        }
    }

    /// Percentage implied by this payload, if it implies one.
    #[must_use]
    pub fn implied_percent(&self) -> Option<f64> {
        let pct = match *self {
            ProgressUpdate::Transfer {
                current_bytes,
                total_bytes,
            } => ratio(current_bytes as f64, total_bytes as f64)?,
            ProgressUpdate::Training {
                epoch,
                total_epochs,
                ..
            } => ratio(f64::from(epoch), f64::from(total_epochs))?,
            ProgressUpdate::Rows {
                rows_processed,
                total_rows,
            } => ratio(rows_processed as f64, total_rows as f64)?,
            ProgressUpdate::Percent(p) => p,
        };
        pct.is_finite().then(|| pct.clamp(0.0, 100.0))
    }

    fn units(&self) -> Option<(f64, f64)> {
        match *self {
            ProgressUpdate::Transfer {
                current_bytes,
                total_bytes,
            } => Some((current_bytes as f64, total_bytes as f64)),
            ProgressUpdate::Training {
                epoch,
                total_epochs,
                ..
            } => Some((f64::from(epoch), f64::from(total_epochs))),
            ProgressUpdate::Rows {
                rows_processed,
                total_rows,
            } => Some((rows_processed as f64, total_rows as f64)),
            ProgressUpdate::Percent(_) => None,
        }
    }

    fn detail(&self) -> Option<ProgressDetail> {
        match *self {
            ProgressUpdate::Transfer {
                current_bytes,
                total_bytes,
            } => Some(ProgressDetail::Transfer {
                current_bytes,
                total_bytes,
            }),
            ProgressUpdate::Training {
                epoch,
                total_epochs,
                loss,
                validation_score,
            } => Some(ProgressDetail::Training {
                epoch,
                total_epochs,
                loss,
                validation_score,
            }),
            ProgressUpdate::Rows {
                rows_processed,
                total_rows,
            } => Some(ProgressDetail::Rows {
                rows_processed,
                total_rows,
            }),
            ProgressUpdate::Percent(_) => None,
        }
    }
}

fn ratio(current: f64, total: f64) -> Option<f64> {
    (total > 0.0).then(|| current / total * 100.0)
}

/// Kind-specific detail kept alongside the percent.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ProgressDetail {
    /// No detail reported yet.
    #[default]
    None,
    /// Latest transfer counters.
    Transfer {
        /// Bytes transferred.
        current_bytes: u64,
        /// Expected total bytes (0 = unknown).
        total_bytes: u64,
    },
    /// Latest training report.
    Training {
        /// Completed epochs.
        epoch: u32,
        /// Planned epochs.
        total_epochs: u32,
        /// Latest loss.
        loss: Option<f64>,
        /// Latest validation score.
        validation_score: Option<f64>,
    },
    /// Latest prediction counters.
    Rows {
        /// Rows done.
        rows_processed: u64,
        /// Rows expected.
        total_rows: u64,
    },
}

/// Result of applying a progress payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ApplyOutcome {
    /// Applied to an active instance.
    Applied,
    /// Applied even though no instance is active.
    AppliedInactive {
        /// First stale update since the entry went inactive.
        first: bool,
    },
    /// Payload does not belong to this kind; nothing changed.
    Mismatch,
}

/// Result of completing an entry.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FinishOutcome {
    /// The active instance completed.
    Completed {
        /// Time since `begin`.
        elapsed: Duration,
    },
    /// The entry was already inactive.
    AlreadyInactive,
}

/// Progress of one operation kind.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEntry {
    kind: OperationKind,
    active: bool,
    percent: f64,
    label: String,
    id: Option<String>,
    current_unit: f64,
    total_unit: f64,
    detail: ProgressDetail,
    generation: u64,
    started_at: Option<Instant>,
    last_update: Option<Instant>,
    stale_warned: bool,
}

impl ProgressEntry {
    fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            active: false,
            percent: 0.0,
            label: String::new(),
            id: None,
            current_unit: 0.0,
            total_unit: 0.0,
            detail: ProgressDetail::None,
            generation: 0,
            started_at: None,
            last_update: None,
            stale_warned: false,
        }
    }

    /// Kind tracked by this entry.
    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Whether an instance is running.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Percent in `[0, 100]`.
    #[must_use]
    pub const fn percent(&self) -> f64 {
        self.percent
    }

    /// Label supplied at start (file or model name).
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Identifier supplied at start (dataset id for downloads).
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Current unit counter (bytes, epochs or rows).
    #[must_use]
    pub const fn current_unit(&self) -> f64 {
        self.current_unit
    }

    /// Total unit counter.
    #[must_use]
    pub const fn total_unit(&self) -> f64 {
        self.total_unit
    }

    /// Kind-specific detail.
    #[must_use]
    pub const fn detail(&self) -> &ProgressDetail {
        &self.detail
    }

    /// Instance counter, bumped on every start.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Time the current instance started.
    #[must_use]
    pub const fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    /// Time of the most recent transition.
    #[must_use]
    pub const fn last_update(&self) -> Option<Instant> {
        self.last_update
    }

    pub(crate) fn begin(&mut self, label: String, id: Option<String>, now: Instant) -> u64 {
        self.generation = self.generation.wrapping_add(1);
        self.active = true;
        self.percent = 0.0;
        self.label = label;
        self.id = id;
        self.current_unit = 0.0;
        self.total_unit = 0.0;
        self.detail = ProgressDetail::None;
        self.started_at = Some(now);
        self.last_update = Some(now);
        self.stale_warned = false;
        self.generation
    }

    pub(crate) fn apply(&mut self, update: &ProgressUpdate, now: Instant) -> ApplyOutcome {
        if !update.is_valid_for(self.kind) {
            return ApplyOutcome::Mismatch;
        }
        if let Some(pct) = update.implied_percent() {
            self.percent = self.percent.max(pct);
        }
        if let Some((current, total)) = update.units() {
            self.current_unit = current;
            self.total_unit = total;
        }
        if let Some(detail) = update.detail() {
            self.detail = detail;
        }
        self.last_update = Some(now);

        if self.active {
            ApplyOutcome::Applied
        } else {
            let first = !self.stale_warned;
            self.stale_warned = true;
            ApplyOutcome::AppliedInactive { first }
        }
    }

    pub(crate) fn finish(&mut self, now: Instant) -> FinishOutcome {
        if !self.active {
            return FinishOutcome::AlreadyInactive;
        }
        self.active = false;
        self.percent = 100.0;
        if self.total_unit > 0.0 {
            self.current_unit = self.total_unit;
        }
        self.last_update = Some(now);
        let elapsed = self
            .started_at
            .map(|start| now.saturating_duration_since(start))
            .unwrap_or_default();
        FinishOutcome::Completed { elapsed }
    }

    /// Mark the entry inactive without completing it. Returns `false` if it
    /// was not active.
    pub(crate) fn abort(&mut self, now: Instant) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        self.last_update = Some(now);
        true
    }

    /// Whether the active instance has been silent for at least `after`.
    #[must_use]
    pub fn is_stale(&self, now: Instant, after: Duration) -> bool {
        self.active
            && self
                .last_update
                .is_some_and(|last| now.saturating_duration_since(last) >= after)
    }
}

/// Progress entries for all kinds.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressState {
    entries: [ProgressEntry; 4],
}

impl Default for ProgressState {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressState {
    /// Create a state with every kind inactive at 0%.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: OperationKind::ALL.map(ProgressEntry::new),
        }
    }

    /// Entry for `kind`.
    #[must_use]
    pub fn get(&self, kind: OperationKind) -> &ProgressEntry {
        &self.entries[kind.index()]
    }

    pub(crate) fn get_mut(&mut self, kind: OperationKind) -> &mut ProgressEntry {
        &mut self.entries[kind.index()]
    }

    /// Whether any kind is active.
    #[must_use]
    pub fn any_active(&self) -> bool {
        self.entries.iter().any(ProgressEntry::is_active)
    }

    /// Active entries in display order.
    pub fn active(&self) -> impl Iterator<Item = &ProgressEntry> {
        self.entries.iter().filter(|e| e.is_active())
    }

    /// All entries in display order.
    pub fn iter(&self) -> impl Iterator<Item = &ProgressEntry> {
        self.entries.iter()
    }
}
