#![forbid(unsafe_code)]

//! Composite dashboard state and its shared handle.
//!
//! [`DashboardState`] owns progress, the event log, the auto-trigger policy
//! and the orchestrator flags. It is only ever reached through
//! [`SharedState`], whose accessors acquire the mutex with a bounded retry
//! and run one closure per critical section. A render snapshot taken through
//! [`SharedState::snapshot`] therefore never observes half of a report.
//!
//! Nothing in this module calls out to collaborators; follow-up actions such
//! as starting training are returned to the caller so they can run after the
//! lock is released.

use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::thread;
use std::time::{Duration, Instant};

use crate::auto_trigger::{AutoTriggerPolicy, TriggerDecision};
use crate::config::DashboardConfig;
use crate::error::{DashboardError, DashboardResult};
use crate::event_log::{EventLog, EventLogEntry, Severity};
use crate::format::{format_bytes, format_count, format_elapsed};
use crate::progress::{
    ApplyOutcome, FinishOutcome, OperationKind, ProgressDetail, ProgressEntry, ProgressState,
    ProgressUpdate,
};

/// Longest time a caller waits for the state lock before giving up.
pub const LOCK_RETRY_BUDGET: Duration = Duration::from_secs(2);

const MIN_BACKOFF: Duration = Duration::from_micros(50);
const MAX_BACKOFF: Duration = Duration::from_millis(10);

/// One phase transition reported by a background operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    /// A new instance started.
    Start {
        /// File or model name shown next to the bar.
        label: String,
        /// Dataset id for downloads; feeds the auto-trigger on completion.
        id: Option<String>,
    },
    /// Intermediate progress.
    Progress(ProgressUpdate),
    /// An instance finished successfully.
    Complete {
        /// Which instance; `None` means whichever one is current.
        instance: Option<Instance>,
    },
    /// An instance failed.
    Failed {
        /// Error description.
        error: String,
        /// Which instance; `None` means whichever one is current.
        instance: Option<Instance>,
    },
}

/// One started instance of an operation, as its reporter remembers it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    /// Generation returned by the instance's `Start`.
    pub generation: u64,
    /// Label it started with.
    pub label: String,
    /// Dataset id, for downloads.
    pub id: Option<String>,
}

impl Report {
    /// Start without an id.
    pub fn start(label: impl Into<String>) -> Self {
        Report::Start {
            label: label.into(),
            id: None,
        }
    }

    /// Start a dataset download identified by `id`.
    pub fn start_with_id(label: impl Into<String>, id: impl Into<String>) -> Self {
        Report::Start {
            label: label.into(),
            id: Some(id.into()),
        }
    }

    /// Completion of the current instance.
    pub const fn complete() -> Self {
        Report::Complete { instance: None }
    }

    /// Completion of a specific instance.
    pub fn complete_instance(instance: Instance) -> Self {
        Report::Complete {
            instance: Some(instance),
        }
    }

    /// Failure of the current instance.
    pub fn failed(error: impl Into<String>) -> Self {
        Report::Failed {
            error: error.into(),
            instance: None,
        }
    }

    /// Failure of a specific instance.
    pub fn failed_instance(instance: Instance, error: impl Into<String>) -> Self {
        Report::Failed {
            error: error.into(),
            instance: Some(instance),
        }
    }
}

/// What a report changed that the caller may need to act on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReportOutcome {
    /// Generation of the entry after the report.
    pub generation: u64,
    /// Auto-trigger decision, for download completions only.
    pub trigger: Option<TriggerDecision>,
}

impl ReportOutcome {
    /// Whether the caller must start training now.
    #[must_use]
    pub fn should_start_training(&self) -> bool {
        self.trigger == Some(TriggerDecision::Fire)
    }
}

/// Immutable copy of everything a frame paints.
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    /// Progress of every kind.
    pub progress: ProgressState,
    /// Retained events, oldest first.
    pub events: Vec<EventLogEntry>,
    /// Orchestrator running flag.
    pub running: bool,
    /// Pause flag.
    pub paused: bool,
    /// Help overlay flag.
    pub show_help: bool,
    /// Whether a training run has been requested but not yet started.
    pub training_pending: bool,
    /// Open command-mode buffer, without the leading `/`.
    pub command_buffer: Option<String>,
    /// Auto-training flag.
    pub auto_train: bool,
    /// Required downloads completed in this cycle.
    pub downloads_done: usize,
    /// Required downloads in a cycle.
    pub downloads_required: usize,
}

impl FrameSnapshot {
    /// Whether any operation is active.
    #[must_use]
    pub fn any_active(&self) -> bool {
        self.progress.any_active()
    }
}

/// The dashboard's composite root.
#[derive(Debug, Clone)]
pub struct DashboardState {
    progress: ProgressState,
    events: EventLog,
    trigger: AutoTriggerPolicy,
    running: bool,
    paused: bool,
    show_help: bool,
    training_pending: bool,
    refresh_interval: Duration,
    command_buffer: Option<String>,
}

impl DashboardState {
    /// Build the initial state from configuration.
    #[must_use]
    pub fn new(config: &DashboardConfig) -> Self {
        Self {
            progress: ProgressState::new(),
            events: EventLog::new(config.event_log_capacity),
            trigger: AutoTriggerPolicy::new(
                config.required_download_ids.iter().cloned(),
                config.auto_train_after_download,
            ),
            running: false,
            paused: false,
            show_help: false,
            training_pending: false,
            refresh_interval: config.refresh_rate_idle(),
            command_buffer: None,
        }
    }

    /// Progress of all kinds.
    #[must_use]
    pub fn progress(&self) -> &ProgressState {
        &self.progress
    }

    /// Footer events.
    #[must_use]
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Auto-trigger policy, including the completion set.
    #[must_use]
    pub fn trigger(&self) -> &AutoTriggerPolicy {
        &self.trigger
    }

    /// Whether the orchestrator is running.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Whether new operations are blocked.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    /// Whether the help overlay is showing.
    #[must_use]
    pub const fn show_help(&self) -> bool {
        self.show_help
    }

    /// Whether a training run is scheduled but has not reported `start`.
    #[must_use]
    pub const fn training_pending(&self) -> bool {
        self.training_pending
    }

    /// Whether training is running or about to run.
    #[must_use]
    pub fn training_busy(&self) -> bool {
        self.training_pending || self.progress.get(OperationKind::Train).is_active()
    }

    /// Interval the render loop is currently sleeping for.
    #[must_use]
    pub const fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Open command-mode buffer.
    #[must_use]
    pub fn command_buffer(&self) -> Option<&str> {
        self.command_buffer.as_deref()
    }

    /// Append a footer event and mirror it to the log.
    pub fn add_event(&mut self, severity: Severity, message: impl Into<String>) {
        let message = message.into();
        match severity {
            Severity::Error => tracing::error!(event = %message, "dashboard event"),
            Severity::Warning => tracing::warn!(event = %message, "dashboard event"),
            Severity::Info | Severity::Success => {
                tracing::info!(severity = %severity, event = %message, "dashboard event");
            }
        }
        self.events.add(severity, message);
    }

    /// Apply one operation transition.
    pub fn report(&mut self, kind: OperationKind, report: Report, now: Instant) -> ReportOutcome {
        match report {
            Report::Start { label, id } => self.on_start(kind, label, id, now),
            Report::Progress(update) => self.on_progress(kind, &update, now),
            Report::Complete { instance } => match instance {
                Some(instance) if self.is_superseded(kind, &instance) => {
                    self.on_superseded_complete(kind, &instance)
                }
                instance => self.on_complete(kind, instance.and_then(|i| i.id), now),
            },
            Report::Failed { error, instance } => match instance {
                Some(instance) if self.is_superseded(kind, &instance) => {
                    self.on_superseded_failure(kind, &instance, &error)
                }
                _ => self.on_failed(kind, &error, now),
            },
        }
    }

    fn on_start(
        &mut self,
        kind: OperationKind,
        label: String,
        id: Option<String>,
        now: Instant,
    ) -> ReportOutcome {
        if kind == OperationKind::Train {
            self.training_pending = false;
        }
        let entry = self.progress.get_mut(kind);
        if entry.is_active() {
            tracing::warn!(
                kind = %kind,
                previous = %entry.label(),
                "start while active; previous instance superseded"
            );
        }
        let generation = entry.begin(label, id, now);
        let message = start_message(self.progress.get(kind));
        self.add_event(Severity::Info, message);
        ReportOutcome {
            generation,
            trigger: None,
        }
    }

    fn on_progress(
        &mut self,
        kind: OperationKind,
        update: &ProgressUpdate,
        now: Instant,
    ) -> ReportOutcome {
        let entry = self.progress.get_mut(kind);
        let generation = entry.generation();
        match entry.apply(update, now) {
            ApplyOutcome::Applied => {
                tracing::trace!(kind = %kind, percent = entry.percent(), "progress");
            }
            ApplyOutcome::AppliedInactive { first } => {
                tracing::warn!(kind = %kind, "progress reported while inactive");
                if first {
                    self.add_event(
                        Severity::Warning,
                        format!("{} progress received while idle", kind.title()),
                    );
                }
            }
            ApplyOutcome::Mismatch => {
                self.add_event(
                    Severity::Warning,
                    format!(
                        "Ignored {} progress payload for {kind}",
                        payload_name(update)
                    ),
                );
            }
        }
        ReportOutcome {
            generation,
            trigger: None,
        }
    }

    fn is_superseded(&self, kind: OperationKind, instance: &Instance) -> bool {
        self.progress.get(kind).generation() != instance.generation
    }

    fn on_complete(
        &mut self,
        kind: OperationKind,
        reported_id: Option<String>,
        now: Instant,
    ) -> ReportOutcome {
        let entry = self.progress.get_mut(kind);
        let generation = entry.generation();
        let elapsed = match entry.finish(now) {
            FinishOutcome::Completed { elapsed } => elapsed,
            FinishOutcome::AlreadyInactive => {
                tracing::debug!(kind = %kind, "duplicate completion ignored");
                return ReportOutcome {
                    generation,
                    trigger: None,
                };
            }
        };
        if kind == OperationKind::Train {
            self.training_pending = false;
        }
        let entry = self.progress.get(kind);
        let id = reported_id.or_else(|| entry.id().map(str::to_owned));
        let message = completion_message(entry, elapsed);
        self.add_event(Severity::Success, message);

        let trigger = match (kind, id) {
            (OperationKind::Download, Some(id)) => Some(self.on_download_complete(&id)),
            _ => None,
        };
        ReportOutcome {
            generation,
            trigger,
        }
    }

    fn on_failed(&mut self, kind: OperationKind, error: &str, now: Instant) -> ReportOutcome {
        let entry = self.progress.get_mut(kind);
        let generation = entry.generation();
        let was_active = entry.abort(now);
        let label = entry.label().to_string();
        if kind == OperationKind::Train {
            self.training_pending = false;
        }
        let message = if was_active && !label.is_empty() {
            format!("{} failed ({label}): {error}", kind.title())
        } else {
            format!("{} failed: {error}", kind.title())
        };
        self.add_event(Severity::Error, message);
        ReportOutcome {
            generation,
            trigger: None,
        }
    }

    /// A newer `Start` replaced this instance on the bar. The bar belongs to
    /// the newer one; the completion still counts.
    fn on_superseded_complete(
        &mut self,
        kind: OperationKind,
        instance: &Instance,
    ) -> ReportOutcome {
        tracing::debug!(
            kind = %kind,
            generation = instance.generation,
            current = self.progress.get(kind).generation(),
            "completion for superseded instance"
        );
        let name = if instance.label.is_empty() {
            kind.name()
        } else {
            instance.label.as_str()
        };
        self.add_event(Severity::Success, format!("{} {name}", kind.past_tense()));
        let trigger = match (kind, &instance.id) {
            (OperationKind::Download, Some(id)) => Some(self.on_download_complete(id)),
            _ => None,
        };
        ReportOutcome {
            generation: instance.generation,
            trigger,
        }
    }

    fn on_superseded_failure(
        &mut self,
        kind: OperationKind,
        instance: &Instance,
        error: &str,
    ) -> ReportOutcome {
        tracing::debug!(
            kind = %kind,
            generation = instance.generation,
            current = self.progress.get(kind).generation(),
            "failure for superseded instance"
        );
        let message = if instance.label.is_empty() {
            format!("{} failed: {error}", kind.title())
        } else {
            format!("{} failed ({}): {error}", kind.title(), instance.label)
        };
        self.add_event(Severity::Error, message);
        ReportOutcome {
            generation: instance.generation,
            trigger: None,
        }
    }

    fn on_download_complete(&mut self, id: &str) -> TriggerDecision {
        let busy = self.training_busy();
        let decision = self.trigger.on_download_complete(id, busy);
        match &decision {
            TriggerDecision::Untracked => {
                tracing::debug!(id, "completed download is not required for training");
            }
            TriggerDecision::Pending { remaining } => {
                let done = self.trigger.completed().len();
                let required = self.trigger.required().len();
                self.add_event(
                    Severity::Info,
                    format!(
                        "Datasets ready {done}/{required}, waiting for {}",
                        remaining.join(", ")
                    ),
                );
            }
            TriggerDecision::Fire => {
                self.training_pending = true;
                self.add_event(
                    Severity::Info,
                    "auto-training triggered: all required datasets downloaded",
                );
            }
            TriggerDecision::SkippedBusy => {
                self.add_event(
                    Severity::Warning,
                    "auto-training skipped: training already running",
                );
            }
            TriggerDecision::ReadyDisabled => {
                self.add_event(
                    Severity::Info,
                    "All required datasets downloaded (auto-train disabled)",
                );
            }
        }
        decision
    }

    /// Start a new download cycle: forget completions from the previous one.
    pub fn begin_download_cycle(&mut self) {
        self.trigger.reset_cycle();
    }

    /// Reserve the training slot for a manual request.
    ///
    /// Returns `false` (and logs a warning) if training is already busy.
    pub fn claim_training(&mut self) -> bool {
        if self.training_busy() {
            self.add_event(Severity::Warning, "Training already running");
            return false;
        }
        self.training_pending = true;
        true
    }

    /// Release a training reservation that will never start.
    pub fn release_training(&mut self) {
        self.training_pending = false;
    }

    /// Fail `kind` only if the instance identified by `generation` is still
    /// active. Returns whether it was failed.
    pub fn fail_if_current(
        &mut self,
        kind: OperationKind,
        generation: u64,
        reason: &str,
        now: Instant,
    ) -> bool {
        let entry = self.progress.get(kind);
        if entry.generation() != generation || !entry.is_active() {
            return false;
        }
        self.on_failed(kind, reason, now);
        true
    }

    /// Fail every active operation that has been silent for `after`.
    pub fn expire_stale(&mut self, now: Instant, after: Duration) -> Vec<OperationKind> {
        let stale: Vec<OperationKind> = self
            .progress
            .iter()
            .filter(|e| e.is_stale(now, after))
            .map(ProgressEntry::kind)
            .collect();
        for &kind in &stale {
            self.progress.get_mut(kind).abort(now);
            if kind == OperationKind::Train {
                self.training_pending = false;
            }
            self.add_event(
                Severity::Warning,
                format!(
                    "{} stalled: no progress for {}",
                    kind.title(),
                    format_elapsed(after)
                ),
            );
        }
        stale
    }

    /// Set the running flag.
    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    /// Set the pause flag. Returns whether it changed.
    pub fn set_paused(&mut self, paused: bool) -> bool {
        if self.paused == paused {
            return false;
        }
        self.paused = paused;
        let message = if paused {
            "Paused: new operations blocked"
        } else {
            "Resumed"
        };
        self.add_event(Severity::Info, message);
        true
    }

    /// Flip the pause flag and return the new value.
    pub fn toggle_pause(&mut self) -> bool {
        let paused = !self.paused;
        self.set_paused(paused);
        paused
    }

    /// Flip the help overlay and return the new value.
    pub fn toggle_help(&mut self) -> bool {
        self.show_help = !self.show_help;
        self.show_help
    }

    /// Record the interval the render loop chose.
    pub fn set_refresh_interval(&mut self, interval: Duration) {
        self.refresh_interval = interval;
    }

    /// Open, edit or close (`None`) the command-mode buffer.
    pub fn set_command_buffer(&mut self, buffer: Option<String>) {
        self.command_buffer = buffer;
    }

    /// One-line summary of active operations.
    #[must_use]
    pub fn status_line(&self) -> String {
        let active: Vec<String> = self
            .progress
            .active()
            .map(|e| format!("{} {:.1}%", e.kind(), e.percent()))
            .collect();
        let ops = if active.is_empty() {
            "idle".to_string()
        } else {
            active.join(", ")
        };
        format!(
            "Status: {ops}; datasets {}/{}; auto-train {}{}",
            self.trigger.completed().len(),
            self.trigger.required().len(),
            if self.trigger.is_enabled() { "on" } else { "off" },
            if self.paused { "; paused" } else { "" },
        )
    }

    /// Copy everything a frame needs.
    #[must_use]
    pub fn snapshot(&self) -> FrameSnapshot {
        FrameSnapshot {
            progress: self.progress.clone(),
            events: self.events.iter().cloned().collect(),
            running: self.running,
            paused: self.paused,
            show_help: self.show_help,
            training_pending: self.training_pending,
            command_buffer: self.command_buffer.clone(),
            auto_train: self.trigger.is_enabled(),
            downloads_done: self.trigger.completed().len(),
            downloads_required: self.trigger.required().len(),
        }
    }
}

fn payload_name(update: &ProgressUpdate) -> &'static str {
    match update {
        ProgressUpdate::Transfer { .. } => "transfer",
        ProgressUpdate::Training { .. } => "training",
        ProgressUpdate::Rows { .. } => "rows",
        ProgressUpdate::Percent(_) => "percent",
    }
}

fn start_message(entry: &ProgressEntry) -> String {
    if entry.label().is_empty() {
        format!("{} started", entry.kind().title())
    } else {
        format!("{} started: {}", entry.kind().title(), entry.label())
    }
}

fn completion_message(entry: &ProgressEntry, elapsed: Duration) -> String {
    let name = if entry.label().is_empty() {
        entry.kind().name()
    } else {
        entry.label()
    };
    let took = format_elapsed(elapsed);
    let extra = match *entry.detail() {
        ProgressDetail::Transfer { total_bytes, .. } if total_bytes > 0 => {
            format!("{} in {took}", format_bytes(total_bytes))
        }
        ProgressDetail::Training {
            total_epochs,
            validation_score: Some(score),
            ..
        } => format!("{total_epochs} epochs, val {score:.4}, in {took}"),
        ProgressDetail::Training { total_epochs, .. } => {
            format!("{total_epochs} epochs in {took}")
        }
        ProgressDetail::Rows { total_rows, .. } if total_rows > 0 => {
            format!("{} rows in {took}", format_count(total_rows))
        }
        _ => format!("in {took}"),
    };
    format!("{} {name} ({extra})", entry.kind().past_tense())
}

/// Cloneable handle to the one [`DashboardState`].
#[derive(Debug, Clone)]
pub struct SharedState {
    inner: Arc<Mutex<DashboardState>>,
    retry_budget: Duration,
}

impl SharedState {
    /// Wrap a state.
    #[must_use]
    pub fn new(state: DashboardState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
            retry_budget: LOCK_RETRY_BUDGET,
        }
    }

    /// Build a fresh state from configuration.
    #[must_use]
    pub fn from_config(config: &DashboardConfig) -> Self {
        Self::new(DashboardState::new(config))
    }

    /// Override the lock retry budget.
    #[must_use]
    pub fn with_retry_budget(mut self, budget: Duration) -> Self {
        self.retry_budget = budget;
        self
    }

    fn acquire(&self) -> DashboardResult<MutexGuard<'_, DashboardState>> {
        let start = Instant::now();
        let mut backoff = MIN_BACKOFF;
        loop {
            match self.inner.try_lock() {
                Ok(guard) => return Ok(guard),
                Err(TryLockError::Poisoned(_)) => {
                    return Err(DashboardError::LockUnavailable {
                        waited: start.elapsed(),
                        poisoned: true,
                    });
                }
                Err(TryLockError::WouldBlock) => {
                    let waited = start.elapsed();
                    if waited >= self.retry_budget {
                        return Err(DashboardError::LockUnavailable {
                            waited,
                            poisoned: false,
                        });
                    }
                    thread::sleep(backoff.min(self.retry_budget - waited));
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }
    }

    /// Run `f` inside one critical section.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut DashboardState) -> R) -> DashboardResult<R> {
        let mut guard = self.acquire()?;
        Ok(f(&mut guard))
    }

    /// Apply one operation transition.
    pub fn report(&self, kind: OperationKind, report: Report) -> DashboardResult<ReportOutcome> {
        self.with_state(|s| s.report(kind, report, Instant::now()))
    }

    /// Append a footer event.
    pub fn add_event(&self, severity: Severity, message: impl Into<String>) -> DashboardResult<()> {
        let message = message.into();
        self.with_state(|s| s.add_event(severity, message))
    }

    /// Append an event only if the lock is free right now.
    ///
    /// Used while reporting a lock failure, where waiting again is pointless.
    pub fn try_add_event(&self, severity: Severity, message: impl Into<String>) -> bool {
        match self.inner.try_lock() {
            Ok(mut guard) => {
                guard.add_event(severity, message);
                true
            }
            Err(_) => false,
        }
    }

    /// Consistent copy for rendering.
    pub fn snapshot(&self) -> DashboardResult<FrameSnapshot> {
        self.with_state(|s| s.snapshot())
    }
}
