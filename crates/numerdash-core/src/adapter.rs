#![forbid(unsafe_code)]

//! Operation callback adapter.
//!
//! [`DashboardHandle`] bundles the shared state, the loop signal and the
//! operations collaborator. Background operations get an
//! [`OperationReporter`] from it and report `start` / progress / `complete`
//! or `fail` through that.
//!
//! # Guarantees
//!
//! - Every report is applied in one critical section.
//! - Follow-up calls into [`Operations`] (auto-trigger → `start_training`)
//!   happen after the state lock is released.
//! - A reporter dropped after `start` but before `complete`/`fail` fails its
//!   own instance, so a panicking or abandoned operation never leaves a
//!   stuck bar. An instance superseded by a newer `start` is left alone.
//! - `complete` and `fail` name the reporter's own instance. A superseded
//!   download still counts toward the auto-trigger with its own dataset id.
//! - A lock failure is fatal: it is logged and the dashboard signal is
//!   stopped with the reason.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::error::DashboardError;
use crate::event_log::Severity;
use crate::operations::Operations;
use crate::progress::{OperationKind, ProgressUpdate};
use crate::signal::LoopSignal;
use crate::state::{Instance, Report, ReportOutcome, SharedState};

/// Everything a collaborator needs to talk back to the dashboard.
#[derive(Clone)]
pub struct DashboardHandle {
    state: SharedState,
    signal: LoopSignal,
    operations: Arc<dyn Operations>,
}

impl fmt::Debug for DashboardHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DashboardHandle")
            .field("state", &self.state)
            .field("signal", &self.signal)
            .finish_non_exhaustive()
    }
}

impl DashboardHandle {
    /// Bundle the parts.
    pub fn new(state: SharedState, signal: LoopSignal, operations: Arc<dyn Operations>) -> Self {
        Self {
            state,
            signal,
            operations,
        }
    }

    /// Shared state.
    #[must_use]
    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Loop signal.
    #[must_use]
    pub fn signal(&self) -> &LoopSignal {
        &self.signal
    }

    /// Reporter for a non-download operation.
    #[must_use]
    pub fn reporter(&self, kind: OperationKind) -> OperationReporter {
        OperationReporter::new(self.clone(), kind, None)
    }

    /// Reporter for the download of dataset `id`.
    #[must_use]
    pub fn download_reporter(&self, id: impl Into<String>) -> OperationReporter {
        OperationReporter::new(self.clone(), OperationKind::Download, Some(id.into()))
    }

    /// Apply a report and run its follow-ups.
    ///
    /// Returns `None` if the state lock was unavailable; the dashboard has
    /// been stopped in that case.
    pub fn report(&self, kind: OperationKind, report: Report) -> Option<ReportOutcome> {
        let transition = !matches!(report, Report::Progress(_));
        match self.state.report(kind, report) {
            Ok(outcome) => {
                if transition {
                    self.signal.request_refresh();
                }
                if outcome.should_start_training() {
                    self.operations.start_training(self);
                }
                Some(outcome)
            }
            Err(err) => {
                self.fatal(&err);
                None
            }
        }
    }

    /// Append a footer event.
    pub fn add_event(&self, severity: Severity, message: impl Into<String>) {
        if let Err(err) = self.state.add_event(severity, message) {
            self.fatal(&err);
        }
    }

    /// Log that a requested capability is not provided.
    pub fn unavailable(&self, what: &str) {
        self.add_event(Severity::Warning, format!("{what} is not available"));
    }

    /// Release a training reservation that will not start.
    pub fn release_training(&self) {
        if let Err(err) = self.state.with_state(|s| s.release_training()) {
            self.fatal(&err);
        }
    }

    /// Begin a download cycle unless one is already running.
    pub fn start_download(&self) -> bool {
        let started = self.state.with_state(|s| {
            if s.progress().get(OperationKind::Download).is_active() {
                s.add_event(Severity::Warning, "Download already running");
                false
            } else {
                s.begin_download_cycle();
                true
            }
        });
        self.dispatch(started, |ops, h| ops.start_download(h))
    }

    /// Begin training unless training is already running or scheduled.
    pub fn start_training(&self) -> bool {
        let claimed = self.state.with_state(|s| s.claim_training());
        self.dispatch(claimed, |ops, h| ops.start_training(h))
    }

    /// Begin a submission unless an upload is already running.
    pub fn start_submit(&self) -> bool {
        let idle = self.kind_idle(OperationKind::Upload, "Submission already running");
        self.dispatch(idle, |ops, h| ops.start_submit(h))
    }

    /// Begin prediction unless it is already running.
    pub fn start_prediction(&self) -> bool {
        let idle = self.kind_idle(OperationKind::Predict, "Prediction already running");
        self.dispatch(idle, |ops, h| ops.start_prediction(h))
    }

    /// Open the new-model wizard.
    pub fn new_model_wizard(&self) {
        self.operations.new_model_wizard(self);
    }

    fn kind_idle(&self, kind: OperationKind, busy: &'static str) -> Result<bool, DashboardError> {
        self.state.with_state(|s| {
            if s.progress().get(kind).is_active() {
                s.add_event(Severity::Warning, busy);
                false
            } else {
                true
            }
        })
    }

    fn dispatch(
        &self,
        allowed: Result<bool, DashboardError>,
        call: impl FnOnce(&dyn Operations, &DashboardHandle),
    ) -> bool {
        match allowed {
            Ok(true) => {
                call(self.operations.as_ref(), self);
                self.signal.request_refresh();
                true
            }
            Ok(false) => {
                self.signal.request_refresh();
                false
            }
            Err(err) => {
                self.fatal(&err);
                false
            }
        }
    }

    /// Record a fatal error and stop the dashboard.
    pub fn fatal(&self, err: &DashboardError) {
        tracing::error!(error = %err, "fatal dashboard error; stopping");
        // The lock may be the thing that failed; try once without waiting.
        let _ = self
            .state
            .try_add_event(Severity::Error, format!("Fatal: {err}"));
        self.signal.stop_fatal(err.to_string());
    }
}

/// Progress callbacks for one operation instance.
///
/// Bound to one kind (and, for downloads, one dataset id).
pub struct OperationReporter {
    handle: DashboardHandle,
    kind: OperationKind,
    id: Option<String>,
    instance: Option<Instance>,
    finished: bool,
}

impl fmt::Debug for OperationReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationReporter")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .field("instance", &self.instance)
            .field("finished", &self.finished)
            .finish()
    }
}

impl OperationReporter {
    fn new(handle: DashboardHandle, kind: OperationKind, id: Option<String>) -> Self {
        Self {
            handle,
            kind,
            id,
            instance: None,
            finished: false,
        }
    }

    /// Kind this reporter is bound to.
    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Dataset id, for downloads.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Report the start of the instance.
    pub fn start(&mut self, label: impl Into<String>) {
        let label = label.into();
        let report = Report::Start {
            label: label.clone(),
            id: self.id.clone(),
        };
        if let Some(outcome) = self.handle.report(self.kind, report) {
            self.instance = Some(Instance {
                generation: outcome.generation,
                label,
                id: self.id.clone(),
            });
            self.finished = false;
        }
    }

    /// Report a typed progress payload.
    pub fn progress(&self, update: ProgressUpdate) {
        self.handle.report(self.kind, Report::Progress(update));
    }

    /// Report transferred bytes (download/upload).
    pub fn transfer(&self, current_bytes: u64, total_bytes: u64) {
        self.progress(ProgressUpdate::Transfer {
            current_bytes,
            total_bytes,
        });
    }

    /// Report a finished training epoch.
    pub fn epoch(
        &self,
        epoch: u32,
        total_epochs: u32,
        loss: Option<f64>,
        validation_score: Option<f64>,
    ) {
        self.progress(ProgressUpdate::Training {
            epoch,
            total_epochs,
            loss,
            validation_score,
        });
    }

    /// Report processed prediction rows.
    pub fn rows(&self, rows_processed: u64, total_rows: u64) {
        self.progress(ProgressUpdate::Rows {
            rows_processed,
            total_rows,
        });
    }

    /// Report a bare percentage.
    pub fn percent(&self, percent: f64) {
        self.progress(ProgressUpdate::Percent(percent));
    }

    /// Report successful completion.
    pub fn complete(mut self) {
        self.finished = true;
        match self.instance.take() {
            Some(instance) => {
                self.handle.report(self.kind, Report::complete_instance(instance));
            }
            None => tracing::warn!(kind = %self.kind, "complete without start ignored"),
        }
    }

    /// Report failure.
    pub fn fail(mut self, error: impl fmt::Display) {
        self.finished = true;
        match self.instance.take() {
            Some(instance) => {
                let report = Report::failed_instance(instance, error.to_string());
                self.handle.report(self.kind, report);
            }
            // Never started: nothing of ours is on a bar.
            None => {
                self.handle.add_event(
                    Severity::Error,
                    format!("{} failed: {error}", self.kind.title()),
                );
                self.handle.signal.request_refresh();
            }
        }
    }
}

impl Drop for OperationReporter {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let Some(generation) = self.instance.as_ref().map(|i| i.generation) else {
            return;
        };
        let kind = self.kind;
        let failed = self.handle.state.with_state(|s| {
            s.fail_if_current(
                kind,
                generation,
                "operation ended without reporting completion",
                Instant::now(),
            )
        });
        match failed {
            Ok(true) => self.handle.signal.request_refresh(),
            Ok(false) => {}
            Err(err) => tracing::error!(error = %err, kind = %kind, "reporter cleanup failed"),
        }
    }
}
