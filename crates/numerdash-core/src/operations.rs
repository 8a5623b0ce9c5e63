#![forbid(unsafe_code)]

//! Entry points into the background-operation collaborator.
//!
//! The dashboard never performs downloads, training or submissions itself. It
//! calls these methods (from the input loop or the auto-trigger) and the
//! collaborator reports back through reporters minted from the handle.
//!
//! Implementations must return promptly: they are called on the input thread
//! or on whichever thread reported the triggering completion. Spawn the real
//! work elsewhere.

use crate::adapter::DashboardHandle;

/// Collaborator that performs the real work.
pub trait Operations: Send + Sync {
    /// Begin a dataset download cycle.
    fn start_download(&self, handle: &DashboardHandle);

    /// Begin one training run. The training slot is already reserved.
    fn start_training(&self, handle: &DashboardHandle) {
        handle.release_training();
        handle.unavailable("Training");
    }

    /// Begin a prediction submission.
    fn start_submit(&self, handle: &DashboardHandle) {
        handle.unavailable("Submission");
    }

    /// Begin generating predictions.
    fn start_prediction(&self, handle: &DashboardHandle) {
        handle.unavailable("Prediction");
    }

    /// Open the new-model wizard.
    fn new_model_wizard(&self, handle: &DashboardHandle) {
        handle.unavailable("New-model wizard");
    }
}

/// Collaborator that supports nothing. Every request logs a warning.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOperations;

impl Operations for NoOperations {
    fn start_download(&self, handle: &DashboardHandle) {
        handle.unavailable("Download");
    }
}
