#![forbid(unsafe_code)]

//! Auto-training trigger policy.
//!
//! Tracks which required dataset downloads have completed in the current
//! cycle and decides, on each completion, whether training should start.
//!
//! Only ids listed in the required set are tracked. Completion of any other
//! dataset is reported as [`TriggerDecision::Untracked`] and leaves the set
//! untouched, so "set equals required" and "set contains required" agree.
//!
//! Every decision that finds the set satisfied clears it, whether it fired or
//! not. A later cycle therefore starts from empty.

use std::collections::BTreeSet;

/// Outcome of one completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerDecision {
    /// The id is not part of the required set (or the set is empty).
    Untracked,
    /// Recorded; more downloads are outstanding.
    Pending {
        /// Required ids not yet completed.
        remaining: Vec<String>,
    },
    /// All required downloads completed; start training now.
    Fire,
    /// All required downloads completed but training is already running.
    SkippedBusy,
    /// All required downloads completed but auto-training is disabled.
    ReadyDisabled,
}

/// Required-downloads policy.
#[derive(Debug, Clone)]
pub struct AutoTriggerPolicy {
    required: BTreeSet<String>,
    completed: BTreeSet<String>,
    enabled: bool,
}

impl AutoTriggerPolicy {
    /// Create a policy.
    pub fn new(required: impl IntoIterator<Item = impl Into<String>>, enabled: bool) -> Self {
        Self {
            required: required.into_iter().map(Into::into).collect(),
            completed: BTreeSet::new(),
            enabled,
        }
    }

    /// Record a completed download and decide.
    ///
    /// `training_busy` must reflect whether a training run is active or
    /// already scheduled at the time of the call.
    pub fn on_download_complete(&mut self, id: &str, training_busy: bool) -> TriggerDecision {
        if !self.required.contains(id) {
            return TriggerDecision::Untracked;
        }
        self.completed.insert(id.to_string());

        if self.completed != self.required {
            let remaining = self
                .required
                .difference(&self.completed)
                .cloned()
                .collect();
            return TriggerDecision::Pending { remaining };
        }

        self.completed.clear();
        if !self.enabled {
            TriggerDecision::ReadyDisabled
        } else if training_busy {
            TriggerDecision::SkippedBusy
        } else {
            TriggerDecision::Fire
        }
    }

    /// Forget completions at the start of a new download cycle.
    pub fn reset_cycle(&mut self) {
        self.completed.clear();
    }

    /// Ids completed so far in this cycle.
    #[must_use]
    pub fn completed(&self) -> &BTreeSet<String> {
        &self.completed
    }

    /// Ids that must complete before training fires.
    #[must_use]
    pub fn required(&self) -> &BTreeSet<String> {
        &self.required
    }

    /// Whether auto-training is enabled.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enable or disable auto-training.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> AutoTriggerPolicy {
        AutoTriggerPolicy::new(["train", "validation", "live"], true)
    }

    #[test]
    fn fires_once_all_required_complete() {
        let mut p = policy();
        assert_eq!(
            p.on_download_complete("live", false),
            TriggerDecision::Pending {
                remaining: vec!["train".into(), "validation".into()]
            }
        );
        assert!(matches!(
            p.on_download_complete("train", false),
            TriggerDecision::Pending { .. }
        ));
        assert_eq!(
            p.on_download_complete("validation", false),
            TriggerDecision::Fire
        );
        assert!(p.completed().is_empty());
    }

    #[test]
    fn repeated_id_does_not_complete_set() {
        let mut p = policy();
        p.on_download_complete("train", false);
        assert!(matches!(
            p.on_download_complete("train", false),
            TriggerDecision::Pending { .. }
        ));
        assert_eq!(p.completed().len(), 1);
    }

    #[test]
    fn untracked_ids_are_ignored() {
        let mut p = policy();
        assert_eq!(
            p.on_download_complete("features", false),
            TriggerDecision::Untracked
        );
        assert!(p.completed().is_empty());
    }

    #[test]
    fn busy_training_is_skipped_and_clears() {
        let mut p = policy();
        p.on_download_complete("train", true);
        p.on_download_complete("validation", true);
        assert_eq!(
            p.on_download_complete("live", true),
            TriggerDecision::SkippedBusy
        );
        assert!(p.completed().is_empty());
    }

    #[test]
    fn disabled_policy_reports_ready() {
        let mut p = AutoTriggerPolicy::new(["train"], false);
        assert_eq!(
            p.on_download_complete("train", false),
            TriggerDecision::ReadyDisabled
        );
    }

    #[test]
    fn empty_required_set_never_fires() {
        let mut p = AutoTriggerPolicy::new(Vec::<String>::new(), true);
        assert_eq!(
            p.on_download_complete("train", false),
            TriggerDecision::Untracked
        );
    }

    #[test]
    fn reset_cycle_forgets_partial_progress() {
        let mut p = policy();
        p.on_download_complete("train", false);
        p.on_download_complete("validation", false);
        p.reset_cycle();
        assert!(matches!(
            p.on_download_complete("live", false),
            TriggerDecision::Pending { .. }
        ));
    }
}
