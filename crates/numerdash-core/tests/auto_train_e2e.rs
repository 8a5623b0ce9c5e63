//! End-to-end tests for download completion driving auto-training through
//! the callback adapter.

use std::sync::{Arc, Mutex};
use std::thread;

use numerdash_core::adapter::DashboardHandle;
use numerdash_core::auto_trigger::TriggerDecision;
use numerdash_core::config::DashboardConfig;
use numerdash_core::event_log::Severity;
use numerdash_core::operations::Operations;
use numerdash_core::progress::OperationKind;
use numerdash_core::signal::LoopSignal;
use numerdash_core::state::{Report, SharedState};

/// Records every call and, for training, runs a short fake training run.
#[derive(Default)]
struct RecordingOps {
    calls: Mutex<Vec<&'static str>>,
}

impl RecordingOps {
    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, name: &str) -> usize {
        self.calls().iter().filter(|c| **c == name).count()
    }
}

impl Operations for RecordingOps {
    fn start_download(&self, handle: &DashboardHandle) {
        self.calls.lock().unwrap().push("download");
        for id in ["train", "validation", "live"] {
            let mut r = handle.download_reporter(id);
            r.start(format!("{id}.parquet"));
            r.transfer(1024, 2048);
            r.transfer(2048, 2048);
            r.complete();
        }
    }

    fn start_training(&self, handle: &DashboardHandle) {
        self.calls.lock().unwrap().push("train");
        let mut r = handle.reporter(OperationKind::Train);
        r.start("lgbm_small");
        for epoch in 1..=3 {
            r.epoch(epoch, 3, Some(0.5 / f64::from(epoch)), None);
        }
        r.complete();
    }
}

fn handle(config: &DashboardConfig, ops: Arc<RecordingOps>) -> DashboardHandle {
    DashboardHandle::new(SharedState::from_config(config), LoopSignal::new(), ops)
}

fn complete_download(handle: &DashboardHandle, id: &str) -> Option<TriggerDecision> {
    let mut r = handle.download_reporter(id);
    r.start(format!("{id}.parquet"));
    handle
        .report(OperationKind::Download, Report::complete())
        .and_then(|outcome| outcome.trigger)
}

fn messages(handle: &DashboardHandle) -> Vec<String> {
    handle
        .state()
        .with_state(|s| s.events().iter().map(|e| e.message().to_string()).collect())
        .unwrap()
}

#[test]
fn all_orders_fire_exactly_once() {
    let ids = ["train", "validation", "live"];
    let orders = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];
    for order in orders {
        let ops = Arc::new(RecordingOps::default());
        let h = handle(&DashboardConfig::default(), ops.clone());
        let decisions: Vec<_> = order
            .iter()
            .map(|&i| complete_download(&h, ids[i]))
            .collect();
        assert_eq!(decisions[2], Some(TriggerDecision::Fire), "order {order:?}");
        assert_eq!(ops.count("train"), 1, "order {order:?}");
    }
}

#[test]
fn two_of_three_do_not_fire() {
    let ops = Arc::new(RecordingOps::default());
    let h = handle(&DashboardConfig::default(), ops.clone());
    complete_download(&h, "train");
    let decision = complete_download(&h, "live");
    assert!(matches!(decision, Some(TriggerDecision::Pending { .. })));
    assert_eq!(ops.count("train"), 0);
    assert!(
        messages(&h)
            .iter()
            .any(|m| m == "Datasets ready 2/3, waiting for validation")
    );
}

#[test]
fn busy_training_logs_without_firing() {
    let ops = Arc::new(RecordingOps::default());
    let h = handle(&DashboardConfig::default(), ops.clone());
    let mut training = h.reporter(OperationKind::Train);
    training.start("manual");
    for id in ["train", "validation", "live"] {
        complete_download(&h, id);
    }
    assert_eq!(ops.count("train"), 0);
    let last = h
        .state()
        .with_state(|s| s.events().last().cloned())
        .unwrap()
        .unwrap();
    assert_eq!(last.severity(), Severity::Warning);
    assert_eq!(
        last.message(),
        "auto-training skipped: training already running"
    );
    training.complete();
}

#[test]
fn disabled_auto_train_only_reports_readiness() {
    let ops = Arc::new(RecordingOps::default());
    let config = DashboardConfig::default().with_auto_train(false);
    let h = handle(&config, ops.clone());
    for id in ["live", "validation", "train"] {
        complete_download(&h, id);
    }
    assert_eq!(ops.count("train"), 0);
    assert!(
        messages(&h)
            .iter()
            .any(|m| m == "All required datasets downloaded (auto-train disabled)")
    );
}

#[test]
fn repeated_complete_is_idempotent() {
    let ops = Arc::new(RecordingOps::default());
    let h = handle(&DashboardConfig::default(), ops.clone());
    complete_download(&h, "train");
    let before = messages(&h).len();
    let outcome = h.report(OperationKind::Download, Report::complete()).unwrap();
    assert_eq!(outcome.trigger, None);
    assert_eq!(messages(&h).len(), before);
}

#[test]
fn download_cycle_drives_training_end_to_end() {
    let ops = Arc::new(RecordingOps::default());
    let h = handle(&DashboardConfig::default(), ops.clone());

    assert!(h.start_download());

    assert_eq!(ops.calls(), vec!["download", "train"]);
    let snap = h.state().snapshot().unwrap();
    assert!(!snap.any_active());
    assert!(!snap.training_pending);
    assert_eq!(snap.progress.get(OperationKind::Train).percent(), 100.0);
    assert_eq!(snap.downloads_done, 0);

    let log = messages(&h);
    let triggered = log
        .iter()
        .position(|m| m.starts_with("auto-training triggered"))
        .unwrap();
    let trained = log
        .iter()
        .position(|m| m.starts_with("Trained lgbm_small"))
        .unwrap();
    assert!(triggered < trained);
    assert_eq!(
        log.iter()
            .filter(|m| m.starts_with("Downloaded "))
            .count(),
        3
    );
}

#[test]
fn overlapping_download_reporters_fire_once() {
    let ops = Arc::new(RecordingOps::default());
    let h = handle(&DashboardConfig::default(), ops.clone());
    let reporters: Vec<_> = ["train", "validation", "live"]
        .into_iter()
        .map(|id| {
            let mut r = h.download_reporter(id);
            r.start(format!("{id}.parquet"));
            r
        })
        .collect();
    for r in reporters {
        r.complete();
    }

    assert_eq!(ops.count("train"), 1);
    let log = messages(&h);
    for id in ["train", "validation", "live"] {
        let done = format!("Downloaded {id}.parquet");
        assert!(log.iter().any(|m| m.starts_with(&done)), "{id} missing: {log:?}");
    }
    assert!(log.iter().any(|m| m.starts_with("auto-training triggered")));
}

#[test]
fn superseded_failure_leaves_newer_bar_alone() {
    let ops = Arc::new(RecordingOps::default());
    let h = handle(&DashboardConfig::default(), ops.clone());
    let mut old = h.download_reporter("train");
    old.start("train.parquet");
    let mut new = h.download_reporter("live");
    new.start("live.parquet");

    old.fail("connection reset");

    let (active, label) = h
        .state()
        .with_state(|s| {
            let entry = s.progress().get(OperationKind::Download);
            (entry.is_active(), entry.label().to_string())
        })
        .unwrap();
    assert!(active);
    assert_eq!(label, "live.parquet");
    assert!(
        messages(&h)
            .iter()
            .any(|m| m == "Download failed (train.parquet): connection reset")
    );
    new.complete();
}

#[test]
fn concurrent_downloads_fire_once() {
    let ops = Arc::new(RecordingOps::default());
    let h = handle(&DashboardConfig::default(), ops.clone());
    let threads: Vec<_> = ["train", "validation", "live"]
        .into_iter()
        .map(|id| {
            let h = h.clone();
            thread::spawn(move || {
                let mut r = h.download_reporter(id);
                r.start(format!("{id}.parquet"));
                r.complete();
            })
        })
        .collect();
    for t in threads {
        t.join().unwrap();
    }
    // Interleaved starts supersede each other on the one download bar, but
    // every reporter's completion still counts under its own id.
    assert_eq!(ops.count("train"), 1);
}
