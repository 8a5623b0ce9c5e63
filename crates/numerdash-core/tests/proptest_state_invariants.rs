//! Property tests for progress monotonicity, the bounded event log and
//! snapshot consistency under concurrent writers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;

use numerdash_core::config::DashboardConfig;
use numerdash_core::event_log::{EventLog, Severity};
use numerdash_core::progress::{OperationKind, ProgressUpdate};
use numerdash_core::state::{DashboardState, Report, SharedState};
use proptest::prelude::*;

fn transfer_update() -> impl Strategy<Value = ProgressUpdate> {
    prop_oneof![
        any::<f64>().prop_map(ProgressUpdate::Percent),
        (-50.0f64..200.0).prop_map(ProgressUpdate::Percent),
        (0u64..20_000, 0u64..20_000).prop_map(|(current_bytes, total_bytes)| {
            ProgressUpdate::Transfer {
                current_bytes,
                total_bytes,
            }
        }),
        (0u64..100, 0u64..100).prop_map(|(rows_processed, total_rows)| {
            ProgressUpdate::Rows {
                rows_processed,
                total_rows,
            }
        }),
    ]
}

proptest! {
    #[test]
    fn percent_never_decreases_within_an_instance(
        updates in prop::collection::vec(transfer_update(), 1..64),
    ) {
        let mut state = DashboardState::new(&DashboardConfig::default());
        let now = Instant::now();
        state.report(OperationKind::Download, Report::start("train.parquet"), now);
        let mut prev = 0.0;
        for update in updates {
            state.report(OperationKind::Download, Report::Progress(update), now);
            let pct = state.progress().get(OperationKind::Download).percent();
            prop_assert!(pct.is_finite());
            prop_assert!((0.0..=100.0).contains(&pct), "out of range: {pct}");
            prop_assert!(pct >= prev, "decreased from {prev} to {pct}");
            prev = pct;
        }
        state.report(OperationKind::Download, Report::complete(), now);
        prop_assert_eq!(state.progress().get(OperationKind::Download).percent(), 100.0);
    }

    #[test]
    fn restart_is_the_only_reset(
        before in prop::collection::vec(0.0f64..100.0, 1..16),
        after in prop::collection::vec(0.0f64..100.0, 0..16),
    ) {
        let mut state = DashboardState::new(&DashboardConfig::default());
        let now = Instant::now();
        state.report(OperationKind::Predict, Report::start("a"), now);
        for p in before {
            state.report(OperationKind::Predict, Report::Progress(ProgressUpdate::Percent(p)), now);
        }
        state.report(OperationKind::Predict, Report::start("b"), now);
        prop_assert_eq!(state.progress().get(OperationKind::Predict).percent(), 0.0);
        let max = after.iter().copied().fold(0.0, f64::max);
        for p in after {
            state.report(OperationKind::Predict, Report::Progress(ProgressUpdate::Percent(p)), now);
        }
        prop_assert_eq!(state.progress().get(OperationKind::Predict).percent(), max);
    }

    #[test]
    fn event_log_keeps_the_newest_entries(k in 0usize..200, capacity in 1usize..64) {
        let mut log = EventLog::new(capacity);
        for i in 1..=k {
            log.add(Severity::Info, format!("event {i}"));
        }
        prop_assert_eq!(log.len(), k.min(capacity));
        if k > capacity {
            let first = log.iter().next().map(|e| e.message().to_string());
            prop_assert_eq!(first, Some(format!("event {}", k - capacity + 1)));
        }
        let recent: Vec<_> = log.recent(5).map(|e| e.message().to_string()).collect();
        prop_assert_eq!(recent.len(), k.min(capacity).min(5));
        if let Some(last) = recent.last() {
            prop_assert_eq!(last, &format!("event {k}"));
        }
    }
}

#[test]
fn default_log_retains_thirty() {
    let mut log = EventLog::new(numerdash_core::event_log::DEFAULT_EVENT_LOG_CAPACITY);
    for i in 1..=45 {
        log.add(Severity::Info, format!("event {i}"));
    }
    assert_eq!(log.len(), 30);
    // Position 0 is the (k-29)th insert.
    assert_eq!(log.iter().next().unwrap().message(), "event 16");
}

/// Instance `i` only ever shows 0, its own percent, or 100.
fn percent_for(i: u64) -> f64 {
    (i % 97 + 1) as f64
}

#[test]
fn snapshots_never_tear_across_instances() {
    let shared = SharedState::from_config(&DashboardConfig::default());
    let done = Arc::new(AtomicBool::new(false));

    let writer = {
        let shared = shared.clone();
        let done = Arc::clone(&done);
        thread::spawn(move || {
            for i in 0..2_000u64 {
                let kind = OperationKind::Upload;
                shared
                    .report(kind, Report::start(format!("run-{i}")))
                    .unwrap();
                shared
                    .report(kind, Report::Progress(ProgressUpdate::Percent(percent_for(i))))
                    .unwrap();
                shared.report(kind, Report::complete()).unwrap();
            }
            done.store(true, Ordering::SeqCst);
        })
    };

    let readers: Vec<_> = (0..3)
        .map(|_| {
            let shared = shared.clone();
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut seen = 0u64;
                while !done.load(Ordering::SeqCst) {
                    let snap = shared.snapshot().unwrap();
                    let entry = snap.progress.get(OperationKind::Upload);
                    let pct = entry.percent();
                    assert!((0.0..=100.0).contains(&pct));
                    if let Some(i) = entry.label().strip_prefix("run-") {
                        let i: u64 = i.parse().unwrap();
                        let own = percent_for(i);
                        assert!(
                            pct == 0.0 || pct == own || pct == 100.0,
                            "label run-{i} paired with {pct}"
                        );
                        if entry.is_active() {
                            assert!(pct != 100.0, "active run-{i} at 100%");
                        }
                        seen += 1;
                    }
                }
                seen
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
}
