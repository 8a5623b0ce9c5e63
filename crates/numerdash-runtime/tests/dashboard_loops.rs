//! Render and input loops driven through the orchestrator with in-memory
//! terminal, channel keys and fixed metrics.

mod common;

use std::thread;
use std::time::{Duration, Instant};

use common::{events, fast_config, harness, wait_until};
use numerdash_core::{DashboardError, OperationKind};
use numerdash_runtime::{INPUT_POLL_INTERVAL, KeyCode, KeyEvent};

const WAIT: Duration = Duration::from_secs(3);

#[test]
fn quit_key_stops_promptly() {
    let mut h = harness(fast_config());
    h.dashboard.start().unwrap();
    assert!(h.dashboard.is_running());

    let started = Instant::now();
    h.keys.send(KeyEvent::char('q')).unwrap();
    h.dashboard.handle().signal().wait_stopped();
    let state_running = h
        .dashboard
        .handle()
        .state()
        .with_state(|s| s.is_running())
        .unwrap();
    assert!(!state_running);
    assert!(!h.dashboard.is_running());
    h.dashboard.stop();
    let elapsed = started.elapsed();

    assert!(
        elapsed < INPUT_POLL_INTERVAL * 4,
        "stop took {elapsed:?}, poll interval is {INPUT_POLL_INTERVAL:?}"
    );
    assert!(!h.dashboard.is_running());
}

#[test]
fn run_returns_ok_after_quit() {
    let mut h = harness(fast_config());
    let keys = h.keys.clone();
    let sender = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        keys.send(KeyEvent::char('q')).unwrap();
    });
    h.dashboard.run().unwrap();
    sender.join().unwrap();
    assert!(h.out.contents().contains("[STOPPED]"));
}

#[test]
fn cadence_switches_with_activity() {
    let mut h = harness(fast_config());
    h.dashboard.start().unwrap();
    let handle = h.dashboard.handle().clone();
    let interval = || handle.state().with_state(|s| s.refresh_interval()).unwrap();

    assert!(wait_until(WAIT, || interval() == Duration::from_millis(40)));

    let mut train = h.dashboard.reporter(OperationKind::Train);
    train.start("lgbm");
    assert!(wait_until(WAIT, || interval() == Duration::from_millis(10)));

    train.complete();
    assert!(wait_until(WAIT, || interval() == Duration::from_millis(40)));
    h.dashboard.stop();
}

#[test]
fn paused_dashboard_refuses_download_key() {
    let mut h = harness(fast_config());
    h.dashboard.start().unwrap();
    let handle = h.dashboard.handle().clone();

    h.keys.send(KeyEvent::char('p')).unwrap();
    h.keys.send(KeyEvent::char('d')).unwrap();
    assert!(wait_until(WAIT, || {
        events(&handle)
            .iter()
            .any(|m| m == "Paused: download refused (p to resume)")
    }));
    assert_eq!(h.ops.count("download"), 0);
    assert!(wait_until(WAIT, || h.out.contents().contains("[PAUSED]")));

    h.keys.send(KeyEvent::char('p')).unwrap();
    h.keys.send(KeyEvent::char('d')).unwrap();
    assert!(wait_until(WAIT, || h.ops.count("download") == 1));
    h.dashboard.stop();
}

#[test]
fn command_mode_prompt_is_painted() {
    let mut h = harness(fast_config());
    h.dashboard.start().unwrap();

    h.keys.send(KeyEvent::char('/')).unwrap();
    for c in "subm".chars() {
        h.keys.send(KeyEvent::char(c)).unwrap();
    }
    assert!(wait_until(WAIT, || h.out.contents().contains("/subm")));

    for c in "it".chars() {
        h.keys.send(KeyEvent::char(c)).unwrap();
    }
    h.keys.send(KeyEvent::new(KeyCode::Enter)).unwrap();
    assert!(wait_until(WAIT, || h.ops.count("submit") == 1));
    h.dashboard.stop();
}

#[test]
fn progress_bars_reach_the_terminal() {
    let mut h = harness(fast_config());
    h.dashboard.start().unwrap();

    let mut dl = h.dashboard.download_reporter("train");
    dl.start("train.parquet");
    dl.transfer(512, 1024);
    assert!(wait_until(WAIT, || {
        let out = h.out.contents();
        out.contains("50.0%") && out.contains("train.parquet")
    }));
    dl.complete();
    h.dashboard.stop();
}

#[test]
fn poisoned_state_stops_run_with_reason() {
    let mut h = harness(fast_config());
    let state = h.dashboard.handle().state().clone();
    let poisoner = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        let _ = thread::spawn(move || {
            let _: Result<(), _> = state.with_state(|_| panic!("simulated holder panic"));
        })
        .join();
    });

    let err = h.dashboard.run().unwrap_err();
    poisoner.join().unwrap();
    match err {
        DashboardError::Stopped(reason) => assert!(reason.contains("poisoned"), "{reason}"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn stop_is_idempotent_and_restores_scroll_region() {
    let mut h = harness(fast_config());
    h.dashboard.start().unwrap();
    h.dashboard.start().unwrap();
    assert!(wait_until(WAIT, || h.out.contents().contains("Numerai Dashboard")));
    h.dashboard.stop();
    h.dashboard.stop();
    assert!(h.out.contents().contains("\x1b[r"));
}
