#![forbid(unsafe_code)]

//! Simulated background operations.
//!
//! Each request spawns one worker thread that reports through the handle at
//! a fixed step. Workers stop early when the dashboard stops; their reporters
//! then fail the bar on drop.

use std::thread;
use std::time::Duration;

use numerdash::prelude::*;
use numerdash::{Color, SharedPanel};

const DATASET_BYTES: u64 = 48 * 1024 * 1024;
const CHUNKS: u64 = 12;
const EPOCHS: u32 = 8;
const LIVE_ROWS: u64 = 5_432;

/// Operations that pretend to talk to Numerai.
#[derive(Debug)]
pub struct SimulatedOps {
    datasets: Vec<String>,
    step: Duration,
    panel: SharedPanel,
}

impl SimulatedOps {
    pub fn new(
        datasets: impl IntoIterator<Item = String>,
        step: Duration,
        panel: SharedPanel,
    ) -> Self {
        let datasets: Vec<String> = datasets.into_iter().collect();
        panel.set(panel_lines(&datasets, None));
        Self {
            datasets,
            step,
            panel,
        }
    }

    fn spawn(&self, handle: &DashboardHandle, name: &str, work: impl FnOnce() + Send + 'static) {
        if let Err(err) = thread::Builder::new()
            .name(format!("sim-{name}"))
            .spawn(work)
        {
            handle.add_event(Severity::Error, format!("Could not start {name}: {err}"));
        }
    }
}

/// Model and tournament panel content.
fn panel_lines(datasets: &[String], score: Option<f64>) -> Vec<Line> {
    vec![
        Line::styled("Model", Style::fg(Color::Cyan).bold()),
        Line::plain("  name       lgbm_small"),
        Line::plain(format!("  datasets   {}", datasets.join(", "))),
        match score {
            Some(score) => Line::plain(format!("  val corr   {score:.4}")),
            None => Line::styled("  val corr   not trained yet", Style::PLAIN.dim()),
        },
        Line::new(),
        Line::styled("Tournament", Style::fg(Color::Cyan).bold()),
        Line::plain("  round      current"),
    ]
}

/// Sleep one step; false once the dashboard is stopping.
fn step(handle: &DashboardHandle, step: Duration) -> bool {
    thread::sleep(step);
    !handle.signal().is_stopped()
}

impl Operations for SimulatedOps {
    fn start_download(&self, handle: &DashboardHandle) {
        let h = handle.clone();
        let datasets = self.datasets.clone();
        let pause = self.step;
        self.spawn(handle, "download", move || {
            for id in datasets {
                let mut r = h.download_reporter(id.clone());
                r.start(format!("{id}.parquet"));
                for chunk in 1..=CHUNKS {
                    if !step(&h, pause) {
                        r.fail("dashboard stopped");
                        return;
                    }
                    r.transfer(DATASET_BYTES * chunk / CHUNKS, DATASET_BYTES);
                }
                tracing::info!(dataset = %id, "simulated download finished");
                r.complete();
            }
        });
    }

    fn start_training(&self, handle: &DashboardHandle) {
        let h = handle.clone();
        let pause = self.step * 2;
        let panel = self.panel.clone();
        let datasets = self.datasets.clone();
        // Report the start here so the reserved training slot is consumed
        // before this call returns.
        let mut r = handle.reporter(OperationKind::Train);
        r.start("lgbm_small");
        self.spawn(handle, "train", move || {
            let mut score = 0.0;
            for epoch in 1..=EPOCHS {
                if !step(&h, pause) {
                    r.fail("dashboard stopped");
                    return;
                }
                let loss = 0.25 / f64::from(epoch);
                score = 0.01 + 0.002 * f64::from(epoch);
                let val = (epoch == EPOCHS).then_some(score);
                r.epoch(epoch, EPOCHS, Some(loss), val);
            }
            r.complete();
            panel.set(panel_lines(&datasets, Some(score)));
        });
    }

    fn start_submit(&self, handle: &DashboardHandle) {
        let h = handle.clone();
        let pause = self.step;
        self.spawn(handle, "submit", move || {
            let mut r = h.reporter(OperationKind::Upload);
            r.start("predictions.csv");
            let total = 2 * 1024 * 1024;
            for chunk in 1..=4u64 {
                if !step(&h, pause) {
                    r.fail("dashboard stopped");
                    return;
                }
                r.transfer(total * chunk / 4, total);
            }
            r.complete();
        });
    }

    fn start_prediction(&self, handle: &DashboardHandle) {
        let h = handle.clone();
        let pause = self.step;
        self.spawn(handle, "predict", move || {
            let mut r = h.reporter(OperationKind::Predict);
            r.start("live");
            for batch in 1..=10u64 {
                if !step(&h, pause) {
                    r.fail("dashboard stopped");
                    return;
                }
                r.rows(LIVE_ROWS * batch / 10, LIVE_ROWS);
            }
            r.complete();
        });
    }
}
