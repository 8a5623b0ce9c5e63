//! Shared fixtures for runtime loop tests.

#![allow(dead_code)]

use std::io::{self, Write};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use numerdash_core::{DashboardConfig, DashboardHandle, Operations, SystemMetricsSnapshot};
use numerdash_runtime::{ChannelKeySource, Dashboard, FixedMetrics, FixedSize, KeyEvent};

/// In-memory terminal shared between the render thread and the test.
#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Records which operations were requested.
#[derive(Default)]
pub struct RecordingOps {
    calls: Mutex<Vec<&'static str>>,
}

impl RecordingOps {
    pub fn count(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == name).count()
    }
}

impl Operations for RecordingOps {
    fn start_download(&self, _handle: &DashboardHandle) {
        self.calls.lock().unwrap().push("download");
    }

    fn start_submit(&self, _handle: &DashboardHandle) {
        self.calls.lock().unwrap().push("submit");
    }
}

/// Short cadences so loop tests finish quickly.
pub fn fast_config() -> DashboardConfig {
    DashboardConfig::default()
        .with_refresh_rates(Duration::from_millis(40), Duration::from_millis(10))
}

pub struct Harness {
    pub dashboard: Dashboard,
    pub keys: Sender<KeyEvent>,
    pub out: SharedBuf,
    pub ops: Arc<RecordingOps>,
}

pub fn harness(config: DashboardConfig) -> Harness {
    let (keys, source) = ChannelKeySource::channel();
    let out = SharedBuf::default();
    let ops = Arc::new(RecordingOps::default());
    let dashboard = Dashboard::builder(config)
        .output(out.clone())
        .size_source(FixedSize::new(100, 30))
        .metrics_source(FixedMetrics(SystemMetricsSnapshot {
            cpu_percent: 12.0,
            mem_used_gb: 4.0,
            mem_total_gb: 16.0,
            disk_free_gb: 100.0,
            disk_total_gb: 500.0,
            uptime_seconds: 3600,
        }))
        .key_source(source)
        .operations_arc(ops.clone())
        .build()
        .unwrap();
    Harness {
        dashboard,
        keys,
        out,
        ops,
    }
}

/// Poll `cond` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    cond()
}

pub fn events(handle: &DashboardHandle) -> Vec<String> {
    handle
        .state()
        .with_state(|s| s.events().iter().map(|e| e.message().to_string()).collect())
        .unwrap()
}
