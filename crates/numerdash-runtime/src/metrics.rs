#![forbid(unsafe_code)]

//! Host metrics sampling for the header.
//!
//! The render loop calls [`MetricsSource::sample`] once per frame. Samples are
//! never cached across frames; the sysinfo handles are reused only to keep
//! CPU usage deltas meaningful.

use std::path::{Path, PathBuf};

use numerdash_core::metrics::SystemMetricsSnapshot;
use sysinfo::{Disks, System};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Source of host metrics.
pub trait MetricsSource: Send {
    /// Take a fresh sample.
    fn sample(&mut self) -> SystemMetricsSnapshot;
}

/// Metrics read from the host through `sysinfo`.
pub struct SysinfoMetrics {
    system: System,
    disks: Disks,
    data_dir: PathBuf,
}

impl std::fmt::Debug for SysinfoMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SysinfoMetrics")
            .field("data_dir", &self.data_dir)
            .finish_non_exhaustive()
    }
}

impl SysinfoMetrics {
    /// Sample the disk holding `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        let data_dir = data_dir.canonicalize().unwrap_or(data_dir);
        let mut system = System::new();
        // Prime the CPU counters; the first usage reading needs a baseline.
        system.refresh_cpu_usage();
        Self {
            system,
            disks: Disks::new_with_refreshed_list(),
            data_dir,
        }
    }

    fn disk_space(&self) -> (f64, f64) {
        best_mount(
            &self.data_dir,
            self.disks
                .list()
                .iter()
                .map(|d| (d.mount_point(), d.available_space(), d.total_space())),
        )
        .map_or((0.0, 0.0), |(free, total)| {
            (free as f64 / GIB, total as f64 / GIB)
        })
    }
}

/// Pick the disk whose mount point is the longest prefix of `path`.
fn best_mount<'a>(
    path: &Path,
    disks: impl Iterator<Item = (&'a Path, u64, u64)>,
) -> Option<(u64, u64)> {
    disks
        .filter(|(mount, _, _)| path.starts_with(mount))
        .max_by_key(|(mount, _, _)| mount.components().count())
        .map(|(_, free, total)| (free, total))
}

impl MetricsSource for SysinfoMetrics {
    fn sample(&mut self) -> SystemMetricsSnapshot {
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();
        self.disks.refresh(true);
        let (disk_free_gb, disk_total_gb) = self.disk_space();
        SystemMetricsSnapshot {
            cpu_percent: f64::from(self.system.global_cpu_usage()),
            mem_used_gb: self.system.used_memory() as f64 / GIB,
            mem_total_gb: self.system.total_memory() as f64 / GIB,
            disk_free_gb,
            disk_total_gb,
            uptime_seconds: System::uptime(),
        }
    }
}

/// Constant metrics, for tests and headless runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedMetrics(pub SystemMetricsSnapshot);

impl MetricsSource for FixedMetrics {
    fn sample(&mut self) -> SystemMetricsSnapshot {
        self.0
    }
}
