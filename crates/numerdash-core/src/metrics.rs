#![forbid(unsafe_code)]

//! Host metrics snapshot shown in the header.

/// One sample of host resource usage.
///
/// Recomputed for every frame; never cached across frames.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SystemMetricsSnapshot {
    /// Global CPU usage in percent.
    pub cpu_percent: f64,
    /// Used memory in GiB.
    pub mem_used_gb: f64,
    /// Total memory in GiB.
    pub mem_total_gb: f64,
    /// Free space on the data disk in GiB.
    pub disk_free_gb: f64,
    /// Total space on the data disk in GiB.
    pub disk_total_gb: f64,
    /// Host uptime.
    pub uptime_seconds: u64,
}

impl SystemMetricsSnapshot {
    /// Memory usage in percent, 0 when the total is unknown.
    #[must_use]
    pub fn mem_percent(&self) -> f64 {
        percent_of(self.mem_used_gb, self.mem_total_gb)
    }

    /// Disk usage in percent, 0 when the total is unknown.
    #[must_use]
    pub fn disk_used_percent(&self) -> f64 {
        percent_of(self.disk_total_gb - self.disk_free_gb, self.disk_total_gb)
    }

    /// Uptime as `1d 02:03:04` or `02:03:04`.
    #[must_use]
    pub fn uptime_display(&self) -> String {
        let secs = self.uptime_seconds;
        let days = secs / 86_400;
        let h = (secs % 86_400) / 3600;
        let m = (secs % 3600) / 60;
        let s = secs % 60;
        if days > 0 {
            format!("{days}d {h:02}:{m:02}:{s:02}")
        } else {
            format!("{h:02}:{m:02}:{s:02}")
        }
    }
}

fn percent_of(part: f64, total: f64) -> f64 {
    if total > 0.0 {
        (part / total * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentages_handle_zero_totals() {
        let snap = SystemMetricsSnapshot::default();
        assert_eq!(snap.mem_percent(), 0.0);
        assert_eq!(snap.disk_used_percent(), 0.0);
    }

    #[test]
    fn disk_percent_uses_free_space() {
        let snap = SystemMetricsSnapshot {
            disk_free_gb: 25.0,
            disk_total_gb: 100.0,
            ..Default::default()
        };
        assert_eq!(snap.disk_used_percent(), 75.0);
    }

    #[test]
    fn uptime_formats_days() {
        let snap = SystemMetricsSnapshot {
            uptime_seconds: 86_400 + 3723,
            ..Default::default()
        };
        assert_eq!(snap.uptime_display(), "1d 01:02:03");
        let short = SystemMetricsSnapshot {
            uptime_seconds: 59,
            ..Default::default()
        };
        assert_eq!(short.uptime_display(), "00:00:59");
    }
}
