//! Idle accelerator detection.

use crate::detector::{Detector, Trace};
use crate::issue::{Evidence, Issue, IssueKind, Severity};
use crate::window::sustained_windows;
use anyhow::Result;
use optix_profiler::config::duration_ms;
use optix_profiler::Snapshot;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuIdleThresholds {
    /// Accelerator utilization at or below which it counts as idle.
    pub gpu_idle_percent: f64,
    /// CPU utilization at or above which the host counts as saturated.
    pub cpu_saturated_percent: f64,
    /// An idle window must last strictly longer than this.
    #[serde(rename = "min_duration_ms", with = "duration_ms")]
    pub min_duration: Duration,
}

impl Default for GpuIdleThresholds {
    fn default() -> Self {
        Self {
            gpu_idle_percent: 5.0,
            cpu_saturated_percent: 50.0,
            min_duration: Duration::from_secs(5),
        }
    }
}

/// Flags windows where the accelerator idles although the CPU has headroom, pointing at
/// synchronization or I/O waits rather than CPU-side preprocessing.
#[derive(Debug, Clone, Default)]
pub struct GpuIdleDetector {
    thresholds: GpuIdleThresholds,
}

impl GpuIdleDetector {
    pub fn new(thresholds: GpuIdleThresholds) -> Self {
        Self { thresholds }
    }

    fn idle(&self, snapshot: &Snapshot) -> bool {
        match snapshot.gpu_util {
            Some(gpu) => {
                gpu <= self.thresholds.gpu_idle_percent
                    && snapshot.cpu_percent < self.thresholds.cpu_saturated_percent
            }
            None => false,
        }
    }
}

impl Detector for GpuIdleDetector {
    fn name(&self) -> &str {
        "gpu_idle"
    }

    fn detect(&self, trace: &Trace<'_>) -> Result<Vec<Issue>> {
        let snapshots = trace.snapshots;
        let issues = sustained_windows(snapshots, self.thresholds.min_duration, |s| self.idle(s))
            .into_iter()
            .map(|window| {
                let evidence =
                    Evidence::for_window(snapshots, window.start, window.end, trace.kernels);
                Issue {
                    kind: IssueKind::GpuIdle,
                    severity: Severity::for_window(
                        evidence.duration(),
                        self.thresholds.min_duration,
                    ),
                    description: format!(
                        "accelerator idle for {:.1}s across {} samples while the CPU was not \
                         saturated; look for synchronization stalls or blocking I/O",
                        evidence.duration().as_secs_f64(),
                        evidence.len()
                    ),
                    evidence,
                }
            })
            .collect();

        Ok(issues)
    }
}
