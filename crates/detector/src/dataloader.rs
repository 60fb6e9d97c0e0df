//! Data-loading stall detection.

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
pub struct DataLoaderThresholds {
    /// CPU utilization at or above which the host counts as busy.
    pub cpu_high_percent: f64,
    /// Accelerator utilization at or below which it counts as starved.
    pub gpu_low_percent: f64,
    /// A starved window must last strictly longer than this.
    #[serde(rename = "min_duration_ms", with = "duration_ms")]
    pub min_duration: Duration,
    /// Count snapshots without an accelerator reading as starved.
    pub treat_missing_accelerator_as_idle: bool,
}

impl Default for DataLoaderThresholds {
    fn default() -> Self {
        Self {
            cpu_high_percent: 80.0,
            gpu_low_percent: 10.0,
            min_duration: Duration::from_secs(3),
            treat_missing_accelerator_as_idle: false,
        }
    }
}

/// Flags windows where the CPU is saturated while the accelerator sits near zero: the input
/// pipeline, not the compute kernel, is the bottleneck.
#[derive(Debug, Clone, Default)]
pub struct DataLoaderDetector {
    thresholds: DataLoaderThresholds,
}

impl DataLoaderDetector {
    pub fn new(thresholds: DataLoaderThresholds) -> Self {
        Self { thresholds }
    }

    fn starved(&self, snapshot: &Snapshot) -> bool {
        let gpu_starved = snapshot
            .gpu_util
            .map_or(self.thresholds.treat_missing_accelerator_as_idle, |gpu| {
                gpu <= self.thresholds.gpu_low_percent
            });
        snapshot.cpu_percent >= self.thresholds.cpu_high_percent && gpu_starved
    }
}

impl Detector for DataLoaderDetector {
    fn name(&self) -> &str {
        "dataloader"
    }

    fn detect(&self, trace: &Trace<'_>) -> Result<Vec<Issue>> {
        let snapshots = trace.snapshots;
        let issues = sustained_windows(snapshots, self.thresholds.min_duration, |s| {
            self.starved(s)
        })
        .into_iter()
        .map(|window| {
            let evidence = Evidence::for_window(snapshots, window.start, window.end, trace.kernels);
            let slice = &snapshots[window.start..=window.end];
            let avg_cpu = slice.iter().map(|s| s.cpu_percent).sum::<f64>() / slice.len() as f64;
            let avg_gpu =
                slice.iter().filter_map(|s| s.gpu_util).sum::<f64>() / slice.len() as f64;

            let mut description = format!(
                "CPU averaged {:.0}% while the accelerator averaged {:.0}% for {:.1}s; \
                 data loading is likely starving the compute kernels",
                avg_cpu,
                avg_gpu,
                evidence.duration().as_secs_f64()
            );
            if !trace.kernels.is_empty() && evidence.kernel_time.is_zero() {
                description.push_str(" (no kernel ran during this window)");
            }

            Issue {
                kind: IssueKind::DataloaderStall,
                severity: Severity::for_window(evidence.duration(), self.thresholds.min_duration),
                description,
                evidence,
            }
        })
        .collect();

        Ok(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::test_support::per_second;

    #[test]
    fn empty_log_yields_no_issues() {
        let issues = DataLoaderDetector::default()
            .detect(&Trace::from_snapshots(&[]))
            .unwrap();
        assert!(issues.is_empty());
    }

    #[test]
    fn sustained_starvation_is_reported_with_its_window() {
        let mut readings = vec![(20.0, Some(60.0)); 2];
        readings.extend(vec![(95.0, Some(0.0)); 5]);
        readings.push((30.0, Some(70.0)));
        let snapshots = per_second(&readings);

        let issues = DataLoaderDetector::default()
            .detect(&Trace::from_snapshots(&snapshots))
            .unwrap();

        assert_eq!(issues.len(), 1);
        let issue = &issues[0];
        assert_eq!(issue.kind, IssueKind::DataloaderStall);
        assert_eq!(issue.severity, Severity::Warning);
        assert_eq!((issue.evidence.start_index, issue.evidence.end_index), (2, 6));
        assert_eq!(issue.evidence.duration(), Duration::from_secs(4));
    }

    #[test]
    fn starvation_lasting_exactly_the_threshold_is_not_reported() {
        let snapshots = per_second(&[(95.0, Some(0.0)); 4]);
        let issues = DataLoaderDetector::default()
            .detect(&Trace::from_snapshots(&snapshots))
            .unwrap();
        assert!(issues.is_empty());
    }

    #[test]
    fn short_bursts_are_ignored() {
        let snapshots = per_second(&[(95.0, Some(0.0)), (95.0, Some(0.0)), (10.0, Some(0.0))]);
        let issues = DataLoaderDetector::default()
            .detect(&Trace::from_snapshots(&snapshots))
            .unwrap();
        assert!(issues.is_empty());
    }

    #[test]
    fn missing_accelerator_readings_only_count_when_configured() {
        let snapshots = per_second(&[(95.0, None); 6]);
        let strict = DataLoaderDetector::default()
            .detect(&Trace::from_snapshots(&snapshots))
            .unwrap();
        assert!(strict.is_empty());

        let lenient = DataLoaderDetector::new(DataLoaderThresholds {
            treat_missing_accelerator_as_idle: true,
            ..DataLoaderThresholds::default()
        })
        .detect(&Trace::from_snapshots(&snapshots))
        .unwrap();
        assert_eq!(lenient.len(), 1);
    }
}
