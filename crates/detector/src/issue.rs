//! Detected issues and their evidence.

use optix_kernels::Timestamp;
use optix_profiler::{KernelSpan, Snapshot};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    DataloaderStall,
    GpuIdle,
    /// Issue kinds contributed by detectors outside this crate.
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    /// `Warning`, or `Critical` once a window lasts three times its threshold.
    pub fn for_window(duration: Duration, threshold: Duration) -> Self {
        if duration >= threshold.saturating_mul(3) {
            Severity::Critical
        } else {
            Severity::Warning
        }
    }
}

/// The offending snapshot range, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub start_index: usize,
    pub end_index: usize,
    pub start: Timestamp,
    pub end: Timestamp,
    /// Kernel execution time overlapping the window.
    #[serde(rename = "kernel_time_ns", with = "nanos")]
    pub kernel_time: Duration,
}

impl Evidence {
    pub fn for_window(
        snapshots: &[Snapshot],
        start_index: usize,
        end_index: usize,
        kernels: &[KernelSpan],
    ) -> Self {
        let start = snapshots[start_index].timestamp;
        let end = snapshots[end_index].timestamp;
        let kernel_time = kernels.iter().map(|span| span.overlap(start, end)).sum();
        Self {
            start_index,
            end_index,
            start,
            end,
            kernel_time,
        }
    }

    pub fn duration(&self) -> Duration {
        self.end.duration_since(self.start)
    }

    pub fn len(&self) -> usize {
        self.end_index - self.start_index + 1
    }
}

mod nanos {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_nanos() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_nanos)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub kind: IssueKind,
    pub severity: Severity,
    pub description: String,
    pub evidence: Evidence,
}
