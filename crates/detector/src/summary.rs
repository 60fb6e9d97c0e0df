//! Aggregate statistics of one profiling run.

use optix_profiler::{KernelSpan, Snapshot};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(rename = "duration_ms", with = "millis_f64")]
    pub duration: Duration,
    pub samples: usize,
    pub avg_cpu: f64,
    /// Mean over snapshots that carried an accelerator reading; `None` when none did.
    pub avg_gpu: Option<f64>,
    pub peak_ram_mb: f64,
    pub kernel_count: usize,
    #[serde(rename = "kernel_time_ms", with = "millis_f64")]
    pub kernel_time: Duration,
    pub dropped_events: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peak_gpu_power_w: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peak_gpu_temp_c: Option<f64>,
}

impl RunSummary {
    pub fn from_run(
        snapshots: &[Snapshot],
        spans: &[KernelSpan],
        dropped_events: u64,
        duration: Duration,
    ) -> Self {
        let samples = snapshots.len();
        let avg_cpu = if samples == 0 {
            0.0
        } else {
            snapshots.iter().map(|s| s.cpu_percent).sum::<f64>() / samples as f64
        };

        let gpu: Vec<f64> = snapshots.iter().filter_map(|s| s.gpu_util).collect();
        let avg_gpu = (!gpu.is_empty()).then(|| gpu.iter().sum::<f64>() / gpu.len() as f64);

        let peak_ram_mb = snapshots
            .iter()
            .map(|s| s.ram_used_mb)
            .fold(0.0_f64, f64::max);

        Self {
            duration,
            samples,
            avg_cpu,
            avg_gpu,
            peak_ram_mb,
            kernel_count: spans.len(),
            kernel_time: spans.iter().map(KernelSpan::duration).sum(),
            dropped_events,
            peak_gpu_power_w: peak(snapshots, |s| s.gpu_power_w),
            peak_gpu_temp_c: peak(snapshots, |s| s.gpu_temp_c),
        }
    }
}

/// Highest reading over the snapshots that carried one.
fn peak(snapshots: &[Snapshot], reading: impl Fn(&Snapshot) -> Option<f64>) -> Option<f64> {
    snapshots.iter().filter_map(reading).reduce(f64::max)
}

/// Durations as fractional milliseconds; kernel times are often well below one millisecond.
mod millis_f64 {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64() * 1e3)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = f64::deserialize(deserializer)?;
        Ok(Duration::from_secs_f64(millis.max(0.0) / 1e3))
    }
}
