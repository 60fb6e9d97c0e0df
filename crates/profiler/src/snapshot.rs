//! Resource snapshots and the append-only snapshot log.

use optix_kernels::Timestamp;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One timestamped resource-usage reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: Timestamp,
    /// System-wide CPU utilization; may exceed 100 on some platforms, never negative.
    pub cpu_percent: f64,
    /// Resident memory of the profiled process.
    pub ram_used_mb: f64,
    /// Resident memory as a share of total system memory (0–100).
    pub ram_percent: f64,
    /// Accelerator utilization (0–100) when an accelerator gauge is attached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_util: Option<f64>,
    /// Accelerator board power draw in watts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_power_w: Option<f64>,
    /// Accelerator core temperature in degrees Celsius.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_temp_c: Option<f64>,
}

impl Snapshot {
    /// Build a snapshot, clamping every reading into its valid range.
    pub fn new(
        timestamp: Timestamp,
        cpu_percent: f64,
        ram_used_mb: f64,
        ram_percent: f64,
        gpu_util: Option<f64>,
    ) -> Self {
        Self {
            timestamp,
            cpu_percent: non_negative(cpu_percent),
            ram_used_mb: non_negative(ram_used_mb),
            ram_percent: percent(ram_percent),
            gpu_util: gpu_util.map(percent),
            gpu_power_w: None,
            gpu_temp_c: None,
        }
    }

    /// Attach accelerator power and temperature readings. Non-finite values are discarded.
    pub fn with_accelerator_telemetry(
        mut self,
        power_watts: Option<f64>,
        temperature_celsius: Option<f64>,
    ) -> Self {
        self.gpu_power_w = power_watts.filter(|w| w.is_finite()).map(non_negative);
        self.gpu_temp_c = temperature_celsius.filter(|c| c.is_finite());
        self
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        0.0
    }
}

fn percent(value: f64) -> f64 {
    non_negative(value).min(100.0)
}

/// Ordered snapshot log: one writer appends, any number of readers copy the committed prefix.
#[derive(Debug, Clone, Default)]
pub struct SnapshotLog {
    entries: Arc<RwLock<Vec<Snapshot>>>,
}

impl SnapshotLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, snapshot: Snapshot) {
        self.entries.write().push(snapshot);
    }

    /// Copy of everything appended so far, in sampling order.
    pub fn view(&self) -> Vec<Snapshot> {
        self.entries.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn last(&self) -> Option<Snapshot> {
        self.entries.read().last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readings_are_clamped() {
        let snapshot = Snapshot::new(Timestamp::from_nanos(1), -3.0, f64::NAN, 140.0, Some(-1.0));
        assert_eq!(snapshot.cpu_percent, 0.0);
        assert_eq!(snapshot.ram_used_mb, 0.0);
        assert_eq!(snapshot.ram_percent, 100.0);
        assert_eq!(snapshot.gpu_util, Some(0.0));
    }

    #[test]
    fn log_preserves_insertion_order() {
        let log = SnapshotLog::new();
        for i in 0..4 {
            log.push(Snapshot::new(Timestamp::from_nanos(i), i as f64, 1.0, 1.0, None));
        }
        let view = log.view();
        assert_eq!(view.len(), 4);
        assert!(view.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(log.last().map(|s| s.cpu_percent), Some(3.0));
    }

    #[test]
    fn missing_gpu_util_is_omitted_from_json() {
        let snapshot = Snapshot::new(Timestamp::from_nanos(5), 10.0, 20.0, 1.0, None);
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(!json.contains("gpu_util"));
        assert!(!json.contains("gpu_power_w"));
        let back: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn accelerator_telemetry_is_sanitized() {
        let snapshot = Snapshot::new(Timestamp::from_nanos(1), 1.0, 1.0, 1.0, Some(50.0))
            .with_accelerator_telemetry(Some(-4.0), Some(f64::NAN));
        assert_eq!(snapshot.gpu_power_w, Some(0.0));
        assert_eq!(snapshot.gpu_temp_c, None);

        let snapshot = snapshot.with_accelerator_telemetry(Some(212.5), Some(67.0));
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"gpu_power_w\":212.5"));
        assert!(json.contains("\"gpu_temp_c\":67.0"));
    }
}
