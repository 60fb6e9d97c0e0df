//! Metric sources queried by the sampler.

use crate::error::MetricError;
use crate::snapshot::Snapshot;
use optix_kernels::Timestamp;
use sysinfo::{Pid, System};

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Pulls one instantaneous resource snapshot. Called from the sampler thread on every tick,
/// so implementations must return well within the sampling interval.
pub trait MetricSource: Send {
    fn sample(&mut self) -> Result<Snapshot, MetricError>;
}

/// Optional accelerator readings. Utilization is 0–100; the rest default to unavailable.
pub trait AcceleratorGauge: Send {
    fn utilization(&mut self) -> Option<f64>;

    fn power_watts(&mut self) -> Option<f64> {
        None
    }

    fn temperature_celsius(&mut self) -> Option<f64> {
        None
    }
}

/// Host CPU and process memory via `sysinfo`, plus an optional accelerator gauge.
pub struct SysinfoSource {
    system: System,
    pid: Option<Pid>,
    gauge: Option<Box<dyn AcceleratorGauge>>,
}

impl SysinfoSource {
    pub fn new() -> Self {
        let mut system = System::new();
        // CPU usage is a delta between refreshes; prime the first reading.
        system.refresh_cpu();
        system.refresh_memory();

        Self {
            system,
            pid: sysinfo::get_current_pid().ok(),
            gauge: None,
        }
    }

    pub fn with_gauge<G>(mut self, gauge: G) -> Self
    where
        G: AcceleratorGauge + 'static,
    {
        self.gauge = Some(Box::new(gauge));
        self
    }
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricSource for SysinfoSource {
    fn sample(&mut self) -> Result<Snapshot, MetricError> {
        self.system.refresh_cpu();
        self.system.refresh_memory();

        let pid = self.pid.ok_or(MetricError::ProcessUnavailable)?;
        if !self.system.refresh_process(pid) {
            return Err(MetricError::ProcessUnavailable);
        }
        let process = self
            .system
            .process(pid)
            .ok_or(MetricError::ProcessUnavailable)?;

        let rss_bytes = process.memory() as f64;
        let total_bytes = self.system.total_memory() as f64;
        let ram_percent = if total_bytes > 0.0 {
            rss_bytes / total_bytes * 100.0
        } else {
            0.0
        };
        let cpu_percent = self.system.global_cpu_info().cpu_usage() as f64;
        let (gpu_util, power, temperature) = match self.gauge.as_mut() {
            Some(gauge) => (
                gauge.utilization(),
                gauge.power_watts(),
                gauge.temperature_celsius(),
            ),
            None => (None, None, None),
        };

        Ok(Snapshot::new(
            Timestamp::now(),
            cpu_percent,
            rss_bytes / BYTES_PER_MB,
            ram_percent,
            gpu_util,
        )
        .with_accelerator_telemetry(power, temperature))
    }
}

/// Replays a fixed sequence of readings, restamped with the current time, cycling at the end.
pub struct ReplaySource {
    readings: Vec<Snapshot>,
    cursor: usize,
}

impl ReplaySource {
    pub fn new(readings: Vec<Snapshot>) -> Self {
        Self {
            readings,
            cursor: 0,
        }
    }

    /// A source that reports the same reading on every tick.
    pub fn constant(cpu_percent: f64, gpu_util: Option<f64>) -> Self {
        Self::new(vec![Snapshot::new(
            Timestamp::default(),
            cpu_percent,
            256.0,
            1.0,
            gpu_util,
        )])
    }
}

impl MetricSource for ReplaySource {
    fn sample(&mut self) -> Result<Snapshot, MetricError> {
        if self.readings.is_empty() {
            return Err(MetricError::Empty);
        }
        let template = self.readings[self.cursor % self.readings.len()];
        self.cursor += 1;
        Ok(Snapshot {
            timestamp: Timestamp::now(),
            ..template
        })
    }
}

#[cfg(feature = "nvml")]
pub use nvml::NvmlGauge;

#[cfg(feature = "nvml")]
mod nvml {
    use super::AcceleratorGauge;
    use crate::error::MetricError;
    use nvml_wrapper::enum_wrappers::device::TemperatureSensor;
    use nvml_wrapper::{Device, Nvml};

    /// Utilization, power draw and temperature of one NVIDIA device via NVML.
    pub struct NvmlGauge {
        nvml: Nvml,
        device_index: u32,
    }

    impl NvmlGauge {
        pub fn new(device_index: u32) -> Result<Self, MetricError> {
            let nvml = Nvml::init().map_err(|err| MetricError::Accelerator(err.to_string()))?;
            Ok(Self { nvml, device_index })
        }

        fn device(&self) -> Option<Device<'_>> {
            self.nvml.device_by_index(self.device_index).ok()
        }
    }

    impl AcceleratorGauge for NvmlGauge {
        fn utilization(&mut self) -> Option<f64> {
            let rates = self.device()?.utilization_rates().ok()?;
            Some(rates.gpu as f64)
        }

        fn power_watts(&mut self) -> Option<f64> {
            let milliwatts = self.device()?.power_usage().ok()?;
            Some(milliwatts as f64 / 1000.0)
        }

        fn temperature_celsius(&mut self) -> Option<f64> {
            let celsius = self.device()?.temperature(TemperatureSensor::Gpu).ok()?;
            Some(celsius as f64)
        }
    }
}
