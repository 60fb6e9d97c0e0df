//! One-call profiling facade.

use crate::config::OptixConfig;
use crate::optimizer::ModelOptimizer;
use crate::report::ProfileReport;
use anyhow::Result;
use optix_detector::{DetectorPipeline, RunSummary, Trace};
use optix_device::{DeviceCapabilityProbe, SmartSelector, WgpuProbe};
use optix_kernels::{DynKernelTracer, KernelEvent};
use optix_profiler::{
    MetricSource, Poll, SamplingSession, SessionError, Snapshot, SpanTracker, SysinfoSource,
};
use std::time::Duration;
use tracing::{info, warn};

/// Wraps a [`SamplingSession`] together with device placement and issue detection.
///
/// ```no_run
/// # fn main() -> anyhow::Result<()> {
/// let mut optix = optix::AutoOptimizer::from_env()?;
/// optix.start()?;
/// // ... run the workload ...
/// let snapshots = optix.stop()?;
/// println!("{} snapshots", snapshots.len());
/// println!("{}", optix.analyze().to_markdown());
/// # Ok(())
/// # }
/// ```
pub struct AutoOptimizer {
    config: OptixConfig,
    session: SamplingSession,
    selector: SmartSelector,
    pipeline: DetectorPipeline,
    spans: SpanTracker,
    snapshots: Vec<Snapshot>,
    last_events: Vec<KernelEvent>,
    run_duration: Duration,
    dropped_before_run: u64,
}

impl AutoOptimizer {
    pub fn new<S>(config: OptixConfig, source: S, probe: &dyn DeviceCapabilityProbe) -> Self
    where
        S: MetricSource + 'static,
    {
        let session = SamplingSession::new(config.session.clone(), source);
        let selector = SmartSelector::from_probe(probe, config.placement);
        let pipeline =
            DetectorPipeline::with_thresholds(config.dataloader.clone(), config.gpu_idle.clone());
        Self {
            config,
            session,
            selector,
            pipeline,
            spans: SpanTracker::new(),
            snapshots: Vec::new(),
            last_events: Vec::new(),
            run_duration: Duration::ZERO,
            dropped_before_run: 0,
        }
    }

    /// Host metrics via `sysinfo`, GPUs via `wgpu`, configuration from the environment.
    pub fn from_env() -> Result<Self> {
        let config = OptixConfig::from_env()?;
        Ok(Self::new(config, default_source(), &WgpuProbe::new()))
    }

    /// Replace the detector pipeline, e.g. to register additional detectors.
    pub fn with_pipeline(mut self, pipeline: DetectorPipeline) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn start(&mut self) -> Result<(), SessionError> {
        self.session.start()?;
        self.spans.clear();
        self.snapshots.clear();
        self.last_events.clear();
        self.run_duration = Duration::ZERO;
        self.dropped_before_run = self.session.dropped_events();
        Ok(())
    }

    /// Stop sampling and return the snapshot log of the run.
    pub fn stop(&mut self) -> Result<Vec<Snapshot>, SessionError> {
        self.session.stop()?;
        self.run_duration = self.session.elapsed();

        let Poll { events, snapshots } = self.session.poll();
        self.spans.ingest(&events);
        self.last_events = events;
        self.snapshots = snapshots.clone();

        let dangling = self.spans.dangling().len();
        if dangling > 0 {
            warn!(dangling, "kernels still open when the run stopped");
        }
        Ok(snapshots)
    }

    /// Drain kernel events mid-run. Drained events still count towards [`analyze`](Self::analyze).
    pub fn poll(&mut self) -> Poll {
        let poll = self.session.poll();
        self.spans.ingest(&poll.events);
        poll
    }

    pub fn is_running(&self) -> bool {
        self.session.is_running()
    }

    /// Kernel events drained by the final poll in [`stop`](Self::stop).
    pub fn last_events(&self) -> &[KernelEvent] {
        &self.last_events
    }

    /// Snapshot log of the last finished run.
    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn tracer(&self) -> DynKernelTracer {
        self.session.tracer()
    }

    pub fn selector(&self) -> &SmartSelector {
        &self.selector
    }

    pub fn config(&self) -> &OptixConfig {
        &self.config
    }

    /// A [`ModelOptimizer`] sharing this instance's placement and reporting to its session.
    pub fn model_optimizer(&self) -> ModelOptimizer {
        ModelOptimizer::new(self.selector.clone())
            .with_tracer(self.tracer())
            .with_accelerator(self.config.use_accelerator_if_available)
    }

    /// Run the detector pipeline over the last finished run.
    pub fn analyze(&self) -> ProfileReport {
        let spans = self.spans.spans();
        let analysis = self.pipeline.run(&Trace::new(&self.snapshots, spans));
        let summary = RunSummary::from_run(
            &self.snapshots,
            spans,
            self.session.dropped_events() - self.dropped_before_run,
            self.run_duration,
        );
        info!(
            issues = analysis.issues.len(),
            failures = analysis.failures.len(),
            samples = summary.samples,
            "analysis finished"
        );
        ProfileReport::new(summary, analysis)
    }
}

#[cfg(not(feature = "nvml"))]
pub(crate) fn default_source() -> SysinfoSource {
    SysinfoSource::new()
}

#[cfg(feature = "nvml")]
pub(crate) fn default_source() -> SysinfoSource {
    match optix_profiler::NvmlGauge::new(0) {
        Ok(gauge) => SysinfoSource::new().with_gauge(gauge),
        Err(err) => {
            warn!(error = %err, "NVML unavailable; sampling without accelerator utilization");
            SysinfoSource::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use optix_device::{Device, DeviceCapability, StaticProbe};
    use optix_profiler::ReplaySource;

    fn fast_config() -> OptixConfig {
        let mut config = OptixConfig::default();
        config.session.interval = Duration::from_millis(5);
        config
    }

    #[test]
    fn stop_returns_the_snapshot_log() {
        let mut optix = AutoOptimizer::new(
            fast_config(),
            ReplaySource::constant(30.0, Some(40.0)),
            &StaticProbe::unavailable("test"),
        );
        optix.start().unwrap();
        std::thread::sleep(Duration::from_millis(25));
        let snapshots = optix.stop().unwrap();

        assert!(!snapshots.is_empty());
        assert_eq!(optix.snapshots(), snapshots.as_slice());
        assert!(matches!(optix.stop(), Err(SessionError::NotRunning)));
    }

    #[test]
    fn errors_propagate_from_session() {
        let mut optix = AutoOptimizer::new(
            fast_config(),
            ReplaySource::constant(30.0, None),
            &StaticProbe::unavailable("test"),
        );
        optix.start().unwrap();
        assert!(matches!(optix.start(), Err(SessionError::AlreadyRunning)));
        optix.stop().unwrap();
    }

    #[test]
    fn model_optimizer_reports_into_the_session() {
        let mut optix = AutoOptimizer::new(
            fast_config(),
            ReplaySource::constant(30.0, None),
            &StaticProbe::available(DeviceCapability::cpu()),
        );
        optix.start().unwrap();
        let result = optix
            .model_optimizer()
            .optimize(&[1.0, 0.0, 0.0, 1.0], 2, 2)
            .unwrap();
        optix.stop().unwrap();

        assert_eq!(result.device, Device::Cpu);
        assert_eq!(optix.last_events().len(), 2);
        assert_eq!(optix.analyze().summary.kernel_count, 1);
    }

    #[test]
    fn disabled_accelerator_is_honored() {
        let mut config = fast_config();
        config.use_accelerator_if_available = false;
        let optix = AutoOptimizer::new(
            config,
            ReplaySource::constant(30.0, None),
            &StaticProbe::available(DeviceCapability::accelerator("FakeGPU", 1)),
        );
        assert!(optix.selector().has_accelerator());
        let data = vec![1.0; 128 * 128];
        let result = optix.model_optimizer().optimize(&data, 128, 128).unwrap();
        assert_eq!(result.device, Device::Cpu);
    }
}
