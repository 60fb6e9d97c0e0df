//! Running a set of detectors over one trace.

use crate::dataloader::{DataLoaderDetector, DataLoaderThresholds};
use crate::detector::{DynDetector, Trace};
use crate::gpu_idle::{GpuIdleDetector, GpuIdleThresholds};
use crate::issue::Issue;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

/// A detector that errored or panicked instead of producing issues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorFailure {
    pub detector: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    /// Issues from every detector that completed, in registration order.
    pub issues: Vec<Issue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<DetectorFailure>,
}

impl Analysis {
    /// True when every detector ran to completion.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Clone, Default)]
pub struct DetectorPipeline {
    detectors: Vec<DynDetector>,
}

impl DetectorPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_detectors() -> Self {
        Self::with_thresholds(DataLoaderThresholds::default(), GpuIdleThresholds::default())
    }

    pub fn with_thresholds(dataloader: DataLoaderThresholds, gpu_idle: GpuIdleThresholds) -> Self {
        let mut pipeline = Self::new();
        pipeline.register(Arc::new(DataLoaderDetector::new(dataloader)));
        pipeline.register(Arc::new(GpuIdleDetector::new(gpu_idle)));
        pipeline
    }

    pub fn register(&mut self, detector: DynDetector) {
        self.detectors.push(detector);
    }

    pub fn detectors(&self) -> &[DynDetector] {
        &self.detectors
    }

    /// Run every detector on the same trace. A detector that fails or panics is recorded in
    /// [`Analysis::failures`] and does not affect the others.
    pub fn run(&self, trace: &Trace<'_>) -> Analysis {
        let outcomes: Vec<(String, Result<Vec<Issue>, String>)> = self
            .detectors
            .par_iter()
            .map(|detector| {
                let outcome = catch_unwind(AssertUnwindSafe(|| detector.detect(trace)));
                let result = match outcome {
                    Ok(Ok(issues)) => Ok(issues),
                    Ok(Err(err)) => Err(format!("{err:#}")),
                    Err(payload) => Err(format!("panicked: {}", panic_message(&*payload))),
                };
                (detector.name().to_string(), result)
            })
            .collect();

        let mut analysis = Analysis::default();
        for (detector, result) in outcomes {
            match result {
                Ok(issues) => {
                    debug!(%detector, issues = issues.len(), "detector finished");
                    analysis.issues.extend(issues);
                }
                Err(message) => {
                    warn!(%detector, %message, "detector failed");
                    analysis.failures.push(DetectorFailure { detector, message });
                }
            }
        }
        analysis
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::Detector;
    use crate::issue::IssueKind;
    use crate::window::test_support::per_second;
    use anyhow::bail;

    struct Failing;

    impl Detector for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn detect(&self, _trace: &Trace<'_>) -> anyhow::Result<Vec<Issue>> {
            bail!("missing input")
        }
    }

    struct Panicking;

    impl Detector for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        fn detect(&self, _trace: &Trace<'_>) -> anyhow::Result<Vec<Issue>> {
            panic!("index out of range")
        }
    }

    fn stalled_run() -> Vec<optix_profiler::Snapshot> {
        per_second(&[(95.0, Some(1.0)); 5])
    }

    #[test]
    fn default_pipeline_reports_stall() {
        let snapshots = stalled_run();
        let analysis =
            DetectorPipeline::with_default_detectors().run(&Trace::from_snapshots(&snapshots));
        assert!(analysis.is_complete());
        assert_eq!(analysis.issues.len(), 1);
        assert_eq!(analysis.issues[0].kind, IssueKind::DataloaderStall);
    }

    #[test]
    fn failing_detector_does_not_hide_other_issues() {
        let snapshots = stalled_run();
        let mut pipeline = DetectorPipeline::with_default_detectors();
        pipeline.register(Arc::new(Failing));

        let analysis = pipeline.run(&Trace::from_snapshots(&snapshots));
        assert_eq!(analysis.issues.len(), 1);
        assert_eq!(
            analysis.failures,
            vec![DetectorFailure {
                detector: "failing".into(),
                message: "missing input".into(),
            }]
        );
    }

    #[test]
    fn panicking_detector_is_isolated() {
        let snapshots = stalled_run();
        let mut pipeline = DetectorPipeline::new();
        pipeline.register(Arc::new(Panicking));
        pipeline.register(Arc::new(DataLoaderDetector::default()));

        let analysis = pipeline.run(&Trace::from_snapshots(&snapshots));
        assert_eq!(analysis.issues.len(), 1);
        assert_eq!(analysis.failures.len(), 1);
        assert_eq!(analysis.failures[0].detector, "panicking");
        assert!(analysis.failures[0].message.contains("index out of range"));
    }

    #[test]
    fn empty_trace_is_clean() {
        let analysis =
            DetectorPipeline::with_default_detectors().run(&Trace::from_snapshots(&[]));
        assert!(analysis.is_complete());
        assert!(analysis.issues.is_empty());
    }
}
