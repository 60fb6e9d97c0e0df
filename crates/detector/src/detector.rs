//! Detector trait and its input.

use crate::issue::Issue;
use anyhow::Result;
use optix_profiler::{KernelSpan, Snapshot};
use std::sync::Arc;

/// Everything recorded during one run.
#[derive(Debug, Clone, Copy)]
pub struct Trace<'a> {
    /// Snapshot log in sampling order.
    pub snapshots: &'a [Snapshot],
    /// Completed kernel spans; may be empty when the kernel boundary was not traced.
    pub kernels: &'a [KernelSpan],
}

impl<'a> Trace<'a> {
    pub fn new(snapshots: &'a [Snapshot], kernels: &'a [KernelSpan]) -> Self {
        Self { snapshots, kernels }
    }

    pub fn from_snapshots(snapshots: &'a [Snapshot]) -> Self {
        Self {
            snapshots,
            kernels: &[],
        }
    }
}

/// An analyzer over a finished run. Detectors never see each other's output.
pub trait Detector: Send + Sync {
    /// Name used in failure records and logs.
    fn name(&self) -> &str;

    /// Inspect the run. Must tolerate empty and short traces.
    fn detect(&self, trace: &Trace<'_>) -> Result<Vec<Issue>>;
}

pub type DynDetector = Arc<dyn Detector>;
