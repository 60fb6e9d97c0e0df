//! Runtime profiling for optix.
//!
//! A [`session::SamplingSession`] runs two independent producers alongside the workload:
//! a periodic sampler appending [`snapshot::Snapshot`]s to an append-only log, and the
//! kernel boundary pushing [`optix_kernels::KernelEvent`]s into a bounded drop-oldest queue.

pub mod config;
pub mod error;
pub mod metrics;
pub mod queue;
pub mod session;
pub mod snapshot;
pub mod spans;

pub use config::SessionConfig;
pub use error::{MetricError, SessionError};
pub use metrics::{AcceleratorGauge, MetricSource, ReplaySource, SysinfoSource};
pub use queue::EventQueue;
pub use session::{Poll, SamplingSession};
pub use snapshot::{Snapshot, SnapshotLog};
pub use spans::{KernelSpan, SpanTracker};

#[cfg(feature = "nvml")]
pub use metrics::NvmlGauge;
