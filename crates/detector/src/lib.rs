//! Performance-issue detection for finished profiling runs.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────────┐     ┌─────────────────┐
//! │  Trace          │────▶│  DetectorPipeline│────▶│  Analysis       │
//! │  (snapshots +   │     │  (independent    │     │  (issues +      │
//! │   kernel spans) │     │   detectors)     │     │   failures)     │
//! └─────────────────┘     └──────────────────┘     └─────────────────┘
//! ```
//!
//! # Key Components
//!
//! - [`detector::Detector`]: the one capability every analyzer implements
//! - [`dataloader::DataLoaderDetector`]: high CPU while the accelerator starves
//! - [`gpu_idle::GpuIdleDetector`]: idle accelerator without CPU pressure
//! - [`pipeline::DetectorPipeline`]: runs detectors in isolation from each other
//! - [`summary::RunSummary`]: aggregate statistics of a run

pub mod dataloader;
pub mod detector;
pub mod gpu_idle;
pub mod issue;
pub mod pipeline;
pub mod summary;
mod window;

pub use dataloader::{DataLoaderDetector, DataLoaderThresholds};
pub use detector::{Detector, DynDetector, Trace};
pub use gpu_idle::{GpuIdleDetector, GpuIdleThresholds};
pub use issue::{Evidence, Issue, IssueKind, Severity};
pub use pipeline::{Analysis, DetectorFailure, DetectorPipeline};
pub use summary::RunSummary;
