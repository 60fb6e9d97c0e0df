//! optix facade: profile a running workload, place kernels, explain stalls.

pub mod auto;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod optimizer;
pub mod report;

pub use auto::*;
#[cfg(feature = "cli")]
pub use cli::*;
pub use config::*;
pub use optimizer::*;
pub use report::*;

pub use optix_detector as detector;
pub use optix_device as device;
pub use optix_kernels as kernels;
pub use optix_profiler as profiler;
