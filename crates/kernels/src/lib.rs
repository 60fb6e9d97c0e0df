//! Kernel boundary for optix.
//!
//! Kernels run synchronously on the caller's thread. Every invocation routed through a
//! [`trace::TraceHook`] is bracketed by `kernel_start`/`kernel_end` events that a profiling
//! session can collect without ever blocking the kernel.

pub mod config;
pub mod matmul;
pub mod registry;
pub mod trace;

pub use config::*;
pub use matmul::*;
pub use registry::*;
pub use trace::*;
