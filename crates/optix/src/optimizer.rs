//! Placement-aware execution of a matrix workload.

use anyhow::{ensure, Context, Result};
use ndarray::ArrayView2;
use optix_device::{suggest_backend, ComplexityClass, Device, SmartSelector};
use optix_kernels::{
    run_traced, DynKernelTracer, KernelRegistry, MatmulInputs, MatmulProblem, TraceHook,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub execution_time_ms: f64,
    pub optimized: bool,
    /// Device chosen by placement.
    pub device: Device,
    /// Kernel that actually ran.
    pub kernel: String,
}

pub struct ModelOptimizer {
    selector: SmartSelector,
    registry: KernelRegistry,
    hook: TraceHook,
    use_accelerator_if_available: bool,
}

impl ModelOptimizer {
    pub fn new(selector: SmartSelector) -> Self {
        Self {
            selector,
            registry: KernelRegistry::with_default_matmul_kernels(),
            hook: TraceHook::unavailable(),
            use_accelerator_if_available: true,
        }
    }

    /// Report kernel invocations to `tracer`, typically a profiling session's event queue.
    pub fn with_tracer(mut self, tracer: DynKernelTracer) -> Self {
        self.hook = TraceHook::attached(tracer);
        self
    }

    pub fn with_accelerator(mut self, enabled: bool) -> Self {
        self.use_accelerator_if_available = enabled;
        self
    }

    pub fn selector(&self) -> &SmartSelector {
        &self.selector
    }

    pub fn hook(&self) -> &TraceHook {
        &self.hook
    }

    /// Multiply the `rows × cols` matrix in `data` (row-major) by its transpose.
    pub fn optimize(&self, data: &[f32], rows: usize, cols: usize) -> Result<OptimizationResult> {
        let expected = rows
            .checked_mul(cols)
            .context("matrix dimensions overflow")?;
        ensure!(
            data.len() == expected,
            "data has {} elements, expected {rows}x{cols} = {expected}",
            data.len()
        );

        let device = self.selector.select_device(
            &[rows, cols],
            ComplexityClass::Cubic,
            self.use_accelerator_if_available,
        );
        if device.is_accelerator() {
            warn!(%device, "no accelerator kernel registered; running on cpu");
        }

        let problem = MatmulProblem::new(rows, rows, cols);
        ensure!(!problem.is_empty(), "cannot optimize an empty {rows}x{cols} matrix");
        let kernel = self
            .registry
            .select_matmul_kernel(&problem)
            .context("no matmul kernel supports this problem")?;

        let lhs = ArrayView2::from_shape((rows, cols), data)?;
        let inputs = MatmulInputs::new(lhs, lhs.t());

        let start = Instant::now();
        let output = run_traced(&self.hook, kernel.as_ref(), &problem, &inputs)?;
        let execution_time_ms = start.elapsed().as_secs_f64() * 1e3;

        info!(
            rows,
            cols,
            kernel = kernel.name(),
            footprint_bytes = problem.data_footprint_bytes(),
            %device,
            execution_time_ms,
            gflops = problem.flops() / (execution_time_ms * 1e6).max(f64::EPSILON),
            "optimization finished"
        );

        Ok(OptimizationResult {
            execution_time_ms,
            optimized: output.dim() == (rows, rows),
            device,
            kernel: kernel.name().to_string(),
        })
    }

    pub fn suggest_backend(&self, size_bytes: u64) -> &'static str {
        suggest_backend(size_bytes)
    }
}

/// A `rows × cols` matrix of uniform random values in `[0, 1)`.
pub fn random_matrix(rows: usize, cols: usize) -> Result<Vec<f32>> {
    let elements = rows
        .checked_mul(cols)
        .context("matrix dimensions overflow")?;
    Ok((0..elements).map(|_| fastrand::f32()).collect())
}
