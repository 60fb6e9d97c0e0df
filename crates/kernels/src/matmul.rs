//! Matrix multiplication kernels.

use crate::config::MatmulProblem;
use crate::trace::TraceHook;
use anyhow::{bail, ensure, Result};
use ndarray::{Array2, ArrayView2, Axis};
use rayon::prelude::*;
use std::sync::Arc;

pub struct MatmulInputs<'a> {
    pub lhs: ArrayView2<'a, f32>,
    pub rhs: ArrayView2<'a, f32>,
}

impl<'a> MatmulInputs<'a> {
    pub fn new(lhs: ArrayView2<'a, f32>, rhs: ArrayView2<'a, f32>) -> Self {
        Self { lhs, rhs }
    }
}

pub trait MatmulKernel: Send + Sync {
    fn name(&self) -> &'static str;
    fn supports(&self, problem: &MatmulProblem) -> bool;
    fn run(&self, problem: &MatmulProblem, inputs: &MatmulInputs<'_>) -> Result<Array2<f32>>;
}

pub type DynMatmulKernel = Arc<dyn MatmulKernel>;

pub fn validate_matmul_inputs(problem: &MatmulProblem, inputs: &MatmulInputs<'_>) -> Result<()> {
    if inputs.lhs.ncols() != inputs.rhs.nrows() {
        bail!(
            "matmul dimension mismatch: lhs {}x{} vs rhs {}x{}",
            inputs.lhs.nrows(),
            inputs.lhs.ncols(),
            inputs.rhs.nrows(),
            inputs.rhs.ncols()
        );
    }
    ensure!(
        inputs.lhs.dim() == (problem.m, problem.k) && inputs.rhs.ncols() == problem.n,
        "inputs do not match problem m={} n={} k={}",
        problem.m,
        problem.n,
        problem.k
    );
    Ok(())
}

/// Run `kernel` through the trace hook so the invocation is visible to a profiling session.
pub fn run_traced(
    hook: &TraceHook,
    kernel: &dyn MatmulKernel,
    problem: &MatmulProblem,
    inputs: &MatmulInputs<'_>,
) -> Result<Array2<f32>> {
    hook.trace(kernel.name(), || kernel.run(problem, inputs))
}

#[derive(Default)]
pub struct ReferenceMatmul;

impl ReferenceMatmul {
    pub fn new() -> Self {
        Self
    }
}

impl MatmulKernel for ReferenceMatmul {
    fn name(&self) -> &'static str {
        "reference"
    }

    fn supports(&self, _problem: &MatmulProblem) -> bool {
        true
    }

    fn run(&self, problem: &MatmulProblem, inputs: &MatmulInputs<'_>) -> Result<Array2<f32>> {
        validate_matmul_inputs(problem, inputs)?;
        Ok(inputs.lhs.dot(&inputs.rhs))
    }
}

/// Row-parallel kernel; only worth its scheduling overhead on larger problems.
pub struct ParallelMatmul {
    min_rows: usize,
}

impl ParallelMatmul {
    pub fn new() -> Self {
        Self { min_rows: 64 }
    }
}

impl Default for ParallelMatmul {
    fn default() -> Self {
        Self::new()
    }
}

impl MatmulKernel for ParallelMatmul {
    fn name(&self) -> &'static str {
        "parallel"
    }

    fn supports(&self, problem: &MatmulProblem) -> bool {
        problem.m >= self.min_rows
    }

    fn run(&self, problem: &MatmulProblem, inputs: &MatmulInputs<'_>) -> Result<Array2<f32>> {
        validate_matmul_inputs(problem, inputs)?;

        let lhs = inputs.lhs;
        let rhs = inputs.rhs;
        let mut output = Array2::<f32>::zeros((problem.m, problem.n));

        output
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(row_idx, mut row)| {
                let lhs_row = lhs.row(row_idx);
                for (col_idx, value) in row.iter_mut().enumerate() {
                    let rhs_col = rhs.column(col_idx);
                    *value = lhs_row.dot(&rhs_col);
                }
            });

        Ok(output)
    }
}
