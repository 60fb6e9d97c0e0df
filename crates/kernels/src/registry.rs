//! Kernel registry for lookup and discovery.

use crate::config::MatmulProblem;
use crate::matmul::{DynMatmulKernel, MatmulKernel};
use std::sync::Arc;

#[derive(Default, Clone)]
pub struct KernelRegistry {
    matmul_kernels: Vec<DynMatmulKernel>,
}

impl KernelRegistry {
    pub fn new() -> Self {
        Self {
            matmul_kernels: Vec::new(),
        }
    }

    pub fn with_default_matmul_kernels() -> Self {
        let mut registry = Self::new();
        registry.register_matmul_kernel(crate::matmul::ReferenceMatmul::new());
        registry.register_matmul_kernel(crate::matmul::ParallelMatmul::new());
        registry
    }

    pub fn register_matmul_kernel<K>(&mut self, kernel: K)
    where
        K: MatmulKernel + 'static,
    {
        self.matmul_kernels.push(Arc::new(kernel));
    }

    /// Most recently registered kernel that supports `problem`.
    pub fn select_matmul_kernel(&self, problem: &MatmulProblem) -> Option<DynMatmulKernel> {
        self.matmul_kernels
            .iter()
            .rev()
            .find(|kernel| kernel.supports(problem))
            .map(Arc::clone)
    }
}
