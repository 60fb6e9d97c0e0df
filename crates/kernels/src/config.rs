//! Kernel problem descriptions.

use serde::{Deserialize, Serialize};

/// `C[m×n] = A[m×k] · B[k×n]` over `f32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MatmulProblem {
    pub m: usize,
    pub n: usize,
    pub k: usize,
}

impl MatmulProblem {
    pub fn new(m: usize, n: usize, k: usize) -> Self {
        Self { m, n, k }
    }

    pub fn flops(&self) -> f64 {
        2.0 * self.m as f64 * self.n as f64 * self.k as f64
    }

    /// Bytes touched by both operands and the output.
    pub fn data_footprint_bytes(&self) -> u64 {
        let elements = self.m as u64 * self.k as u64
            + self.k as u64 * self.n as u64
            + self.m as u64 * self.n as u64;
        elements.saturating_mul(std::mem::size_of::<f32>() as u64)
    }

    pub fn is_empty(&self) -> bool {
        self.m == 0 || self.n == 0 || self.k == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn footprint_counts_all_three_operands() {
        let problem = MatmulProblem::new(2, 3, 4);
        assert_eq!(problem.data_footprint_bytes(), (8 + 12 + 6) * 4);
        assert_eq!(problem.flops(), 48.0);
        assert!(!problem.is_empty());
        assert!(MatmulProblem::new(0, 3, 4).is_empty());
    }
}
