//! Dense Gram matrix of a kernel over a set of training vectors
//!
//! Filling is O(n²) kernel evaluations and O(n²) memory, which bounds the
//! training-set size the dual learners can handle.

use rayon::prelude::*;

use crate::core::vector::dot_unchecked;
use crate::kernel::Kernel;

/// Symmetric n x n matrix stored row-major
#[derive(Debug, Clone, PartialEq)]
pub struct GramMatrix {
    n: usize,
    data: Vec<f64>,
}

impl GramMatrix {
    /// Evaluate the kernel for every pair of vectors, one row per rayon task
    pub fn compute<K: Kernel + ?Sized>(kernel: &K, vectors: &[Vec<f64>]) -> Self {
        let n = vectors.len();
        let norms: Vec<f64> = vectors.iter().map(|v| dot_unchecked(v, v)).collect();
        let mut data = vec![0.0; n * n];
        if n > 0 {
            data.par_chunks_mut(n).enumerate().for_each(|(i, row)| {
                for (j, cell) in row.iter_mut().enumerate() {
                    *cell = kernel.compute_with_norms(&vectors[i], &vectors[j], norms[i], norms[j]);
                }
            });
        }
        Self { n, data }
    }

    pub fn size(&self) -> usize {
        self.n
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.n + j]
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n..(i + 1) * self.n]
    }

    /// K * v
    pub fn multiply(&self, v: &[f64]) -> Vec<f64> {
        (0..self.n).map(|i| dot_unchecked(self.row(i), v)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{LinearKernel, RBFKernel};
    use approx::assert_relative_eq;

    #[test]
    fn test_gram_matrix_linear() {
        let vectors = vec![vec![1.0, 0.0], vec![0.0, 2.0], vec![1.0, 1.0]];
        let gram = GramMatrix::compute(&LinearKernel::new(), &vectors);
        assert_eq!(gram.size(), 3);
        assert_eq!(gram.get(0, 0), 1.0);
        assert_eq!(gram.get(1, 2), 2.0);
        assert_eq!(gram.get(2, 1), 2.0);
        assert_eq!(gram.multiply(&[1.0, 1.0, 1.0]), vec![2.0, 6.0, 5.0]);
    }

    #[test]
    fn test_gram_matrix_symmetric() {
        let vectors: Vec<Vec<f64>> = (0..12)
            .map(|i| vec![i as f64 * 0.3, (i % 4) as f64, -(i as f64)])
            .collect();
        let gram = GramMatrix::compute(&RBFKernel::new(0.1), &vectors);
        for i in 0..12 {
            assert_relative_eq!(gram.get(i, i), 1.0, epsilon = 1e-12);
            for j in 0..12 {
                assert_relative_eq!(gram.get(i, j), gram.get(j, i), epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_empty_gram_matrix() {
        let gram = GramMatrix::compute(&LinearKernel::new(), &[]);
        assert_eq!(gram.size(), 0);
    }
}
