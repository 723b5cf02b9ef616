//! Cholesky factorization `A = L Lᵀ` of symmetric positive-definite matrices

use crate::core::{RermError, Result};

/// Lower-triangular factor of a symmetric positive-definite matrix
#[derive(Debug, Clone)]
pub struct Cholesky {
    n: usize,
    l: Vec<f64>,
}

impl Cholesky {
    /// Factor a row-major `n x n` matrix; only the lower triangle is read
    pub fn decompose(a: &[f64], n: usize) -> Result<Self> {
        if a.len() != n * n {
            return Err(RermError::DimensionMismatch {
                expected: n * n,
                actual: a.len(),
            });
        }

        let mut l = vec![0.0; n * n];
        for i in 0..n {
            for j in 0..=i {
                let sum: f64 = (0..j).map(|k| l[i * n + k] * l[j * n + k]).sum();
                if i == j {
                    let val = a[i * n + i] - sum;
                    if val <= 0.0 || !val.is_finite() {
                        return Err(RermError::NotPositiveDefinite(i));
                    }
                    l[i * n + j] = val.sqrt();
                } else {
                    l[i * n + j] = (a[i * n + j] - sum) / l[j * n + j];
                }
            }
        }

        Ok(Self { n, l })
    }

    pub fn size(&self) -> usize {
        self.n
    }

    /// Solve `A x = b` by forward then back substitution
    pub fn solve(&self, b: &[f64]) -> Result<Vec<f64>> {
        let n = self.n;
        if b.len() != n {
            return Err(RermError::DimensionMismatch {
                expected: n,
                actual: b.len(),
            });
        }

        // L y = b
        let mut y = vec![0.0; n];
        for i in 0..n {
            let sum: f64 = (0..i).map(|k| self.l[i * n + k] * y[k]).sum();
            y[i] = (b[i] - sum) / self.l[i * n + i];
        }

        // Lᵀ x = y
        let mut x = vec![0.0; n];
        for i in (0..n).rev() {
            let sum: f64 = ((i + 1)..n).map(|k| self.l[k * n + i] * x[k]).sum();
            x[i] = (y[i] - sum) / self.l[i * n + i];
        }

        Ok(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_solve_spd_system() {
        let a = [4.0, 2.0, 0.6, 2.0, 5.0, 1.0, 0.6, 1.0, 3.0];
        let x_true = [1.0, -2.0, 0.5];
        let b: Vec<f64> = (0..3)
            .map(|i| (0..3).map(|j| a[i * 3 + j] * x_true[j]).sum())
            .collect();

        let chol = Cholesky::decompose(&a, 3).unwrap();
        let x = chol.solve(&b).unwrap();
        for (xi, ti) in x.iter().zip(&x_true) {
            assert_relative_eq!(xi, ti, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_not_positive_definite() {
        let a = [1.0, 2.0, 2.0, 1.0];
        assert!(matches!(
            Cholesky::decompose(&a, 2),
            Err(RermError::NotPositiveDefinite(1))
        ));
    }

    #[test]
    fn test_shape_checks() {
        assert!(Cholesky::decompose(&[1.0, 0.0, 0.0], 2).is_err());
        let chol = Cholesky::decompose(&[2.0], 1).unwrap();
        assert!(chol.solve(&[1.0, 2.0]).is_err());
        assert_eq!(chol.size(), 1);
    }
}
