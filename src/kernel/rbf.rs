//! RBF (Radial Basis Function) kernel implementation
//!
//! K(x, y) = exp(-γ * ||x - y||²), with γ = 1 / (2σ²) when the width σ is given.

use crate::core::vector::dot_unchecked;
use crate::kernel::Kernel;

/// RBF kernel: K(x, y) = exp(-γ * ||x - y||²)
#[derive(Debug, Clone, Copy)]
pub struct RBFKernel {
    gamma: f64,
}

impl RBFKernel {
    /// Create a new RBF kernel with specified gamma parameter
    ///
    /// # Panics
    /// Panics if gamma is not positive
    pub fn new(gamma: f64) -> Self {
        assert!(gamma > 0.0, "Gamma must be positive, got: {}", gamma);
        Self { gamma }
    }

    /// Create an RBF kernel from its width σ
    ///
    /// # Panics
    /// Panics if sigma is not positive
    pub fn from_sigma(sigma: f64) -> Self {
        assert!(sigma > 0.0, "Sigma must be positive, got: {}", sigma);
        Self::new(1.0 / (2.0 * sigma * sigma))
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    pub fn sigma(&self) -> f64 {
        (1.0 / (2.0 * self.gamma)).sqrt()
    }
}

impl Default for RBFKernel {
    fn default() -> Self {
        Self::from_sigma(1.0)
    }
}

impl Kernel for RBFKernel {
    fn compute(&self, x: &[f64], y: &[f64]) -> f64 {
        let squared_distance: f64 = x.iter().zip(y).map(|(a, b)| (a - b) * (a - b)).sum();
        (-self.gamma * squared_distance).exp()
    }

    fn compute_with_norms(&self, x: &[f64], y: &[f64], x_norm_sq: f64, y_norm_sq: f64) -> f64 {
        // ||x - y||² = ||x||² + ||y||² - 2*x^T*y, clipped for rounding
        let squared_distance = (x_norm_sq + y_norm_sq - 2.0 * dot_unchecked(x, y)).max(0.0);
        (-self.gamma * squared_distance).exp()
    }

    fn describe(&self) -> String {
        format!("rbf(gamma={})", self.gamma)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rbf_kernel_identical_vectors() {
        let kernel = RBFKernel::new(0.5);
        let x = [1.0, 2.0, 3.0];
        assert_relative_eq!(kernel.compute(&x, &x), 1.0);
    }

    #[test]
    fn test_rbf_kernel_distance() {
        let kernel = RBFKernel::from_sigma(1.0);
        let x = [0.0, 0.0];
        let y = [1.0, 1.0];
        // exp(-2 / 2)
        assert_relative_eq!(kernel.compute(&x, &y), (-1.0f64).exp(), epsilon = 1e-12);
        assert_relative_eq!(kernel.sigma(), 1.0);
    }

    #[test]
    fn test_compute_with_norms_matches() {
        let kernel = RBFKernel::new(0.3);
        let x = [1.0, -2.0, 0.5];
        let y = [0.0, 1.0, 2.0];
        let nx = dot_unchecked(&x, &x);
        let ny = dot_unchecked(&y, &y);
        assert_relative_eq!(
            kernel.compute(&x, &y),
            kernel.compute_with_norms(&x, &y, nx, ny),
            epsilon = 1e-12
        );
    }

    #[test]
    #[should_panic(expected = "Gamma must be positive")]
    fn test_invalid_gamma() {
        RBFKernel::new(-1.0);
    }
}
