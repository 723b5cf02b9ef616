//! Polynomial Kernel Implementation
//!
//! K(x, y) = (factor * <x, y> + offset)^degree

use crate::core::vector::dot_unchecked;
use crate::kernel::traits::Kernel;

/// Polynomial kernel with configurable degree, factor and offset
#[derive(Debug, Clone)]
pub struct PolynomialKernel {
    /// Degree of the polynomial
    pub degree: u32,
    /// Scaling factor for the dot product (default: 1.0)
    pub factor: f64,
    /// Independent term (default: 1.0)
    pub offset: f64,
}

impl PolynomialKernel {
    /// # Panics
    /// Panics if the degree is zero
    pub fn new(degree: u32, factor: f64, offset: f64) -> Self {
        assert!(degree > 0, "Polynomial degree must be positive");
        Self {
            degree,
            factor,
            offset,
        }
    }

    /// `(<x, y> + 1)^degree`
    pub fn with_degree(degree: u32) -> Self {
        Self::new(degree, 1.0, 1.0)
    }

    /// Creates a quadratic kernel: (<x,y> + 1)²
    pub fn quadratic() -> Self {
        Self::with_degree(2)
    }
}

impl Default for PolynomialKernel {
    fn default() -> Self {
        Self::with_degree(2)
    }
}

impl Kernel for PolynomialKernel {
    fn compute(&self, x: &[f64], y: &[f64]) -> f64 {
        (self.factor * dot_unchecked(x, y) + self.offset).powi(self.degree as i32)
    }

    fn describe(&self) -> String {
        format!(
            "polynomial(degree={}, factor={}, offset={})",
            self.degree, self.factor, self.offset
        )
    }

    fn is_linear(&self) -> bool {
        self.degree == 1 && self.factor == 1.0 && self.offset == 0.0
    }
}
