//! Sigmoid (tanh) kernel
//!
//! K(x, y) = tanh(factor * <x, y> + offset)
//!
//! Not positive semi-definite for every parameter choice, so the closed-form
//! dual solve can fail on it.

use crate::core::vector::dot_unchecked;
use crate::kernel::traits::Kernel;

#[derive(Debug, Clone)]
pub struct SigmoidKernel {
    /// Scaling parameter for the dot product
    pub factor: f64,
    pub offset: f64,
}

impl SigmoidKernel {
    /// # Panics
    /// Panics if factor is not positive
    pub fn new(factor: f64, offset: f64) -> Self {
        assert!(factor > 0.0, "Factor must be positive, got: {}", factor);
        Self { factor, offset }
    }
}

impl Default for SigmoidKernel {
    fn default() -> Self {
        Self::new(1.0, 0.0)
    }
}

impl Kernel for SigmoidKernel {
    fn compute(&self, x: &[f64], y: &[f64]) -> f64 {
        (self.factor * dot_unchecked(x, y) + self.offset).tanh()
    }

    fn describe(&self) -> String {
        format!("sigmoid(factor={}, offset={})", self.factor, self.offset)
    }
}
