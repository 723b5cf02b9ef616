//! Kernel trait definition

/// Kernel function trait
///
/// Both arguments are dense feature vectors of equal length; callers check
/// the dimensions before evaluating.
pub trait Kernel: Send + Sync + std::fmt::Debug {
    /// Compute kernel value K(x, y)
    fn compute(&self, x: &[f64], y: &[f64]) -> f64;

    /// Compute K(x, y) from precomputed squared norms where that is cheaper
    fn compute_with_norms(&self, x: &[f64], y: &[f64], x_norm_sq: f64, y_norm_sq: f64) -> f64 {
        let _ = (x_norm_sq, y_norm_sq);
        self.compute(x, y)
    }

    /// Short description used in logs and model summaries
    fn describe(&self) -> String;

    /// Whether `sum_j alpha_j x_j` is the primal weight vector of this kernel
    fn is_linear(&self) -> bool {
        false
    }
}
