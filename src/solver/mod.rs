//! Numerical solvers for the regularized objectives
//!
//! Iterative minimizers work on any [`DiffFunction`]: limited-memory
//! quasi-Newton (L-BFGS), its orthant-wise L1 variant (OWL-QN) and two
//! resilient-propagation policies. Ridge problems are solved in closed form
//! through [`cholesky::Cholesky`].

pub mod cholesky;
pub mod lbfgs;
pub mod owlqn;
pub mod rprop;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::vector::l2_norm;
use crate::core::{RermError, Result};

pub use self::cholesky::Cholesky;
pub use self::rprop::RpropVariant;

/// A smooth objective with its gradient
pub trait DiffFunction {
    fn dimension(&self) -> usize;

    /// Objective value and gradient at `x`
    fn evaluate(&self, x: &[f64]) -> (f64, Vec<f64>);

    /// OWL-QN applies its L1 penalty to the first `penalized_dimension()` coordinates only
    fn penalized_dimension(&self) -> usize {
        self.dimension()
    }
}

/// Tuning knobs shared by the iterative minimizers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Stop once `||g|| <= grad_tolerance * max(1, ||x||)`
    pub grad_tolerance: f64,
    /// Hard cap on iterations; reaching it logs a warning
    pub max_iterations: usize,
    /// Number of correction pairs kept by the quasi-Newton methods
    pub memory: usize,
    /// Stop quasi-Newton once the objective changes by less than this (relative)
    pub function_tolerance: f64,
    /// Weight of the L1 term handled by OWL-QN
    pub l1_weight: f64,
    /// Rprop initial step size
    pub initial_step: f64,
    pub step_increase: f64,
    pub step_decrease: f64,
    pub max_step: f64,
    pub min_step: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            grad_tolerance: 1e-5,
            max_iterations: 10_000,
            memory: 5,
            function_tolerance: 1e-14,
            l1_weight: 0.0,
            initial_step: 0.001,
            step_increase: 1.2,
            step_decrease: 0.5,
            max_step: 50.0,
            min_step: 0.0,
        }
    }
}

/// Outcome of an iterative minimization
#[derive(Debug, Clone)]
pub struct Minimum {
    pub x: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// How a learner fits its coefficients.
///
/// Legacy numeric ids: 0 quasi-Newton, 1 Rprop-, 2 OWL-QN, 3 Rprop+, 4 ridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SolverKind {
    /// Closed-form ridge solve, squared error only
    Ridge,
    #[default]
    QuasiNewton,
    RpropMinus,
    RpropPlus,
    OwlQn,
}

impl SolverKind {
    pub fn from_id(id: u32) -> Result<Self> {
        match id {
            0 => Ok(SolverKind::QuasiNewton),
            1 => Ok(SolverKind::RpropMinus),
            2 => Ok(SolverKind::OwlQn),
            3 => Ok(SolverKind::RpropPlus),
            4 => Ok(SolverKind::Ridge),
            _ => Err(RermError::InvalidParameter(format!("unknown solver id {id}"))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SolverKind::Ridge => "ridge",
            SolverKind::QuasiNewton => "lbfgs",
            SolverKind::RpropMinus => "rprop-minus",
            SolverKind::RpropPlus => "rprop-plus",
            SolverKind::OwlQn => "owlqn",
        }
    }

    pub fn is_closed_form(&self) -> bool {
        matches!(self, SolverKind::Ridge)
    }

    /// Run the iterative minimizer this kind stands for
    pub fn minimize<F: DiffFunction + ?Sized>(
        &self,
        f: &F,
        x0: Vec<f64>,
        config: &SolverConfig,
    ) -> Result<Minimum> {
        if x0.len() != f.dimension() {
            return Err(RermError::DimensionMismatch {
                expected: f.dimension(),
                actual: x0.len(),
            });
        }
        match self {
            SolverKind::Ridge => Err(RermError::UnsupportedOperation(
                "ridge is solved in closed form".to_string(),
            )),
            SolverKind::QuasiNewton => lbfgs::minimize(f, x0, config),
            SolverKind::OwlQn => owlqn::minimize(f, x0, config),
            SolverKind::RpropMinus => rprop::minimize(f, x0, config, RpropVariant::Minus),
            SolverKind::RpropPlus => rprop::minimize(f, x0, config, RpropVariant::Plus),
        }
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SolverKind {
    type Err = RermError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(id) = s.parse::<u32>() {
            return Self::from_id(id);
        }
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "ridge" | "closed-form" => Ok(SolverKind::Ridge),
            "lbfgs" | "quasi-newton" | "bfgs" => Ok(SolverKind::QuasiNewton),
            "rprop" | "rprop-minus" => Ok(SolverKind::RpropMinus),
            "rprop-plus" => Ok(SolverKind::RpropPlus),
            "owlqn" | "owl-qn" => Ok(SolverKind::OwlQn),
            other => Err(RermError::InvalidParameter(format!("unknown solver '{other}'"))),
        }
    }
}

/// Relative gradient-norm stopping rule shared by all iterative paths
pub(crate) fn gradient_converged(gradient: &[f64], x: &[f64], tolerance: f64) -> bool {
    l2_norm(gradient) <= tolerance * l2_norm(x).max(1.0)
}

pub(crate) fn check_finite(value: f64, iteration: usize) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(RermError::NumericalFailure(format!(
            "objective became {value} at iteration {iteration}"
        )))
    }
}

#[cfg(test)]
pub(crate) mod test_functions {
    use super::DiffFunction;

    /// `sum_i c_i (x_i - t_i)^2`, minimum at `t`
    pub struct Quadratic {
        pub target: Vec<f64>,
        pub scale: Vec<f64>,
    }

    impl DiffFunction for Quadratic {
        fn dimension(&self) -> usize {
            self.target.len()
        }

        fn evaluate(&self, x: &[f64]) -> (f64, Vec<f64>) {
            let mut value = 0.0;
            let mut grad = vec![0.0; x.len()];
            for i in 0..x.len() {
                let d = x[i] - self.target[i];
                value += self.scale[i] * d * d;
                grad[i] = 2.0 * self.scale[i] * d;
            }
            (value, grad)
        }
    }

    /// Rosenbrock's banana function in two dimensions
    pub struct Rosenbrock;

    impl DiffFunction for Rosenbrock {
        fn dimension(&self) -> usize {
            2
        }

        fn evaluate(&self, x: &[f64]) -> (f64, Vec<f64>) {
            let (a, b) = (x[0], x[1]);
            let value = (1.0 - a).powi(2) + 100.0 * (b - a * a).powi(2);
            let grad = vec![
                -2.0 * (1.0 - a) - 400.0 * a * (b - a * a),
                200.0 * (b - a * a),
            ];
            (value, grad)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solver_kind_parsing() {
        assert_eq!("lbfgs".parse::<SolverKind>().unwrap(), SolverKind::QuasiNewton);
        assert_eq!("2".parse::<SolverKind>().unwrap(), SolverKind::OwlQn);
        assert_eq!("rprop_plus".parse::<SolverKind>().unwrap(), SolverKind::RpropPlus);
        assert!(matches!(
            SolverKind::from_id(7),
            Err(RermError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_ridge_is_not_iterative() {
        let f = test_functions::Quadratic {
            target: vec![1.0],
            scale: vec![1.0],
        };
        let result = SolverKind::Ridge.minimize(&f, vec![0.0], &SolverConfig::default());
        assert!(matches!(result, Err(RermError::UnsupportedOperation(_))));
    }

    #[test]
    fn test_initial_point_dimension_checked() {
        let f = test_functions::Rosenbrock;
        let result = SolverKind::QuasiNewton.minimize(&f, vec![0.0], &SolverConfig::default());
        assert!(matches!(result, Err(RermError::DimensionMismatch { .. })));
    }
}
