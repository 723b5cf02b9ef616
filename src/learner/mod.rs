//! Primal and dual learners over the regularized-risk objective
//!
//! Both learners minimize
//! `(1 - lambda1 - lambda2) * L + lambda2 * R`, where `L` is the weighted
//! mean loss described by [`Weighting`] and `R` the squared norm of the
//! non-bias coefficients (primal) or `alphaᵀ K alpha` (dual).

pub mod kernel;
pub mod linear;
pub mod multiclass;
pub mod objective;

use serde::{Deserialize, Serialize};

use crate::core::{Hyperparameter, RermError, Result};
use crate::solver::{SolverConfig, SolverKind};

pub use self::kernel::KernelLearner;
pub use self::linear::LinearLearner;
pub use self::multiclass::OneVsRest;
pub use self::objective::Weighting;

/// Hyperparameters shared by the learners
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnerConfig {
    /// L2 regularization strength
    pub lambda2: f64,
    /// L1 regularization strength, applied by the OWL-QN solver
    pub lambda1: f64,
    /// Share of the objective given to group +1 under group averaging
    pub w_plus: f64,
    /// Multiply every point's loss by its stored weight
    pub use_datapoint_weights: bool,
    /// Average the loss per group instead of over all points
    pub group_averaging: bool,
    /// Per-feature multipliers of the L2 penalty
    pub epsilon: Option<Vec<f64>>,
    /// Relative gradient-norm stopping threshold
    pub grad_length: f64,
    pub max_iterations: usize,
    pub solver: SolverKind,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            lambda2: 0.1,
            lambda1: 0.0,
            w_plus: 0.5,
            use_datapoint_weights: false,
            group_averaging: false,
            epsilon: None,
            grad_length: 1e-5,
            max_iterations: 10_000,
            solver: SolverKind::QuasiNewton,
        }
    }
}

impl LearnerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.lambda2 >= 0.0) || !(self.lambda1 >= 0.0) {
            return Err(RermError::InvalidParameter(format!(
                "lambda1 and lambda2 must be non-negative, got {} and {}",
                self.lambda1, self.lambda2
            )));
        }
        if self.lambda1 + self.lambda2 >= 1.0 {
            return Err(RermError::InvalidParameter(format!(
                "lambda1 + lambda2 must stay below 1, got {}",
                self.lambda1 + self.lambda2
            )));
        }
        if !(0.0..=1.0).contains(&self.w_plus) {
            return Err(RermError::InvalidParameter(format!(
                "w_plus must lie in [0, 1], got {}",
                self.w_plus
            )));
        }
        if !(self.grad_length > 0.0) {
            return Err(RermError::InvalidParameter(format!(
                "grad_length must be positive, got {}",
                self.grad_length
            )));
        }
        if let Some(eps) = &self.epsilon {
            if eps.iter().any(|e| *e < 0.0 || !e.is_finite()) {
                return Err(RermError::InvalidParameter(
                    "epsilon entries must be finite and non-negative".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Factor in front of the data term
    pub fn data_scale(&self) -> f64 {
        1.0 - self.lambda1 - self.lambda2
    }

    pub fn weighting(&self) -> Weighting {
        if self.group_averaging {
            Weighting::GroupAveraged {
                w_plus: self.w_plus,
            }
        } else {
            Weighting::Uniform
        }
    }

    pub fn solver_config(&self) -> SolverConfig {
        SolverConfig {
            grad_tolerance: self.grad_length,
            max_iterations: self.max_iterations,
            l1_weight: self.lambda1,
            ..SolverConfig::default()
        }
    }

    pub fn get(&self, param: Hyperparameter) -> f64 {
        match param {
            Hyperparameter::Lambda2 => self.lambda2,
            Hyperparameter::Lambda1 => self.lambda1,
            Hyperparameter::WPlus => self.w_plus,
            Hyperparameter::GradLength => self.grad_length,
        }
    }

    /// Set a hyperparameter, rejecting values that make the config invalid
    pub fn set(&mut self, param: Hyperparameter, value: f64) -> Result<()> {
        let mut updated = self.clone();
        match param {
            Hyperparameter::Lambda2 => updated.lambda2 = value,
            Hyperparameter::Lambda1 => updated.lambda1 = value,
            Hyperparameter::WPlus => updated.w_plus = value,
            Hyperparameter::GradLength => updated.grad_length = value,
        }
        updated.validate()?;
        *self = updated;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = LearnerConfig::default();
        assert_eq!(config.lambda2, 0.1);
        assert_eq!(config.solver, SolverKind::QuasiNewton);
        assert!(config.validate().is_ok());
        assert_eq!(config.weighting(), Weighting::Uniform);
    }

    #[test]
    fn test_config_rejects_invalid_values() {
        let mut config = LearnerConfig::default();
        assert!(config.set(Hyperparameter::Lambda2, -0.1).is_err());
        assert!(config.set(Hyperparameter::WPlus, 1.5).is_err());
        config.set(Hyperparameter::Lambda1, 0.5).unwrap();
        assert!(config.set(Hyperparameter::Lambda2, 0.6).is_err());
        assert_eq!(config.lambda2, 0.1);
        assert!((config.data_scale() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = LearnerConfig {
            group_averaging: true,
            w_plus: 0.3,
            solver: SolverKind::OwlQn,
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: LearnerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);

        let partial: LearnerConfig = serde_json::from_str(r#"{"lambda2": 0.01}"#).unwrap();
        assert_eq!(partial.lambda2, 0.01);
        assert_eq!(partial.max_iterations, 10_000);
    }
}
