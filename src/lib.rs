//! Regularized empirical risk minimization
//!
//! Linear (primal) and kernel (dual) learners minimizing
//! `(1 - lambda1 - lambda2) * loss + lambda2 * ||w||²` with pluggable loss
//! functions, solved by L-BFGS, OWL-QN, Rprop or closed-form ridge. On top of
//! them sit resampling error estimates (cross-validation, bootstrap, .632,
//! .632+), hyperparameter sweeps and recursive feature elimination.

pub mod core;
pub mod data;
pub mod kernel;
pub mod learner;
pub mod loss;
pub mod metrics;
pub mod persistence;
pub mod resampling;
pub mod selection;
pub mod solver;
pub mod tuning;

// Re-export main types for convenience
pub use crate::core::traits::*;
pub use crate::core::types::*;
pub use crate::core::{RermError, Result};
pub use crate::data::{DatasetReader, DatasetWriter, Normalizer};
pub use crate::kernel::{GramMatrix, Kernel, KernelKind};
pub use crate::learner::{KernelLearner, LearnerConfig, LinearLearner, OneVsRest, Weighting};
pub use crate::loss::{LossFunction, LossKind};
pub use crate::metrics::DatasetResult;
pub use crate::persistence::SerializableModel;
pub use crate::resampling::{
    Bootstrap632Error, Bootstrap632PlusError, BootstrapError, CrossValidationError,
    ResamplingConfig, ResamplingError,
};
pub use crate::selection::{FeatureSubset, GeneralizedRanking, RankMethod, Rfe};
pub use crate::solver::{SolverConfig, SolverKind};
pub use crate::tuning::{optimize_parameter, ParameterOptimizer};

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
