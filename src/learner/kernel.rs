//! Dual learner: the score is a kernel expansion over the training points
//!
//! `score(x) = sum_j alpha_j K(x_j, x) + offset`, with the offset left
//! unregularized. With a linear kernel and no per-feature epsilon the
//! solution coincides with [`crate::learner::LinearLearner`].

use std::sync::Arc;

use log::{debug, info, warn};

use crate::core::{Datapoint, Dataset, Grouper, Hyperparameter, Learner, RermError, Result};
use crate::kernel::{GramMatrix, Kernel, LinearKernel};
use crate::learner::objective::{point_coefficients, DualGradient, DualObjective};
use crate::learner::LearnerConfig;
use crate::loss::{LossFunction, LossKind, SquaredError};
use crate::solver::{Cholesky, SolverKind};

#[derive(Debug, Clone)]
pub struct KernelLearner {
    config: LearnerConfig,
    kernel: Arc<dyn Kernel>,
    loss: Arc<dyn LossFunction>,
    grouper: Option<Grouper>,
    alpha: Option<Vec<f64>>,
    offset: f64,
    train_vectors: Vec<Vec<f64>>,
}

impl Default for KernelLearner {
    fn default() -> Self {
        Self::new(Arc::new(LinearKernel::new()))
    }
}

impl KernelLearner {
    pub fn new(kernel: Arc<dyn Kernel>) -> Self {
        Self {
            config: LearnerConfig::default(),
            kernel,
            loss: Arc::new(SquaredError),
            grouper: None,
            alpha: None,
            offset: 0.0,
            train_vectors: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: LearnerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_loss(mut self, loss: Arc<dyn LossFunction>) -> Self {
        self.loss = loss;
        self
    }

    pub fn with_solver(mut self, solver: SolverKind) -> Self {
        self.config.solver = solver;
        self
    }

    pub fn with_lambda2(mut self, lambda2: f64) -> Self {
        self.config.lambda2 = lambda2;
        self
    }

    pub fn with_group_averaging(mut self, w_plus: f64) -> Self {
        self.config.group_averaging = true;
        self.config.w_plus = w_plus;
        self
    }

    pub fn with_datapoint_weights(mut self, enabled: bool) -> Self {
        self.config.use_datapoint_weights = enabled;
        self
    }

    pub fn with_grad_length(mut self, grad_length: f64) -> Self {
        self.config.grad_length = grad_length;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    pub fn with_grouper(mut self, grouper: Grouper) -> Self {
        self.grouper = Some(grouper);
        self
    }

    pub fn config(&self) -> &LearnerConfig {
        &self.config
    }

    pub fn kernel(&self) -> &Arc<dyn Kernel> {
        &self.kernel
    }

    pub fn alpha(&self) -> Option<&[f64]> {
        self.alpha.as_deref()
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Primal weights `[sum_j alpha_j x_j, offset]`, defined for linear kernels only
    pub fn weight(&self) -> Result<Vec<f64>> {
        let alpha = self.alpha.as_deref().ok_or(RermError::ModelNotTrained)?;
        if !self.kernel.is_linear() {
            return Err(RermError::UnsupportedOperation(format!(
                "no primal weight vector for kernel {}",
                self.kernel.describe()
            )));
        }
        let n = self.train_vectors.first().map_or(0, Vec::len);
        let mut weight = vec![0.0; n + 1];
        for (a, x) in alpha.iter().zip(&self.train_vectors) {
            for (w, xi) in weight.iter_mut().zip(x) {
                *w += a * xi;
            }
        }
        weight[n] = self.offset;
        Ok(weight)
    }

    fn validate_training_set(&self, dataset: &Dataset) -> Result<()> {
        self.config.validate()?;
        if dataset.is_empty() {
            return Err(RermError::EmptyDataset);
        }
        if dataset.is_extended() {
            return Err(RermError::InvalidParameter(
                "training data must not carry a bias column".to_string(),
            ));
        }
        if !(self.config.lambda2 > 0.0) {
            return Err(RermError::InvalidParameter(
                "the dual learner needs lambda2 > 0".to_string(),
            ));
        }
        if let Some(i) = dataset.iter().position(|p| !p.value.is_finite()) {
            return Err(RermError::InvalidParameter(format!(
                "point {i} has no finite target value"
            )));
        }
        Ok(())
    }

    /// Closed-form dual ridge.
    ///
    /// With `S = diag(sqrt(c))` the stationarity conditions reduce to
    /// `(S K S + lambda2 I) gamma = S y - b sqrt(c)` and `sum alpha = 0`,
    /// where `alpha = S gamma`. Two solves against the same factor give
    /// `gamma = u - b v`, and the constraint fixes `b`.
    fn learn_ridge(&self, gram: &GramMatrix, dataset: &Dataset) -> Result<(Vec<f64>, f64)> {
        if self.loss.kind() != LossKind::SquaredError {
            return Err(RermError::InvalidParameter(format!(
                "closed-form ridge needs squared error loss, got {}",
                self.loss.kind()
            )));
        }
        let scale = self.config.data_scale();
        let root: Vec<f64> = point_coefficients(
            dataset.points(),
            self.config.weighting(),
            self.config.use_datapoint_weights,
        )?
        .into_iter()
        .map(|c| (scale * c).sqrt())
        .collect();

        let n = dataset.len();
        let mut a = vec![0.0; n * n];
        for i in 0..n {
            for j in 0..=i {
                a[i * n + j] = root[i] * gram.get(i, j) * root[j];
            }
            a[i * n + i] += self.config.lambda2;
        }
        let factor = Cholesky::decompose(&a, n)?;

        let scaled_targets: Vec<f64> = dataset
            .iter()
            .zip(&root)
            .map(|(p, r)| r * p.value)
            .collect();
        let u = factor.solve(&scaled_targets)?;
        let v = factor.solve(&root)?;

        let denominator: f64 = root.iter().zip(&v).map(|(r, v)| r * v).sum();
        if denominator.abs() < f64::EPSILON {
            return Err(RermError::NumericalFailure(
                "offset is undetermined: every point has zero weight".to_string(),
            ));
        }
        let offset = root.iter().zip(&u).map(|(r, u)| r * u).sum::<f64>() / denominator;
        let alpha = root
            .iter()
            .zip(u.iter().zip(&v))
            .map(|(r, (u, v))| r * (u - offset * v))
            .collect();
        Ok((alpha, offset))
    }

    fn learn_iterative(&self, gram: &GramMatrix, dataset: &Dataset) -> Result<(Vec<f64>, f64)> {
        let gradient = match self.config.solver {
            SolverKind::QuasiNewton => DualGradient::Exact,
            SolverKind::RpropMinus | SolverKind::RpropPlus => DualGradient::Preconditioned,
            other => {
                return Err(RermError::UnsupportedOperation(format!(
                    "solver {other} is not available for the dual learner"
                )))
            }
        };
        let objective = DualObjective {
            gram,
            points: dataset.points(),
            coefficients: point_coefficients(
                dataset.points(),
                self.config.weighting(),
                self.config.use_datapoint_weights,
            )?,
            loss: self.loss.as_ref(),
            data_scale: self.config.data_scale(),
            lambda2: self.config.lambda2,
            gradient,
        };

        let n = dataset.len();
        let initial = match &self.alpha {
            Some(alpha) if alpha.len() == n => {
                let mut x = alpha.clone();
                x.push(self.offset);
                x
            }
            _ => vec![0.0; n + 1],
        };
        let mut minimum =
            self.config
                .solver
                .minimize(&objective, initial, &self.config.solver_config())?;
        if !minimum.converged {
            warn!(
                "{} stopped without converging after {} iterations",
                self.config.solver, minimum.iterations
            );
        }
        debug!(
            "{} finished after {} iterations, objective {:.6e}",
            self.config.solver, minimum.iterations, minimum.value
        );
        let offset = minimum.x.pop().unwrap_or(0.0);
        Ok((minimum.x, offset))
    }

    fn check_dimension(&self, point: &Datapoint) -> Result<()> {
        let expected = self.train_vectors.first().map_or(0, Vec::len);
        if point.is_extended() || point.num_features() != expected {
            return Err(RermError::DimensionMismatch {
                expected,
                actual: point.num_features(),
            });
        }
        Ok(())
    }
}

impl Learner for KernelLearner {
    fn learn(&mut self, dataset: &Dataset) -> Result<()> {
        self.validate_training_set(dataset)?;
        if self.config.epsilon.is_some() {
            warn!("per-feature epsilon has no effect on the dual learner");
        }

        let vectors: Vec<Vec<f64>> = dataset.iter().map(|p| p.features().to_vec()).collect();
        let gram = GramMatrix::compute(self.kernel.as_ref(), &vectors);
        debug!(
            "Computed {}x{} Gram matrix for {}",
            gram.size(),
            gram.size(),
            self.kernel.describe()
        );

        let (alpha, offset) = if self.config.solver.is_closed_form() {
            self.learn_ridge(&gram, dataset)?
        } else {
            self.learn_iterative(&gram, dataset)?
        };
        if !offset.is_finite() || alpha.iter().any(|a| !a.is_finite()) {
            return Err(RermError::NumericalFailure(
                "training produced non-finite coefficients".to_string(),
            ));
        }

        info!(
            "Trained kernel model on {} points ({}, {}, loss {})",
            dataset.len(),
            self.kernel.describe(),
            self.config.solver,
            self.loss.kind()
        );
        self.alpha = Some(alpha);
        self.offset = offset;
        self.train_vectors = vectors;
        Ok(())
    }

    fn score(&self, point: &Datapoint) -> Result<f64> {
        let alpha = self.alpha.as_deref().ok_or(RermError::ModelNotTrained)?;
        self.check_dimension(point)?;
        let expansion: f64 = alpha
            .iter()
            .zip(&self.train_vectors)
            .map(|(a, x)| a * self.kernel.compute(x, point.features()))
            .sum();
        Ok(expansion + self.offset)
    }

    fn grouper(&self) -> Option<Grouper> {
        self.grouper
    }

    fn set_grouper(&mut self, grouper: Option<Grouper>) {
        self.grouper = grouper;
    }

    fn is_trained(&self) -> bool {
        self.alpha.is_some()
    }

    fn tunable(&self, param: Hyperparameter) -> Result<f64> {
        match param {
            Hyperparameter::Lambda1 => Err(RermError::UnsupportedOperation(
                "lambda1 does not apply to the dual learner".to_string(),
            )),
            other => Ok(self.config.get(other)),
        }
    }

    fn set_tunable(&mut self, param: Hyperparameter, value: f64) -> Result<()> {
        match param {
            Hyperparameter::Lambda1 => Err(RermError::UnsupportedOperation(
                "lambda1 does not apply to the dual learner".to_string(),
            )),
            other => self.config.set(other, value),
        }
    }
}
