//! Primal linear learner
//!
//! The model is a weight vector of length `num_features + 1` whose last entry
//! multiplies the constant bias input. Training reads the dataset through
//! [`Datapoint::augmented`], so the dataset is never modified.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::core::vector;
use crate::core::{Datapoint, Dataset, Grouper, Hyperparameter, Learner, RermError, Result};
use crate::learner::objective::{data_loss, linear_score, point_coefficients, PrimalObjective};
use crate::learner::LearnerConfig;
use crate::loss::{LossFunction, LossKind, SquaredError};
use crate::solver::{Cholesky, SolverKind};

#[derive(Debug, Clone)]
pub struct LinearLearner {
    config: LearnerConfig,
    loss: Arc<dyn LossFunction>,
    grouper: Option<Grouper>,
    weight: Option<Vec<f64>>,
}

impl Default for LinearLearner {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearLearner {
    /// Squared-error learner with the default configuration
    pub fn new() -> Self {
        Self {
            config: LearnerConfig::default(),
            loss: Arc::new(SquaredError),
            grouper: None,
            weight: None,
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

    pub fn with_lambda1(mut self, lambda1: f64) -> Self {
        self.config.lambda1 = lambda1;
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

    pub fn with_epsilon(mut self, epsilon: Vec<f64>) -> Self {
        self.config.epsilon = Some(epsilon);
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

    /// Rebuild a fitted learner from stored parts
    pub fn from_parts(
        config: LearnerConfig,
        loss: LossKind,
        grouper: Option<Grouper>,
        weight: Vec<f64>,
    ) -> Result<Self> {
        config.validate()?;
        if weight.is_empty() {
            return Err(RermError::InvalidParameter(
                "weight vector needs at least the bias entry".to_string(),
            ));
        }
        Ok(Self {
            config,
            loss: loss.build()?,
            grouper,
            weight: Some(weight),
        })
    }

    pub fn config(&self) -> &LearnerConfig {
        &self.config
    }

    pub fn loss(&self) -> &Arc<dyn LossFunction> {
        &self.loss
    }

    /// Fitted weights, bias last
    pub fn weight(&self) -> Option<&[f64]> {
        self.weight.as_deref()
    }

    fn fitted_weight(&self) -> Result<&[f64]> {
        self.weight.as_deref().ok_or(RermError::ModelNotTrained)
    }

    fn check_dimension(&self, weight: &[f64], point: &Datapoint) -> Result<()> {
        let features = point.num_features() - usize::from(point.is_extended());
        if features + 1 != weight.len() {
            return Err(RermError::DimensionMismatch {
                expected: weight.len() - 1,
                actual: features,
            });
        }
        Ok(())
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
        if let Some(eps) = &self.config.epsilon {
            if eps.len() != dataset.num_features() {
                return Err(RermError::DimensionMismatch {
                    expected: dataset.num_features(),
                    actual: eps.len(),
                });
            }
        }
        if let Some(i) = dataset.iter().position(|p| !p.value.is_finite()) {
            return Err(RermError::InvalidParameter(format!(
                "point {i} has no finite target value"
            )));
        }
        Ok(())
    }

    /// Unregularized data term of the current model on a dataset
    pub fn training_loss(&self, dataset: &Dataset) -> Result<f64> {
        let weight = self.fitted_weight()?;
        let coefficients = point_coefficients(
            dataset.points(),
            self.config.weighting(),
            self.config.use_datapoint_weights,
        )?;
        let mut scores = Vec::with_capacity(dataset.len());
        for point in dataset {
            self.check_dimension(weight, point)?;
            scores.push(linear_score(weight, point));
        }
        Ok(data_loss(dataset.points(), &coefficients, &scores, self.loss.as_ref()))
    }

    /// Closed-form ridge solve of the normal equations
    fn learn_ridge(&self, dataset: &Dataset) -> Result<Vec<f64>> {
        if self.loss.kind() != LossKind::SquaredError {
            return Err(RermError::InvalidParameter(format!(
                "closed-form ridge needs squared error loss, got {}",
                self.loss.kind()
            )));
        }
        let n = dataset.num_features();
        let m = n + 1;
        let scale = self.config.data_scale();
        let coefficients = point_coefficients(
            dataset.points(),
            self.config.weighting(),
            self.config.use_datapoint_weights,
        )?;

        // A = sum_i c_i x_i x_iᵀ + lambda2 diag(eps), b = sum_i c_i y_i x_i
        let mut a = vec![0.0; m * m];
        let mut b = vec![0.0; m];
        for (point, c) in dataset.iter().zip(&coefficients) {
            let row: Vec<f64> = point.augmented().collect();
            let w = scale * c;
            for r in 0..m {
                let wr = w * row[r];
                b[r] += wr * point.value;
                for s in 0..=r {
                    a[r * m + s] += wr * row[s];
                }
            }
        }
        for j in 0..n {
            let factor = self.config.epsilon.as_ref().map_or(1.0, |eps| eps[j]);
            a[j * m + j] += self.config.lambda2 * factor;
        }

        Cholesky::decompose(&a, m)?.solve(&b)
    }

    fn learn_iterative(&self, dataset: &Dataset, initial: Vec<f64>) -> Result<Vec<f64>> {
        let objective = PrimalObjective {
            points: dataset.points(),
            coefficients: point_coefficients(
                dataset.points(),
                self.config.weighting(),
                self.config.use_datapoint_weights,
            )?,
            loss: self.loss.as_ref(),
            data_scale: self.config.data_scale(),
            lambda2: self.config.lambda2,
            epsilon: self.config.epsilon.as_deref(),
            num_features: dataset.num_features(),
        };
        let minimum =
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
        Ok(minimum.x)
    }

    /// Per-feature loss increase when the feature's contribution is removed
    /// from the cached scores, without refitting.
    ///
    /// Points are weighted by the configured weighting policy but not by
    /// their datapoint weights.
    pub fn effect_obj_func(&self, dataset: &Dataset) -> Result<Vec<f64>> {
        let weight = self.fitted_weight()?;
        let coefficients = point_coefficients(dataset.points(), self.config.weighting(), false)?;
        let mut scores = Vec::with_capacity(dataset.len());
        for point in dataset {
            self.check_dimension(weight, point)?;
            scores.push(linear_score(weight, point));
        }
        let loss = self.loss.as_ref();
        let with = data_loss(dataset.points(), &coefficients, &scores, loss);

        let n = weight.len() - 1;
        let effects = (0..n)
            .map(|j| {
                let without: f64 = dataset
                    .iter()
                    .zip(&coefficients)
                    .zip(&scores)
                    .map(|((p, c), s)| {
                        let reduced = s - p.features()[j] * weight[j];
                        c * loss.loss(reduced, p.value, p)
                    })
                    .sum();
                without - with
            })
            .collect();
        Ok(effects)
    }

    /// Loss increase on `train` after deleting each feature and refitting
    pub fn effect_obj_retrain(&self, train: &Dataset) -> Result<Vec<f64>> {
        self.retrain_effects(train, None).map(|(train, _)| train)
    }

    /// Like [`LinearLearner::effect_obj_retrain`], also measuring the loss
    /// change on a held-out set
    pub fn effect_obj_retrain_with_test(
        &self,
        train: &Dataset,
        test: &Dataset,
    ) -> Result<(Vec<f64>, Vec<f64>)> {
        let (train_effects, test_effects) = self.retrain_effects(train, Some(test))?;
        Ok((train_effects, test_effects.unwrap_or_default()))
    }

    fn retrain_effects(
        &self,
        train: &Dataset,
        test: Option<&Dataset>,
    ) -> Result<(Vec<f64>, Option<Vec<f64>>)> {
        let train_with = self.training_loss(train)?;
        let test_with = test.map(|t| self.training_loss(t)).transpose()?;
        let n = train.num_features();

        let mut train_effects = Vec::with_capacity(n);
        let mut test_effects = test.map(|_| Vec::with_capacity(n));
        for j in 0..n {
            let mut reduced = train.clone();
            reduced.delete_features(&[j])?;

            let mut model = self.clone();
            model.weight = None;
            if let Some(eps) = &self.config.epsilon {
                model.config.epsilon = Some(vector::delete_indices(eps, &[j])?);
            }
            model.learn(&reduced)?;
            train_effects.push(model.training_loss(&reduced)? - train_with);

            if let (Some(test), Some(effects), Some(with)) = (test, test_effects.as_mut(), test_with)
            {
                let mut reduced_test = test.clone();
                reduced_test.delete_features(&[j])?;
                effects.push(model.training_loss(&reduced_test)? - with);
            }
        }
        Ok((train_effects, test_effects))
    }
}

impl Learner for LinearLearner {
    fn learn(&mut self, dataset: &Dataset) -> Result<()> {
        self.validate_training_set(dataset)?;
        let size = dataset.num_features() + 1;

        let weight = if self.config.solver.is_closed_form() {
            self.learn_ridge(dataset)?
        } else {
            let initial = match self.weight.take() {
                Some(w) if w.len() == size => w,
                _ => vec![0.0; size],
            };
            self.learn_iterative(dataset, initial)?
        };

        if weight.iter().any(|w| !w.is_finite()) {
            return Err(RermError::NumericalFailure(
                "training produced non-finite weights".to_string(),
            ));
        }
        info!(
            "Trained linear model on {} points, {} features ({}, loss {})",
            dataset.len(),
            dataset.num_features(),
            self.config.solver,
            self.loss.kind()
        );
        self.weight = Some(weight);
        Ok(())
    }

    fn score(&self, point: &Datapoint) -> Result<f64> {
        let weight = self.fitted_weight()?;
        self.check_dimension(weight, point)?;
        Ok(linear_score(weight, point))
    }

    fn grouper(&self) -> Option<Grouper> {
        self.grouper
    }

    fn set_grouper(&mut self, grouper: Option<Grouper>) {
        self.grouper = grouper;
    }

    fn is_trained(&self) -> bool {
        self.weight.is_some()
    }

    fn tunable(&self, param: Hyperparameter) -> Result<f64> {
        Ok(self.config.get(param))
    }

    fn set_tunable(&mut self, param: Hyperparameter, value: f64) -> Result<()> {
        self.config.set(param, value)
    }
}
