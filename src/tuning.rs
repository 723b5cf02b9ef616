//! Hyperparameter search by resampled error
//!
//! Candidates are bound through [`Learner::set_tunable`]; each is scored by
//! a [`ResamplingError`] and the learner ends up configured with the value
//! of lowest error.

use log::{debug, info, warn};
use serde::Serialize;

use crate::core::{Dataset, Hyperparameter, Learner, RermError, Result};
use crate::resampling::ResamplingError;

/// Default regularization grid of the RFE lambda sweep
pub const LAMBDA_VALUES: [f64; 7] = [0.001, 0.1, 0.3, 0.5, 0.7, 0.9, 0.95];

/// Resampled error of one candidate value
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Evaluation {
    pub value: f64,
    pub error: f64,
}

/// Outcome of a one-dimensional sweep
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TuningResult {
    pub parameter: Hyperparameter,
    pub best_value: f64,
    pub best_error: f64,
    pub evaluations: Vec<Evaluation>,
}

/// Step-wise sweep over candidate values of one hyperparameter.
///
/// Iterating evaluates one candidate per step; values the learner rejects
/// are skipped with a warning.
pub struct ParameterOptimizer<'a> {
    learner: &'a mut dyn Learner,
    dataset: &'a Dataset,
    resampler: &'a dyn ResamplingError,
    parameter: Hyperparameter,
    candidates: Vec<f64>,
    next: usize,
    evaluations: Vec<Evaluation>,
}

impl<'a> ParameterOptimizer<'a> {
    pub fn new(
        learner: &'a mut dyn Learner,
        dataset: &'a Dataset,
        resampler: &'a dyn ResamplingError,
        parameter: Hyperparameter,
        candidates: &[f64],
    ) -> Self {
        Self {
            learner,
            dataset,
            resampler,
            parameter,
            candidates: candidates.to_vec(),
            next: 0,
            evaluations: Vec::new(),
        }
    }

    pub fn evaluations(&self) -> &[Evaluation] {
        &self.evaluations
    }

    /// Lowest-error evaluation so far; the earliest wins ties
    pub fn best(&self) -> Option<Evaluation> {
        self.evaluations
            .iter()
            .copied()
            .fold(None, |best: Option<Evaluation>, e| match best {
                Some(b) if b.error <= e.error => Some(b),
                _ => Some(e),
            })
    }

    /// Configure the learner with the best value found
    pub fn set_best(&mut self) -> Result<Evaluation> {
        let best = self.best().ok_or_else(|| {
            RermError::InvalidParameter(format!(
                "no valid candidate value for {}",
                self.parameter
            ))
        })?;
        self.learner.set_tunable(self.parameter, best.value)?;
        Ok(best)
    }

    fn evaluate(&mut self, value: f64) -> Result<Option<Evaluation>> {
        if let Err(e) = self.learner.set_tunable(self.parameter, value) {
            warn!("Skipping {} = {value}: {e}", self.parameter);
            return Ok(None);
        }
        let error = self.resampler.error(&mut *self.learner, self.dataset)?;
        debug!(
            "{} = {value:e}: {} error {error:.6}",
            self.parameter,
            self.resampler.describe()
        );
        let evaluation = Evaluation { value, error };
        self.evaluations.push(evaluation);
        Ok(Some(evaluation))
    }

    /// Evaluate every remaining candidate and set the best one
    pub fn run(mut self) -> Result<TuningResult> {
        for step in self.by_ref() {
            step?;
        }
        let best = self.set_best()?;
        info!(
            "Best {} = {:e} with error {:.6}",
            self.parameter, best.value, best.error
        );
        Ok(TuningResult {
            parameter: self.parameter,
            best_value: best.value,
            best_error: best.error,
            evaluations: self.evaluations,
        })
    }
}

impl Iterator for ParameterOptimizer<'_> {
    type Item = Result<Evaluation>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next < self.candidates.len() {
            let value = self.candidates[self.next];
            self.next += 1;
            match self.evaluate(value) {
                Ok(Some(evaluation)) => return Some(Ok(evaluation)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }
}

/// Sweep one hyperparameter and leave the learner set to its best value
pub fn optimize_parameter(
    learner: &mut dyn Learner,
    dataset: &Dataset,
    resampler: &dyn ResamplingError,
    parameter: Hyperparameter,
    candidates: &[f64],
) -> Result<TuningResult> {
    ParameterOptimizer::new(learner, dataset, resampler, parameter, candidates).run()
}

/// Grid search over two hyperparameters; returns the best pair and its error
pub fn optimize_two_parameters(
    learner: &mut dyn Learner,
    dataset: &Dataset,
    resampler: &dyn ResamplingError,
    first: (Hyperparameter, &[f64]),
    second: (Hyperparameter, &[f64]),
) -> Result<((f64, f64), f64)> {
    let mut best: Option<((f64, f64), f64)> = None;
    for &a in first.1 {
        if let Err(e) = learner.set_tunable(first.0, a) {
            warn!("Skipping {} = {a}: {e}", first.0);
            continue;
        }
        for &b in second.1 {
            if let Err(e) = learner.set_tunable(second.0, b) {
                warn!("Skipping {} = {b}: {e}", second.0);
                continue;
            }
            let error = resampler.error(learner, dataset)?;
            debug!("{} = {a:e}, {} = {b:e}: error {error:.6}", first.0, second.0);
            if best.map_or(true, |(_, e)| error < e) {
                best = Some(((a, b), error));
            }
        }
    }
    let ((a, b), error) = best.ok_or_else(|| {
        RermError::InvalidParameter(format!(
            "no valid candidate pair for {} and {}",
            first.0, second.0
        ))
    })?;
    learner.set_tunable(first.0, a)?;
    learner.set_tunable(second.0, b)?;
    info!("Best {} = {a:e}, {} = {b:e} with error {error:.6}", first.0, second.0);
    Ok(((a, b), error))
}
