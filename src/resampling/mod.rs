//! Resampling estimators of the generalization error
//!
//! Every estimator trains the given learner on resampled training sets and
//! evaluates a loss on the predictions it makes. The learner is left fitted
//! on the last resample.

pub mod bootstrap;
pub mod cross_validation;

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::core::{Datapoint, Dataset, Learner, RermError, Result};
use crate::loss::{LossFunction, SquaredError};

pub use self::bootstrap::{Bootstrap, Bootstrap632Error, Bootstrap632PlusError, BootstrapError};
pub use self::cross_validation::{CrossValidation, CrossValidationError};

/// Resampled error of a learner on a dataset
pub trait ResamplingError: Send + Sync {
    fn error(&self, learner: &mut dyn Learner, dataset: &Dataset) -> Result<f64>;

    /// Short name used in logs
    fn describe(&self) -> String;
}

/// Loss evaluation and randomness shared by the estimators
#[derive(Debug, Clone)]
pub struct ResamplingConfig {
    pub loss: Arc<dyn LossFunction>,
    /// Average group +1 and the remaining points separately, then take the mean
    pub group_averaging: bool,
    pub use_datapoint_weights: bool,
    pub rounds: usize,
    /// Fixed seed for reproducible resamples, fresh entropy otherwise
    pub seed: Option<u64>,
}

impl Default for ResamplingConfig {
    fn default() -> Self {
        Self {
            loss: Arc::new(SquaredError),
            group_averaging: false,
            use_datapoint_weights: false,
            rounds: 1,
            seed: None,
        }
    }
}

impl ResamplingConfig {
    pub fn new(loss: Arc<dyn LossFunction>) -> Self {
        Self {
            loss,
            ..Default::default()
        }
    }

    pub fn with_rounds(mut self, rounds: usize) -> Self {
        self.rounds = rounds;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_group_averaging(mut self, enabled: bool) -> Self {
        self.group_averaging = enabled;
        self
    }

    pub fn with_datapoint_weights(mut self, enabled: bool) -> Self {
        self.use_datapoint_weights = enabled;
        self
    }

    pub(crate) fn rng(&self) -> StdRng {
        seeded_rng(self.seed)
    }

    pub(crate) fn accumulator(&self) -> ErrorAccumulator {
        ErrorAccumulator::new(self.group_averaging, self.use_datapoint_weights)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.rounds == 0 {
            return Err(RermError::InvalidParameter(
                "resampling needs at least one round".to_string(),
            ));
        }
        Ok(())
    }
}

/// Reproducible generator for a fixed seed, entropy-seeded otherwise
pub(crate) fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

/// Running loss sums over predicted points, split into group +1 and the rest
#[derive(Debug, Clone, Default)]
pub struct ErrorAccumulator {
    group_averaging: bool,
    use_weights: bool,
    sum_pos: f64,
    num_pos: usize,
    sum_neg: f64,
    num_neg: usize,
}

impl ErrorAccumulator {
    pub fn new(group_averaging: bool, use_weights: bool) -> Self {
        Self {
            group_averaging,
            use_weights,
            ..Default::default()
        }
    }

    /// Add the loss of one predicted point
    pub fn add(&mut self, point: &Datapoint, loss: &dyn LossFunction) -> Result<()> {
        let prediction = point.predicted_value.ok_or(RermError::ModelNotTrained)?;
        let weight = if self.use_weights { point.weight } else { 1.0 };
        let value = weight * loss.loss(prediction, point.value, point);
        if self.group_averaging && point.group == Some(1) {
            self.sum_pos += value;
            self.num_pos += 1;
        } else {
            self.sum_neg += value;
            self.num_neg += 1;
        }
        Ok(())
    }

    pub fn add_all(&mut self, dataset: &Dataset, loss: &dyn LossFunction) -> Result<()> {
        for point in dataset {
            self.add(point, loss)?;
        }
        Ok(())
    }

    /// Number of points added so far
    pub fn count(&self) -> usize {
        self.num_pos + self.num_neg
    }

    /// Mean loss; under group averaging the mean of the two bucket means,
    /// or the single non-empty bucket's mean
    pub fn error(&self) -> Result<f64> {
        let mean = |sum: f64, n: usize| (n > 0).then(|| sum / n as f64);
        match (mean(self.sum_pos, self.num_pos), mean(self.sum_neg, self.num_neg)) {
            (Some(pos), Some(neg)) => Ok((pos + neg) / 2.0),
            (Some(only), None) | (None, Some(only)) => Ok(only),
            (None, None) => Err(RermError::EmptyDataset),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn predicted(group: i32, value: f64, prediction: f64) -> Datapoint {
        let mut p = Datapoint::labeled(vec![0.0], group);
        p.value = value;
        p.predicted_value = Some(prediction);
        p
    }

    #[test]
    fn test_accumulator_plain_mean() {
        let mut acc = ErrorAccumulator::new(false, false);
        acc.add(&predicted(1, 1.0, 0.0), &SquaredError).unwrap();
        acc.add(&predicted(-1, -1.0, -1.0), &SquaredError).unwrap();
        acc.add(&predicted(-1, -1.0, 1.0), &SquaredError).unwrap();
        assert_relative_eq!(acc.error().unwrap(), 5.0 / 3.0);
        assert_eq!(acc.count(), 3);
    }

    #[test]
    fn test_accumulator_group_averaged() {
        let mut acc = ErrorAccumulator::new(true, false);
        acc.add(&predicted(1, 1.0, 0.0), &SquaredError).unwrap();
        acc.add(&predicted(-1, -1.0, -1.0), &SquaredError).unwrap();
        acc.add(&predicted(-1, -1.0, 1.0), &SquaredError).unwrap();
        assert_relative_eq!(acc.error().unwrap(), (1.0 + 2.0) / 2.0);
    }

    #[test]
    fn test_accumulator_single_bucket_and_empty() {
        let mut acc = ErrorAccumulator::new(true, true);
        assert!(acc.error().is_err());
        acc.add(&predicted(-1, -1.0, 0.0).with_weight(3.0), &SquaredError)
            .unwrap();
        assert_relative_eq!(acc.error().unwrap(), 3.0);
    }

    #[test]
    fn test_accumulator_needs_predictions() {
        let mut acc = ErrorAccumulator::new(false, false);
        let point = Datapoint::labeled(vec![0.0], 1);
        assert!(acc.add(&point, &SquaredError).is_err());
    }
}
