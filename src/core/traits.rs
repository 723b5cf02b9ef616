//! Core traits shared by all learners

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::{Datapoint, Dataset, Grouper, RermError, Result};

/// Hyperparameters a learner exposes for tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hyperparameter {
    /// L2 regularization strength
    Lambda2,
    /// L1 regularization strength
    Lambda1,
    /// Share of the objective given to the positive group when group averaging
    WPlus,
    /// Relative gradient-norm stopping threshold
    GradLength,
}

impl Hyperparameter {
    pub const ALL: [Hyperparameter; 4] = [
        Hyperparameter::Lambda2,
        Hyperparameter::Lambda1,
        Hyperparameter::WPlus,
        Hyperparameter::GradLength,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Hyperparameter::Lambda2 => "lambda2",
            Hyperparameter::Lambda1 => "lambda1",
            Hyperparameter::WPlus => "w_plus",
            Hyperparameter::GradLength => "grad_length",
        }
    }
}

impl fmt::Display for Hyperparameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Hyperparameter {
    type Err = RermError;

    fn from_str(s: &str) -> Result<Self> {
        Hyperparameter::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| RermError::InvalidParameter(format!("unknown hyperparameter '{s}'")))
    }
}

/// Capability interface of every trainable predictor
pub trait Learner: Send + Sync {
    /// Fit the model; the dataset is only read
    fn learn(&mut self, dataset: &Dataset) -> Result<()>;

    /// Raw decision value of a single point
    fn score(&self, point: &Datapoint) -> Result<f64>;

    fn grouper(&self) -> Option<Grouper>;

    fn set_grouper(&mut self, grouper: Option<Grouper>);

    fn is_trained(&self) -> bool;

    /// Current value of a tunable hyperparameter
    fn tunable(&self, param: Hyperparameter) -> Result<f64>;

    fn set_tunable(&mut self, param: Hyperparameter, value: f64) -> Result<()>;

    /// Score a point and store the prediction on it
    fn predict_point(&self, point: &mut Datapoint) -> Result<f64> {
        let score = self.score(point)?;
        point.predicted_value = Some(score);
        point.predicted_group = self.grouper().map(|g| g.group(score));
        Ok(score)
    }

    /// Predict every point of a dataset
    fn predict(&self, dataset: &mut Dataset) -> Result<()> {
        for point in dataset.points_mut() {
            self.predict_point(point)?;
        }
        Ok(())
    }
}
