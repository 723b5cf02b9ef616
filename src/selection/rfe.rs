//! Recursive feature elimination over a linear learner
//!
//! Each round optionally re-tunes `lambda2`, fits the learner, ranks the
//! remaining features and deletes the lowest-ranked ones. Large feature sets
//! shrink by half per round; below the `speed` threshold one feature goes at
//! a time. The loop stops exactly at the target count.

use std::fmt;
use std::sync::Arc;

use log::{debug, info};
use serde::Serialize;

use crate::core::vector;
use crate::core::{Dataset, Hyperparameter, Learner, RermError, Result};
use crate::learner::LinearLearner;
use crate::metrics::DatasetResult;
use crate::resampling::{seeded_rng, CrossValidation, ResamplingError};
use crate::selection::GeneralizedRanking;
use crate::tuning::{optimize_parameter, LAMBDA_VALUES};

/// How the features of a fitted learner are ranked; larger is more useful
#[derive(Debug, Clone, PartialEq)]
pub enum RankMethod {
    /// Loss increase when a feature's contribution is dropped from the scores
    EffectObjective,
    /// Absolute weight
    WeightMagnitude,
    /// Loss increase after refitting without the feature
    EffectRetrain,
    /// Effects accumulated over normalized resamples
    Generalized(GeneralizedRanking),
}

impl RankMethod {
    /// Legacy ids: 0 effect on objective, 1 weight magnitude, 2 effect with retraining
    pub fn from_id(id: u32) -> Result<Self> {
        match id {
            0 => Ok(RankMethod::EffectObjective),
            1 => Ok(RankMethod::WeightMagnitude),
            2 => Ok(RankMethod::EffectRetrain),
            _ => Err(RermError::InvalidParameter(format!(
                "unknown rank method id {id}"
            ))),
        }
    }
}

/// Rank the features of `dataset` with a learner already fitted on it
pub fn rank_features(
    learner: &LinearLearner,
    dataset: &Dataset,
    method: &RankMethod,
) -> Result<Vec<f64>> {
    match method {
        RankMethod::EffectObjective => learner.effect_obj_func(dataset),
        RankMethod::WeightMagnitude => {
            let weight = learner.weight().ok_or(RermError::ModelNotTrained)?;
            let n = weight.len().saturating_sub(1);
            Ok(weight[..n].iter().map(|w| w.abs()).collect())
        }
        RankMethod::EffectRetrain => learner.effect_obj_retrain(dataset),
        RankMethod::Generalized(ranking) => ranking.compute_rank(learner, dataset),
    }
}

/// Fit `learner` on `dataset` and rank its features
pub fn compute_rank(
    learner: &mut LinearLearner,
    dataset: &Dataset,
    method: &RankMethod,
) -> Result<Vec<f64>> {
    learner.learn(dataset)?;
    rank_features(learner, dataset, method)
}

/// Number of features to delete from `size` in one round
pub fn deletion_count(size: usize, target: usize, speed: usize) -> usize {
    let excess = size.saturating_sub(target);
    if excess == 0 {
        return 0;
    }
    let count = if size < speed {
        1
    } else {
        let half = size / 2;
        if size - half < target {
            excess
        } else {
            half
        }
    };
    count.clamp(1, excess)
}

/// Per-round `lambda2` sweep scored by a resampler
#[derive(Clone)]
pub struct LambdaSweep {
    pub resampler: Arc<dyn ResamplingError>,
    pub values: Vec<f64>,
}

impl LambdaSweep {
    /// Sweep over the default regularization grid
    pub fn new(resampler: Arc<dyn ResamplingError>) -> Self {
        Self {
            resampler,
            values: LAMBDA_VALUES.to_vec(),
        }
    }

    pub fn with_values(mut self, values: Vec<f64>) -> Self {
        self.values = values;
        self
    }
}

impl fmt::Debug for LambdaSweep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LambdaSweep")
            .field("resampler", &self.resampler.describe())
            .field("values", &self.values)
            .finish()
    }
}

/// Mixes the training ranking with held-out fold effects:
/// `rank * (1 - fraction) + cv_rank * fraction`
#[derive(Debug, Clone, PartialEq)]
pub struct CrossValidatedBlend {
    pub fraction: f64,
    pub folds: usize,
    pub seed: Option<u64>,
}

impl CrossValidatedBlend {
    pub fn new(fraction: f64, folds: usize) -> Self {
        Self {
            fraction,
            folds,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.fraction) {
            return Err(RermError::InvalidParameter(format!(
                "blend fraction must be in [0, 1], got {}",
                self.fraction
            )));
        }
        Ok(())
    }

    /// Mean held-out effect per feature over the folds
    fn cv_rank(&self, template: &LinearLearner, dataset: &Dataset) -> Result<Vec<f64>> {
        let mut rng = seeded_rng(self.seed);
        let mut cv = CrossValidation::new(dataset);
        cv.generate_folds(self.folds, &mut rng)?;

        let mut rank = vec![0.0; dataset.num_features()];
        for fold in 0..self.folds {
            let mut model = template.clone();
            model.learn(&cv.folds_except(fold)?)?;
            let effects = model.effect_obj_func(&cv.fold(fold)?)?;
            vector::axpy(1.0 / self.folds as f64, &effects, &mut rank)?;
        }
        Ok(rank)
    }

    fn blend(&self, template: &LinearLearner, dataset: &Dataset, rank: &mut [f64]) -> Result<()> {
        let cv_rank = self.cv_rank(template, dataset)?;
        for (r, cv) in rank.iter_mut().zip(&cv_rank) {
            *r = *r * (1.0 - self.fraction) + cv * self.fraction;
        }
        Ok(())
    }
}

/// Summary of one elimination round
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RfeRound {
    pub features_before: usize,
    /// Original ids of the deleted features, ascending
    pub deleted: Vec<usize>,
    pub remaining: usize,
    pub lambda2: f64,
    /// Objective loss of the fit this round was ranked with
    pub training_loss: f64,
    pub train_accuracy: Option<f64>,
    pub test_accuracy: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct Rfe {
    pub target: usize,
    /// Below this many features, delete one per round
    pub speed: usize,
    pub rank_method: RankMethod,
    pub lambda_sweep: Option<LambdaSweep>,
    pub cv_blend: Option<CrossValidatedBlend>,
}

impl Rfe {
    pub fn new(target: usize) -> Self {
        Self {
            target,
            speed: 10,
            rank_method: RankMethod::EffectObjective,
            lambda_sweep: None,
            cv_blend: None,
        }
    }

    pub fn with_speed(mut self, speed: usize) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_rank_method(mut self, method: RankMethod) -> Self {
        self.rank_method = method;
        self
    }

    pub fn with_lambda_sweep(mut self, sweep: LambdaSweep) -> Self {
        self.lambda_sweep = Some(sweep);
        self
    }

    pub fn with_cv_blend(mut self, blend: CrossValidatedBlend) -> Self {
        self.cv_blend = Some(blend);
        self
    }

    fn validate(&self, train: &Dataset, test: Option<&Dataset>) -> Result<()> {
        if self.target == 0 {
            return Err(RermError::InvalidParameter(
                "target feature count must be at least 1".to_string(),
            ));
        }
        if train.num_features() < self.target {
            return Err(RermError::InvalidParameter(format!(
                "target {} exceeds the {} available features",
                self.target,
                train.num_features()
            )));
        }
        if let Some(test) = test {
            if test.num_features() != train.num_features() {
                return Err(RermError::DimensionMismatch {
                    expected: train.num_features(),
                    actual: test.num_features(),
                });
            }
        }
        if let Some(blend) = &self.cv_blend {
            blend.validate()?;
        }
        Ok(())
    }

    /// Eliminate features from `train` (and `test` alongside) until `target` remain.
    ///
    /// The learner is left fitted on the last ranked round.
    pub fn select(
        &self,
        learner: &mut LinearLearner,
        train: &mut Dataset,
        mut test: Option<&mut Dataset>,
    ) -> Result<Vec<RfeRound>> {
        self.validate(train, test.as_deref())?;
        let mut rounds = Vec::new();

        while train.num_features() > self.target {
            let before = train.num_features();
            if let Some(sweep) = &self.lambda_sweep {
                optimize_parameter(
                    learner,
                    train,
                    sweep.resampler.as_ref(),
                    Hyperparameter::Lambda2,
                    &sweep.values,
                )?;
            }

            let mut rank = compute_rank(learner, train, &self.rank_method)?;
            if let Some(blend) = &self.cv_blend {
                blend.blend(learner, train, &mut rank)?;
            }
            let training_loss = learner.training_loss(train)?;
            let train_accuracy = accuracy(learner, train)?;
            let test_accuracy = match test.as_deref_mut() {
                Some(t) => accuracy(learner, t)?,
                None => None,
            };

            let count = deletion_count(before, self.target, self.speed);
            let mut deletions = vector::min_indices(&rank, count);
            deletions.sort_unstable();
            debug!("Deleting columns {deletions:?} of {before}");

            let deleted: Vec<usize> = deletions
                .iter()
                .map(|&i| train.feature_index()[i])
                .collect();
            train.delete_features(&deletions)?;
            if let Some(t) = test.as_deref_mut() {
                t.delete_features(&deletions)?;
            }
            if let Some(eps) = learner.config().epsilon.clone() {
                let reduced = vector::delete_indices(&eps, &deletions)?;
                *learner = std::mem::take(learner).with_epsilon(reduced);
            }

            let round = RfeRound {
                features_before: before,
                deleted,
                remaining: train.num_features(),
                lambda2: learner.config().lambda2,
                training_loss,
                train_accuracy,
                test_accuracy,
            };
            info!(
                "RFE: {} -> {} features (lambda2 {:e}, loss {:.6}{})",
                round.features_before,
                round.remaining,
                round.lambda2,
                round.training_loss,
                round
                    .test_accuracy
                    .map(|a| format!(", test accuracy {a:.4}"))
                    .unwrap_or_default()
            );
            rounds.push(round);
        }
        Ok(rounds)
    }
}

/// Accuracy of the learner's predictions when it assigns groups
fn accuracy(learner: &LinearLearner, dataset: &mut Dataset) -> Result<Option<f64>> {
    if learner.grouper().is_none() || dataset.is_empty() {
        return Ok(None);
    }
    learner.predict(dataset)?;
    Ok(Some(DatasetResult::new(dataset)?.accuracy()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Datapoint, Grouper};
    use crate::resampling::{CrossValidationError, ResamplingConfig};
    use crate::solver::SolverKind;

    /// The label is `x0 + x3`; the other columns are deterministic noise
    fn dataset(n: usize, features: usize) -> Dataset {
        let points = (0..n)
            .map(|i| {
                let label = if i % 2 == 0 { 1 } else { -1 };
                let nuisance = ((i * 7) % 5) as f64 * 0.3 - 0.6;
                let x: Vec<f64> = (0..features)
                    .map(|j| match j {
                        0 => label as f64 + nuisance,
                        3 => -nuisance,
                        _ => ((i * (j + 2) * 13) % 11) as f64 * 0.1 - 0.5,
                    })
                    .collect();
                Datapoint::labeled(x, label)
            })
            .collect();
        Dataset::from_points("rfe", points).unwrap()
    }

    fn learner() -> LinearLearner {
        LinearLearner::new()
            .with_solver(SolverKind::Ridge)
            .with_lambda2(0.01)
            .with_grouper(Grouper::AboveThreshold(0.0))
    }

    #[test]
    fn test_deletion_count_schedule() {
        assert_eq!(deletion_count(40, 2, 10), 20);
        assert_eq!(deletion_count(20, 2, 10), 10);
        assert_eq!(deletion_count(9, 2, 10), 1);
        assert_eq!(deletion_count(12, 8, 10), 4);
        assert_eq!(deletion_count(3, 3, 10), 0);
        for size in 1..60 {
            for target in 1..=size {
                for speed in [0, 1, 5, 10, 100] {
                    let count = deletion_count(size, target, speed);
                    assert!(size - count >= target);
                    if size > target {
                        assert!(count >= 1);
                    }
                }
            }
        }
    }

    #[test]
    fn test_rank_method_ids() {
        assert_eq!(RankMethod::from_id(1).unwrap(), RankMethod::WeightMagnitude);
        assert!(RankMethod::from_id(7).is_err());
    }

    #[test]
    fn test_select_stops_at_target() {
        let mut train = dataset(40, 12);
        let mut test = dataset(20, 12);
        let mut model = learner();
        let rounds = Rfe::new(2)
            .with_speed(6)
            .select(&mut model, &mut train, Some(&mut test))
            .unwrap();

        assert_eq!(train.num_features(), 2);
        assert_eq!(test.num_features(), 2);
        assert_eq!(train.feature_index(), &[0, 3]);
        let mut previous = 12;
        for round in &rounds {
            assert_eq!(round.features_before, previous);
            assert!(round.remaining < round.features_before);
            assert_eq!(round.features_before - round.remaining, round.deleted.len());
            previous = round.remaining;
        }
        assert_eq!(rounds[0].remaining, 6);
        assert!(rounds.iter().all(|r| r.test_accuracy.is_some()));
    }

    #[test]
    fn test_weight_magnitude_and_retrain_rankings() {
        for method in [RankMethod::WeightMagnitude, RankMethod::EffectRetrain] {
            let mut train = dataset(30, 6);
            let mut model = learner();
            Rfe::new(2)
                .with_rank_method(method.clone())
                .select(&mut model, &mut train, None)
                .unwrap();
            assert_eq!(train.feature_index(), &[0, 3], "{method:?}");
        }
    }

    #[test]
    fn test_sweep_and_blend() {
        let mut train = dataset(30, 5);
        let mut model = learner().with_epsilon(vec![1.0; 5]);
        let sweep = LambdaSweep::new(Arc::new(CrossValidationError::new(
            3,
            ResamplingConfig::default().with_seed(3),
        )))
        .with_values(vec![0.001, 0.1]);
        let rounds = Rfe::new(3)
            .with_lambda_sweep(sweep)
            .with_cv_blend(CrossValidatedBlend::new(0.5, 3).with_seed(4))
            .select(&mut model, &mut train, None)
            .unwrap();

        assert_eq!(train.num_features(), 3);
        assert_eq!(model.config().epsilon.as_ref().map(Vec::len), Some(3));
        assert!(rounds
            .iter()
            .all(|r| r.lambda2 == 0.001 || r.lambda2 == 0.1));
    }

    #[test]
    fn test_invalid_targets() {
        let mut train = dataset(10, 3);
        let mut model = learner();
        assert!(Rfe::new(0).select(&mut model, &mut train, None).is_err());
        assert!(Rfe::new(4).select(&mut model, &mut train, None).is_err());
        assert!(Rfe::new(3)
            .select(&mut model, &mut train, None)
            .unwrap()
            .is_empty());
        let blend = CrossValidatedBlend::new(1.5, 2);
        assert!(Rfe::new(1)
            .with_cv_blend(blend)
            .select(&mut model, &mut train, None)
            .is_err());
    }
}
