//! Feature rankings accumulated over resamples
//!
//! Each resample is z-score normalized on its training part first; features
//! that are constant there are skipped for that resample, and the remaining
//! effects are mapped back to the columns of the input dataset.

use log::debug;

use crate::core::vector;
use crate::core::{Dataset, Learner, RermError, Result};
use crate::data::Normalizer;
use crate::learner::LinearLearner;
use crate::resampling::bootstrap::HOLDOUT_WEIGHT;
use crate::resampling::{seeded_rng, Bootstrap, CrossValidation};

/// How the resamples are drawn and their effects combined
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeneralizedMethod {
    /// Sum of in-fold and held-out-fold effects over k-fold splits
    CrossValidation { folds: usize, rounds: usize },
    /// `0.632 * held-out + 0.368 * in-sample` effects over bootstrap samples
    Bootstrap632 { samples: usize },
    /// As `Bootstrap632`, with effects measured by refitting without each feature
    Bootstrap632Retrain { samples: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneralizedRanking {
    pub method: GeneralizedMethod,
    pub seed: Option<u64>,
}

impl GeneralizedRanking {
    pub fn new(method: GeneralizedMethod) -> Self {
        Self { method, seed: None }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Accumulated effect per feature of `dataset`; larger means more useful
    pub fn compute_rank(&self, learner: &LinearLearner, dataset: &Dataset) -> Result<Vec<f64>> {
        let mut rank = vec![0.0; dataset.num_features()];
        let mut rng = seeded_rng(self.seed);

        match self.method {
            GeneralizedMethod::CrossValidation { folds, rounds } => {
                let mut cv = CrossValidation::new(dataset);
                for round in 0..rounds {
                    cv.generate_folds(folds, &mut rng)?;
                    for fold in 0..folds {
                        debug!(
                            "Generalized ranking: round {} of {rounds}, fold {} of {folds}",
                            round + 1,
                            fold + 1
                        );
                        let main = cv.folds_except(fold)?;
                        let held_out = cv.fold(fold)?;
                        accumulate(learner, main, held_out, &mut rank, 1.0, 1.0, false)?;
                    }
                }
            }
            GeneralizedMethod::Bootstrap632 { samples }
            | GeneralizedMethod::Bootstrap632Retrain { samples } => {
                let retrain = matches!(self.method, GeneralizedMethod::Bootstrap632Retrain { .. });
                let mut bootstrap = Bootstrap::new(dataset);
                for sample in 0..samples {
                    debug!("Generalized ranking: sample {} of {samples}", sample + 1);
                    bootstrap.generate_sample(&mut rng);
                    let held_out = bootstrap.unsampled()?;
                    if held_out.is_empty() {
                        continue;
                    }
                    accumulate(
                        learner,
                        bootstrap.sample()?,
                        held_out,
                        &mut rank,
                        1.0 - HOLDOUT_WEIGHT,
                        HOLDOUT_WEIGHT,
                        retrain,
                    )?;
                }
            }
        }
        Ok(rank)
    }

    /// Columns of the `num_deletions` lowest-ranked features
    pub fn select(
        &self,
        learner: &LinearLearner,
        dataset: &Dataset,
        num_deletions: usize,
    ) -> Result<Vec<usize>> {
        let rank = self.compute_rank(learner, dataset)?;
        Ok(vector::min_indices(&rank, num_deletions))
    }
}

/// Normalize one resample, fit on its main part and add the weighted effects
fn accumulate(
    template: &LinearLearner,
    mut main: Dataset,
    mut held_out: Dataset,
    rank: &mut [f64],
    main_weight: f64,
    held_out_weight: f64,
    retrain: bool,
) -> Result<()> {
    let normalizer = Normalizer::fit(&main)?;
    normalizer.normalize(&mut main)?;
    normalizer.normalize(&mut held_out)?;
    let surviving = normalizer.non_zero_indices();
    if surviving.is_empty() {
        return Err(RermError::InvalidParameter(
            "every feature is constant in a resample".to_string(),
        ));
    }
    debug!(
        "{} features with zero standard deviation skipped",
        normalizer.zero_indices().len()
    );

    let mut model = template.clone();
    if let Some(eps) = &template.config().epsilon {
        model = model.with_epsilon(vector::keep_indices(eps, surviving)?);
    }
    model.learn(&main)?;

    let (main_effects, held_out_effects) = if retrain {
        model.effect_obj_retrain_with_test(&main, &held_out)?
    } else {
        (model.effect_obj_func(&main)?, model.effect_obj_func(&held_out)?)
    };
    for (i, &column) in surviving.iter().enumerate() {
        rank[column] += main_weight * main_effects[i] + held_out_weight * held_out_effects[i];
    }
    Ok(())
}
