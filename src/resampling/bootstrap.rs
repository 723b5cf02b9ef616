//! Bootstrap sampling and the bootstrap, .632 and .632+ error estimators

use log::debug;
use rand::Rng;

use crate::core::{Dataset, Learner, Result};
use crate::resampling::{ErrorAccumulator, ResamplingConfig, ResamplingError};

/// Weight of the held-out error in the .632 blend
pub const HOLDOUT_WEIGHT: f64 = 0.632;

/// Draws `n` indices with replacement and records the ones never drawn
#[derive(Debug, Clone)]
pub struct Bootstrap<'a> {
    dataset: &'a Dataset,
    sampled: Vec<usize>,
    unsampled: Vec<usize>,
}

impl<'a> Bootstrap<'a> {
    pub fn new(dataset: &'a Dataset) -> Self {
        Self {
            dataset,
            sampled: Vec::new(),
            unsampled: Vec::new(),
        }
    }

    pub fn generate_sample<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let n = self.dataset.len();
        let mut drawn = vec![false; n];
        self.sampled.clear();
        for _ in 0..n {
            let i = rng.gen_range(0..n);
            drawn[i] = true;
            self.sampled.push(i);
        }
        self.unsampled = (0..n).filter(|&i| !drawn[i]).collect();
    }

    /// Drawn indices, with repetitions
    pub fn sampled_indices(&self) -> &[usize] {
        &self.sampled
    }

    pub fn unsampled_indices(&self) -> &[usize] {
        &self.unsampled
    }

    pub fn sample(&self) -> Result<Dataset> {
        self.dataset.subset(&self.sampled)
    }

    pub fn unsampled(&self) -> Result<Dataset> {
        self.dataset.subset(&self.unsampled)
    }
}

/// In-sample and out-of-sample errors collected over bootstrap rounds
struct BootstrapRun {
    recall: ErrorAccumulator,
    prediction: ErrorAccumulator,
    positives: usize,
    predicted_positives: usize,
}

fn run_bootstrap(
    config: &ResamplingConfig,
    learner: &mut dyn Learner,
    dataset: &Dataset,
    with_recall: bool,
) -> Result<BootstrapRun> {
    config.validate()?;
    let mut rng = config.rng();
    let mut bootstrap = Bootstrap::new(dataset);
    let loss = config.loss.as_ref();
    let mut run = BootstrapRun {
        recall: config.accumulator(),
        prediction: config.accumulator(),
        positives: 0,
        predicted_positives: 0,
    };

    for round in 0..config.rounds {
        bootstrap.generate_sample(&mut rng);
        let mut main = bootstrap.sample()?;
        learner.learn(&main)?;

        if with_recall {
            learner.predict(&mut main)?;
            run.recall.add_all(&main, loss)?;
            run.positives += main.group_count(1);
            run.predicted_positives += main.iter().filter(|p| p.predicted_positive()).count();
        }

        let mut held_out = bootstrap.unsampled()?;
        if held_out.is_empty() {
            debug!("Bootstrap round {}: every point was drawn", round + 1);
            continue;
        }
        learner.predict(&mut held_out)?;
        run.prediction.add_all(&held_out, loss)?;
    }
    Ok(run)
}

/// Mean loss on the points left out of each bootstrap sample
#[derive(Debug, Clone)]
pub struct BootstrapError {
    pub config: ResamplingConfig,
}

impl BootstrapError {
    pub fn new(config: ResamplingConfig) -> Self {
        Self { config }
    }
}

impl ResamplingError for BootstrapError {
    fn error(&self, learner: &mut dyn Learner, dataset: &Dataset) -> Result<f64> {
        run_bootstrap(&self.config, learner, dataset, false)?.prediction.error()
    }

    fn describe(&self) -> String {
        format!("bootstrap x{}", self.config.rounds)
    }
}

/// `0.368 * in-sample error + 0.632 * held-out error`
#[derive(Debug, Clone)]
pub struct Bootstrap632Error {
    pub config: ResamplingConfig,
}

impl Bootstrap632Error {
    pub fn new(config: ResamplingConfig) -> Self {
        Self { config }
    }
}

impl ResamplingError for Bootstrap632Error {
    fn error(&self, learner: &mut dyn Learner, dataset: &Dataset) -> Result<f64> {
        let run = run_bootstrap(&self.config, learner, dataset, true)?;
        let recall = run.recall.error()?;
        let prediction = run.prediction.error()?;
        debug!(".632 bootstrap: recall error {recall:.4}, prediction error {prediction:.4}");
        Ok((1.0 - HOLDOUT_WEIGHT) * recall + HOLDOUT_WEIGHT * prediction)
    }

    fn describe(&self) -> String {
        format!(".632 bootstrap x{}", self.config.rounds)
    }
}

/// .632 blend with the held-out weight raised according to the relative
/// overfitting rate
#[derive(Debug, Clone)]
pub struct Bootstrap632PlusError {
    pub config: ResamplingConfig,
}

impl Bootstrap632PlusError {
    pub fn new(config: ResamplingConfig) -> Self {
        Self { config }
    }
}

/// Blend weight and error of the .632+ rule.
///
/// `r = (prediction - recall) / (gamma - recall)` and
/// `w = 0.632 / (1 - 0.368 r)` clamped to `[0, 1]`. When `gamma` and
/// `recall` coincide the overfitting rate is taken as 0, which yields the
/// plain .632 blend.
pub fn blend_632_plus(recall: f64, prediction: f64, gamma: f64) -> (f64, f64) {
    let denominator = gamma - recall;
    let rate = if denominator.abs() < 1e-12 {
        0.0
    } else {
        (prediction - recall) / denominator
    };
    let raw = HOLDOUT_WEIGHT / (1.0 - (1.0 - HOLDOUT_WEIGHT) * rate);
    let weight = if raw.is_nan() { HOLDOUT_WEIGHT } else { raw.clamp(0.0, 1.0) };
    (weight, (1.0 - weight) * recall + weight * prediction)
}

impl ResamplingError for Bootstrap632PlusError {
    fn error(&self, learner: &mut dyn Learner, dataset: &Dataset) -> Result<f64> {
        let run = run_bootstrap(&self.config, learner, dataset, true)?;
        let recall = run.recall.error()?;
        let prediction = run.prediction.error()?;

        // pooled over all rounds
        let total = run.recall.count() as f64;
        let prior = run.positives as f64 / total;
        let posterior = run.predicted_positives as f64 / total;
        let gamma = prior * (1.0 - posterior) + (1.0 - prior) * posterior;

        let (weight, error) = blend_632_plus(recall, prediction, gamma);
        debug!(
            ".632+ bootstrap: recall {recall:.4}, prediction {prediction:.4}, prior {prior:.4}, \
             posterior {posterior:.4}, gamma {gamma:.4}, weight {weight:.4}"
        );
        Ok(error)
    }

    fn describe(&self) -> String {
        format!(".632+ bootstrap x{}", self.config.rounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Datapoint;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_sample_and_complement() {
        let points = (0..15).map(|i| Datapoint::valued(vec![i as f64], 0.0)).collect();
        let data = Dataset::from_points("boot", points).unwrap();
        let mut bootstrap = Bootstrap::new(&data);
        bootstrap.generate_sample(&mut StdRng::seed_from_u64(3));

        assert_eq!(bootstrap.sampled_indices().len(), 15);
        for i in bootstrap.unsampled_indices() {
            assert!(!bootstrap.sampled_indices().contains(i));
        }
        for i in 0..15 {
            assert!(
                bootstrap.sampled_indices().contains(&i) || bootstrap.unsampled_indices().contains(&i)
            );
        }
        assert_eq!(bootstrap.sample().unwrap().len(), 15);
    }

    #[test]
    fn test_blend_weight_always_clamped() {
        let values = [-2.0, -0.5, 0.0, 0.1, 0.3, 0.5, 0.9, 1.0, 3.0];
        for &recall in &values {
            for &prediction in &values {
                for &gamma in &values {
                    let (weight, _) = blend_632_plus(recall, prediction, gamma);
                    assert!((0.0..=1.0).contains(&weight), "weight {weight}");
                }
            }
        }
    }

    #[test]
    fn test_blend_reduces_to_632_when_gamma_equals_recall() {
        let (weight, error) = blend_632_plus(0.2, 0.5, 0.2);
        assert_relative_eq!(weight, 0.632);
        assert_relative_eq!(error, 0.368 * 0.2 + 0.632 * 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_blend_no_overfitting() {
        // prediction error equal to recall error: r = 0
        let (weight, error) = blend_632_plus(0.3, 0.3, 0.5);
        assert_relative_eq!(weight, 0.632);
        assert_relative_eq!(error, 0.3);
        // prediction error at the no-information rate: r = 1, w = 1
        let (weight, _) = blend_632_plus(0.1, 0.5, 0.5);
        assert_relative_eq!(weight, 1.0, epsilon = 1e-12);
    }
}
