//! K-fold partitioning and the cross-validation error

use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::core::{Dataset, Learner, RermError, Result};
use crate::resampling::{ResamplingConfig, ResamplingError};

/// Shuffled partition of a dataset's point indices into folds
#[derive(Debug, Clone)]
pub struct CrossValidation<'a> {
    dataset: &'a Dataset,
    folds: Vec<Vec<usize>>,
}

impl<'a> CrossValidation<'a> {
    pub fn new(dataset: &'a Dataset) -> Self {
        Self {
            dataset,
            folds: Vec::new(),
        }
    }

    /// Shuffle the indices and cut them into `k` folds; the first `n % k`
    /// folds receive one extra point
    pub fn generate_folds<R: Rng + ?Sized>(&mut self, k: usize, rng: &mut R) -> Result<()> {
        let n = self.dataset.len();
        if k < 2 || k > n {
            return Err(RermError::InvalidParameter(format!(
                "number of folds must lie in [2, {n}], got {k}"
            )));
        }
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(rng);

        let base = n / k;
        let remainder = n % k;
        let mut folds = Vec::with_capacity(k);
        let mut start = 0;
        for fold in 0..k {
            let size = base + usize::from(fold < remainder);
            folds.push(indices[start..start + size].to_vec());
            start += size;
        }
        self.folds = folds;
        Ok(())
    }

    pub fn num_folds(&self) -> usize {
        self.folds.len()
    }

    pub fn fold_indices(&self, i: usize) -> Result<&[usize]> {
        self.folds.get(i).map(Vec::as_slice).ok_or_else(|| {
            RermError::InvalidParameter(format!("fold {i} out of range for {} folds", self.folds.len()))
        })
    }

    /// Indices of every fold except `i`
    pub fn indices_except(&self, i: usize) -> Result<Vec<usize>> {
        self.fold_indices(i)?;
        Ok(self
            .folds
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .flat_map(|(_, fold)| fold.iter().copied())
            .collect())
    }

    /// Held-out points of fold `i`
    pub fn fold(&self, i: usize) -> Result<Dataset> {
        self.dataset.subset(self.fold_indices(i)?)
    }

    /// Training points for fold `i`
    pub fn folds_except(&self, i: usize) -> Result<Dataset> {
        self.dataset.subset(&self.indices_except(i)?)
    }
}

/// Mean held-out loss over `rounds` repetitions of k-fold cross-validation
#[derive(Debug, Clone)]
pub struct CrossValidationError {
    pub folds: usize,
    pub config: ResamplingConfig,
}

impl CrossValidationError {
    pub fn new(folds: usize, config: ResamplingConfig) -> Self {
        Self { folds, config }
    }
}

impl ResamplingError for CrossValidationError {
    fn error(&self, learner: &mut dyn Learner, dataset: &Dataset) -> Result<f64> {
        self.config.validate()?;
        let mut rng = self.config.rng();
        let mut cv = CrossValidation::new(dataset);
        let mut accumulator = self.config.accumulator();

        for round in 0..self.config.rounds {
            cv.generate_folds(self.folds, &mut rng)?;
            for fold in 0..self.folds {
                let train = cv.folds_except(fold)?;
                let mut test = cv.fold(fold)?;
                learner.learn(&train)?;
                learner.predict(&mut test)?;
                accumulator.add_all(&test, self.config.loss.as_ref())?;
            }
            debug!(
                "Cross-validation round {}: running error {:.6}",
                round + 1,
                accumulator.error()?
            );
        }
        accumulator.error()
    }

    fn describe(&self) -> String {
        format!("{}-fold cross-validation x{}", self.folds, self.config.rounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Datapoint;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn dataset(n: usize) -> Dataset {
        let points = (0..n)
            .map(|i| Datapoint::valued(vec![i as f64], i as f64))
            .collect();
        Dataset::from_points("cv", points).unwrap()
    }

    #[test]
    fn test_folds_partition_every_size() {
        let mut rng = StdRng::seed_from_u64(7);
        for n in 2..=23 {
            let data = dataset(n);
            for k in 2..=n {
                let mut cv = CrossValidation::new(&data);
                cv.generate_folds(k, &mut rng).unwrap();

                let mut all: Vec<usize> = (0..k)
                    .flat_map(|i| cv.fold_indices(i).unwrap().to_vec())
                    .collect();
                all.sort_unstable();
                assert_eq!(all, (0..n).collect::<Vec<_>>());

                let sizes: Vec<usize> = (0..k).map(|i| cv.fold_indices(i).unwrap().len()).collect();
                let max = *sizes.iter().max().unwrap();
                let min = *sizes.iter().min().unwrap();
                assert!(max - min <= 1);

                for i in 0..k {
                    let mut split = cv.indices_except(i).unwrap();
                    split.extend_from_slice(cv.fold_indices(i).unwrap());
                    split.sort_unstable();
                    assert_eq!(split, (0..n).collect::<Vec<_>>());
                }
            }
        }
    }

    #[test]
    fn test_fold_datasets() {
        let data = dataset(10);
        let mut cv = CrossValidation::new(&data);
        cv.generate_folds(3, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(cv.fold(0).unwrap().len(), 4);
        assert_eq!(cv.folds_except(0).unwrap().len(), 6);
        assert_eq!(cv.fold(2).unwrap().len(), 3);
        assert!(cv.fold(3).is_err());
    }

    #[test]
    fn test_invalid_fold_count() {
        let data = dataset(4);
        let mut cv = CrossValidation::new(&data);
        let mut rng = StdRng::seed_from_u64(0);
        assert!(cv.generate_folds(1, &mut rng).is_err());
        assert!(cv.generate_folds(5, &mut rng).is_err());
    }
}
