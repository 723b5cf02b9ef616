//! Z-score normalization fitted on a training set

use serde::{Deserialize, Serialize};

use crate::core::vector;
use crate::core::{Datapoint, Dataset, RermError, Result};

/// Per-feature mean and standard deviation of a training set.
///
/// Features with zero standard deviation are dropped by [`Normalizer::normalize`];
/// [`Normalizer::non_zero_indices`] maps the surviving columns back to the
/// columns of the fitted dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Normalizer {
    mean: Vec<f64>,
    std: Vec<f64>,
    zero_indices: Vec<usize>,
    non_zero_indices: Vec<usize>,
}

impl Normalizer {
    /// Fit mean and sample standard deviation (n - 1 denominator) per feature
    pub fn fit(dataset: &Dataset) -> Result<Self> {
        if dataset.is_empty() {
            return Err(RermError::EmptyDataset);
        }
        if dataset.is_extended() {
            return Err(RermError::InvalidParameter(
                "cannot normalize a dataset with a bias column".to_string(),
            ));
        }
        let n = dataset.num_features();
        let size = dataset.len() as f64;

        let mut mean = vec![0.0; n];
        for point in dataset {
            for (m, x) in mean.iter_mut().zip(point.features()) {
                *m += x;
            }
        }
        vector::scale(&mut mean, 1.0 / size);

        let mut std = vec![0.0; n];
        for point in dataset {
            for ((s, x), m) in std.iter_mut().zip(point.features()).zip(&mean) {
                *s += (x - m).powi(2);
            }
        }
        if dataset.len() > 1 {
            vector::scale(&mut std, 1.0 / (size - 1.0));
        }
        std.iter_mut().for_each(|s| *s = s.sqrt());

        let (zero_indices, non_zero_indices): (Vec<usize>, Vec<usize>) =
            (0..n).partition(|&j| std[j] == 0.0);
        let mean = vector::delete_indices(&mean, &zero_indices)?;
        let std = vector::delete_indices(&std, &zero_indices)?;

        Ok(Self {
            mean,
            std,
            zero_indices,
            non_zero_indices,
        })
    }

    /// Columns of the fitted dataset that were dropped
    pub fn zero_indices(&self) -> &[usize] {
        &self.zero_indices
    }

    /// Columns of the fitted dataset that survive normalization, in order
    pub fn non_zero_indices(&self) -> &[usize] {
        &self.non_zero_indices
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn std(&self) -> &[f64] {
        &self.std
    }

    fn input_dimension(&self) -> usize {
        self.zero_indices.len() + self.non_zero_indices.len()
    }

    /// Drop the zero-variance columns, then center and scale every point
    pub fn normalize(&self, dataset: &mut Dataset) -> Result<()> {
        if dataset.num_features() != self.input_dimension() {
            return Err(RermError::DimensionMismatch {
                expected: self.input_dimension(),
                actual: dataset.num_features(),
            });
        }
        dataset.delete_features(&self.zero_indices)?;
        for point in dataset.points_mut() {
            self.scale_point(point)?;
        }
        Ok(())
    }

    /// Normalize a single point with the same layout as the fitted dataset
    pub fn normalize_point(&self, point: &Datapoint) -> Result<Datapoint> {
        if point.num_features() != self.input_dimension() || point.is_extended() {
            return Err(RermError::DimensionMismatch {
                expected: self.input_dimension(),
                actual: point.num_features(),
            });
        }
        let features = vector::keep_indices(point.features(), &self.non_zero_indices)?;
        let mut out = point.clone();
        out.set_features(features);
        self.scale_point(&mut out)?;
        Ok(out)
    }

    fn scale_point(&self, point: &mut Datapoint) -> Result<()> {
        let features = point.features_mut();
        for (x, m) in features.iter_mut().zip(&self.mean) {
            *x -= m;
        }
        vector::divide_unless_zero(features, &self.std)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn dataset() -> Dataset {
        let points = vec![
            Datapoint::valued(vec![1.0, 5.0, 10.0], 0.0),
            Datapoint::valued(vec![2.0, 5.0, 20.0], 0.0),
            Datapoint::valued(vec![3.0, 5.0, 30.0], 0.0),
        ];
        Dataset::from_points("norm", points).unwrap()
    }

    #[test]
    fn test_fit_and_normalize() {
        let mut data = dataset();
        let normalizer = Normalizer::fit(&data).unwrap();
        assert_eq!(normalizer.zero_indices(), &[1]);
        assert_eq!(normalizer.non_zero_indices(), &[0, 2]);
        assert_relative_eq!(normalizer.std()[0], 1.0);
        assert_relative_eq!(normalizer.std()[1], 10.0);

        normalizer.normalize(&mut data).unwrap();
        assert_eq!(data.num_features(), 2);
        assert_eq!(data.feature_index(), &[0, 2]);
        let first: Vec<f64> = data.iter().map(|p| p.features()[0]).collect();
        assert_relative_eq!(vector::mean(&first), 0.0);
        assert_relative_eq!(vector::std_dev(&first), 1.0);
    }

    #[test]
    fn test_normalize_point_and_dimension_check() {
        let normalizer = Normalizer::fit(&dataset()).unwrap();
        let point = normalizer
            .normalize_point(&Datapoint::new(vec![4.0, 7.0, 40.0]))
            .unwrap();
        assert_eq!(point.features(), &[2.0, 2.0]);

        let mut wrong = Dataset::from_points("wrong", vec![Datapoint::new(vec![1.0])]).unwrap();
        assert!(matches!(
            normalizer.normalize(&mut wrong),
            Err(RermError::DimensionMismatch { .. })
        ));
    }
}
