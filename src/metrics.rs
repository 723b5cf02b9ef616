//! Prediction quality of a predicted dataset
//!
//! Classification measures count groups `+1` and `-1` only; regression
//! measures compare `value` with `predicted_value` over every point.

use serde::Serialize;

use crate::core::{Dataset, RermError, Result};
use crate::loss::LossFunction;

/// Confusion counts of the `+1` / `-1` groups
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionCounts {
    pub true_positives: usize,
    pub true_negatives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

impl ConfusionCounts {
    pub fn positives(&self) -> usize {
        self.true_positives + self.false_negatives
    }

    pub fn negatives(&self) -> usize {
        self.true_negatives + self.false_positives
    }

    pub fn total(&self) -> usize {
        self.positives() + self.negatives()
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    }
}

/// Quality measures of a dataset whose points all carry predictions
#[derive(Debug, Clone)]
pub struct DatasetResult<'a> {
    dataset: &'a Dataset,
    counts: ConfusionCounts,
}

impl<'a> DatasetResult<'a> {
    pub fn new(dataset: &'a Dataset) -> Result<Self> {
        if dataset.is_empty() {
            return Err(RermError::EmptyDataset);
        }
        let mut counts = ConfusionCounts::default();
        for point in dataset {
            if point.predicted_value.is_none() {
                return Err(RermError::ModelNotTrained);
            }
            let predicted = point.predicted_group;
            match point.group {
                Some(1) if predicted == Some(1) => counts.true_positives += 1,
                Some(1) => counts.false_negatives += 1,
                Some(-1) if predicted == Some(-1) => counts.true_negatives += 1,
                Some(-1) => counts.false_positives += 1,
                _ => {}
            }
        }
        Ok(Self { dataset, counts })
    }

    pub fn counts(&self) -> ConfusionCounts {
        self.counts
    }

    /// Correct predictions over all points of group `+1` or `-1`
    pub fn accuracy(&self) -> f64 {
        let c = &self.counts;
        ratio(
            (c.true_positives + c.true_negatives) as f64,
            c.total() as f64,
        )
    }

    /// Mean of the per-group accuracies
    pub fn balanced_accuracy(&self) -> f64 {
        (self.recall() + self.specificity()) / 2.0
    }

    pub fn precision(&self) -> f64 {
        let c = &self.counts;
        ratio(
            c.true_positives as f64,
            (c.true_positives + c.false_positives) as f64,
        )
    }

    pub fn recall(&self) -> f64 {
        ratio(self.counts.true_positives as f64, self.counts.positives() as f64)
    }

    pub fn specificity(&self) -> f64 {
        ratio(self.counts.true_negatives as f64, self.counts.negatives() as f64)
    }

    /// Matthews correlation coefficient, 0 when a marginal is empty
    pub fn mcc(&self) -> f64 {
        let c = &self.counts;
        let (tp, tn) = (c.true_positives as f64, c.true_negatives as f64);
        let (fp, fn_) = (c.false_positives as f64, c.false_negatives as f64);
        let denominator = ((tp + fp) * (tp + fn_) * (tn + fp) * (tn + fn_)).sqrt();
        ratio(tp * tn - fp * fn_, denominator)
    }

    /// Area under the ROC curve by the trapezoid rule over predicted values
    /// sorted descending; tied predictions form one step. 0 without both groups.
    pub fn auc(&self) -> f64 {
        let positives = self.counts.positives() as f64;
        let negatives = self.counts.negatives() as f64;
        if positives == 0.0 || negatives == 0.0 {
            return 0.0;
        }

        let mut ranked: Vec<(f64, bool)> = self
            .dataset
            .iter()
            .filter(|p| matches!(p.group, Some(1) | Some(-1)))
            .map(|p| (p.predicted_value.unwrap_or(f64::NEG_INFINITY), p.group == Some(1)))
            .collect();
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0));

        let trapezoid = |x1: f64, x2: f64, y1: f64, y2: f64| (x1 - x2).abs() * (y1 + y2) / 2.0;
        let (mut tp, mut fp, mut tp_prev, mut fp_prev) = (0.0, 0.0, 0.0, 0.0);
        let mut previous = None;
        let mut area = 0.0;
        for (prediction, positive) in ranked {
            if previous != Some(prediction) {
                area += trapezoid(fp, fp_prev, tp, tp_prev);
                previous = Some(prediction);
                fp_prev = fp;
                tp_prev = tp;
            }
            if positive {
                tp += 1.0;
            } else {
                fp += 1.0;
            }
        }
        area += trapezoid(fp, fp_prev, tp, tp_prev);
        area / (positives * negatives)
    }

    fn residuals(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.dataset
            .iter()
            .map(|p| (p.value, p.predicted_value.unwrap_or(0.0)))
    }

    /// Root mean squared deviation of predictions from values
    pub fn rmsd(&self) -> f64 {
        let sum: f64 = self.residuals().map(|(v, p)| (v - p).powi(2)).sum();
        (sum / self.dataset.len() as f64).sqrt()
    }

    /// Coefficient of determination; Q² when the predictions are held out
    pub fn r2(&self) -> f64 {
        let n = self.dataset.len() as f64;
        let mean = self.residuals().map(|(v, _)| v).sum::<f64>() / n;
        let (residual, total) = self
            .residuals()
            .fold((0.0, 0.0), |(r, t), (v, p)| (r + (v - p).powi(2), t + (v - mean).powi(2)));
        1.0 - ratio(residual, total)
    }

    /// Pearson correlation of values and predictions
    pub fn pcc(&self) -> f64 {
        let n = self.dataset.len() as f64;
        let (sum_v, sum_p) = self
            .residuals()
            .fold((0.0, 0.0), |(a, b), (v, p)| (a + v, b + p));
        let (mean_v, mean_p) = (sum_v / n, sum_p / n);
        let (mut cov, mut var_v, mut var_p) = (0.0, 0.0, 0.0);
        for (v, p) in self.residuals() {
            cov += (v - mean_v) * (p - mean_p);
            var_v += (v - mean_v).powi(2);
            var_p += (p - mean_p).powi(2);
        }
        ratio(cov, (var_v * var_p).sqrt())
    }

    /// Summed loss of every point
    pub fn loss_sum(&self, loss: &dyn LossFunction) -> f64 {
        self.dataset
            .iter()
            .map(|p| loss.loss(p.predicted_value.unwrap_or(0.0), p.value, p))
            .sum()
    }

    pub fn classification_summary(&self) -> String {
        let c = &self.counts;
        format!(
            "PosRight: {} of {} ({:.2}%) | NegRight: {} of {} ({:.2}%) | total {} of {} ({:.2}%) | MCC: {:.4} | AUC: {:.4}",
            c.true_positives,
            c.positives(),
            100.0 * self.recall(),
            c.true_negatives,
            c.negatives(),
            100.0 * self.specificity(),
            c.true_positives + c.true_negatives,
            c.total(),
            100.0 * self.accuracy(),
            self.mcc(),
            self.auc()
        )
    }

    pub fn regression_summary(&self) -> String {
        format!(
            "RMSD: {:.4} | R2: {:.4} | PCC: {:.4}",
            self.rmsd(),
            self.r2(),
            self.pcc()
        )
    }
}
