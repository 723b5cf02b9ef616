//! Weighting policy and the primal / dual objectives built on it

use serde::{Deserialize, Serialize};

use crate::core::vector::dot_unchecked;
use crate::core::{Datapoint, RermError, Result};
use crate::kernel::GramMatrix;
use crate::loss::LossFunction;
use crate::solver::DiffFunction;

/// How per-point losses are combined into the data term
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Weighting {
    /// Mean over all points
    Uniform,
    /// `w_plus / |+1| * sum_pos + (1 - w_plus) / |-1| * sum_neg`;
    /// every point not in group +1 falls into the negative sum, whose
    /// divisor counts group -1 only
    GroupAveraged { w_plus: f64 },
}

/// Per-point factors `c_i` such that the data term is `sum_i c_i g_i`
pub fn point_coefficients(
    points: &[Datapoint],
    weighting: Weighting,
    use_datapoint_weights: bool,
) -> Result<Vec<f64>> {
    if points.is_empty() {
        return Err(RermError::EmptyDataset);
    }
    let dweight = |p: &Datapoint| if use_datapoint_weights { p.weight } else { 1.0 };

    match weighting {
        Weighting::Uniform => {
            let n = points.len() as f64;
            Ok(points.iter().map(|p| dweight(p) / n).collect())
        }
        Weighting::GroupAveraged { w_plus } => {
            let positives = points.iter().filter(|p| p.group == Some(1)).count();
            let negatives = points.iter().filter(|p| p.group == Some(-1)).count();
            points
                .iter()
                .map(|p| {
                    let (share, count) = if p.group == Some(1) {
                        (w_plus, positives)
                    } else {
                        (1.0 - w_plus, negatives)
                    };
                    if count == 0 {
                        return Err(RermError::InvalidParameter(
                            "group averaging needs group -1 points when other groups are present"
                                .to_string(),
                        ));
                    }
                    Ok(dweight(p) * share / count as f64)
                })
                .collect()
        }
    }
}

/// Linear score `wᵀ [x, 1]`
#[inline]
pub fn linear_score(weight: &[f64], point: &Datapoint) -> f64 {
    weight.iter().zip(point.augmented()).map(|(w, x)| w * x).sum()
}

/// Unregularized data term `sum_i c_i g(score_i, value_i)`
pub fn data_loss(
    points: &[Datapoint],
    coefficients: &[f64],
    scores: &[f64],
    loss: &dyn LossFunction,
) -> f64 {
    points
        .iter()
        .zip(coefficients)
        .zip(scores)
        .map(|((p, c), s)| c * loss.loss(*s, p.value, p))
        .sum()
}

/// Primal objective over `[w_1..w_n, bias]`
pub(crate) struct PrimalObjective<'a> {
    pub points: &'a [Datapoint],
    pub coefficients: Vec<f64>,
    pub loss: &'a dyn LossFunction,
    pub data_scale: f64,
    pub lambda2: f64,
    pub epsilon: Option<&'a [f64]>,
    pub num_features: usize,
}

impl PrimalObjective<'_> {
    fn penalty_factor(&self, j: usize) -> f64 {
        self.epsilon.map_or(1.0, |eps| eps[j])
    }
}

impl DiffFunction for PrimalObjective<'_> {
    fn dimension(&self) -> usize {
        self.num_features + 1
    }

    fn penalized_dimension(&self) -> usize {
        self.num_features
    }

    fn evaluate(&self, w: &[f64]) -> (f64, Vec<f64>) {
        let mut value = 0.0;
        let mut gradient = vec![0.0; w.len()];

        for (point, c) in self.points.iter().zip(&self.coefficients) {
            let score = linear_score(w, point);
            value += c * self.loss.loss(score, point.value, point);
            let slope = self.data_scale * c * self.loss.derivative(score, point.value, point);
            for (g, x) in gradient.iter_mut().zip(point.augmented()) {
                *g += slope * x;
            }
        }
        value *= self.data_scale;

        for j in 0..self.num_features {
            let factor = self.penalty_factor(j);
            value += self.lambda2 * factor * w[j] * w[j];
            gradient[j] += 2.0 * self.lambda2 * factor * w[j];
        }

        (value, gradient)
    }
}

/// Gradient used by the dual iterative solvers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DualGradient {
    /// True gradient of the dual objective, for quasi-Newton
    Exact,
    /// Gradient premultiplied by `K⁻¹ / (2 lambda2)`, for Rprop
    Preconditioned,
}

/// Dual objective over `[alpha_1..alpha_n, offset]`
pub(crate) struct DualObjective<'a> {
    pub gram: &'a GramMatrix,
    pub points: &'a [Datapoint],
    pub coefficients: Vec<f64>,
    pub loss: &'a dyn LossFunction,
    pub data_scale: f64,
    pub lambda2: f64,
    pub gradient: DualGradient,
}

impl DiffFunction for DualObjective<'_> {
    fn dimension(&self) -> usize {
        self.points.len() + 1
    }

    fn penalized_dimension(&self) -> usize {
        self.points.len()
    }

    fn evaluate(&self, x: &[f64]) -> (f64, Vec<f64>) {
        let n = self.points.len();
        let (alpha, offset) = (&x[..n], x[n]);
        let k_alpha = self.gram.multiply(alpha);

        let mut value = 0.0;
        let mut residual = vec![0.0; n];
        for i in 0..n {
            let point = &self.points[i];
            let score = k_alpha[i] + offset;
            let c = self.coefficients[i];
            value += c * self.loss.loss(score, point.value, point);
            residual[i] = self.data_scale * c * self.loss.derivative(score, point.value, point);
        }
        value = self.data_scale * value + self.lambda2 * dot_unchecked(alpha, &k_alpha);

        let offset_gradient: f64 = residual.iter().sum();
        let gradient = match self.gradient {
            DualGradient::Exact => {
                let mut g = self.gram.multiply(&residual);
                for (gi, ka) in g.iter_mut().zip(&k_alpha) {
                    *gi += 2.0 * self.lambda2 * ka;
                }
                g.push(offset_gradient);
                g
            }
            DualGradient::Preconditioned => {
                let scale = 1.0 / (2.0 * self.lambda2);
                let mut g: Vec<f64> = alpha
                    .iter()
                    .zip(&residual)
                    .map(|(a, r)| a + scale * r)
                    .collect();
                g.push(scale * offset_gradient);
                g
            }
        };
        (value, gradient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::LinearKernel;
    use crate::loss::{LogisticRegression, SquaredError};
    use approx::assert_relative_eq;

    fn points() -> Vec<Datapoint> {
        vec![
            Datapoint::labeled(vec![1.0, 2.0], 1).with_weight(2.0),
            Datapoint::labeled(vec![-1.0, 0.5], -1),
            Datapoint::labeled(vec![0.5, -1.0], -1),
            Datapoint::valued(vec![0.0, 1.0], 0.5),
        ]
    }

    #[test]
    fn test_uniform_coefficients() {
        let c = point_coefficients(&points(), Weighting::Uniform, true).unwrap();
        assert_eq!(c, vec![0.5, 0.25, 0.25, 0.25]);
        let c = point_coefficients(&points(), Weighting::Uniform, false).unwrap();
        assert_eq!(c, vec![0.25; 4]);
    }

    #[test]
    fn test_group_averaged_coefficients() {
        let c = point_coefficients(&points(), Weighting::GroupAveraged { w_plus: 0.6 }, false)
            .unwrap();
        // the unlabeled point joins the negative sum, which is divided by |group -1| = 2
        assert_relative_eq!(c[0], 0.6);
        assert_relative_eq!(c[1], 0.2);
        assert_relative_eq!(c[3], 0.2);
    }

    #[test]
    fn test_group_averaging_needs_both_groups() {
        let only_positive = vec![Datapoint::labeled(vec![1.0], 1)];
        assert!(point_coefficients(
            &only_positive,
            Weighting::GroupAveraged { w_plus: 0.5 },
            false
        )
        .is_ok());
        let mixed = vec![
            Datapoint::labeled(vec![1.0], 1),
            Datapoint::labeled(vec![1.0], 2),
        ];
        assert!(point_coefficients(&mixed, Weighting::GroupAveraged { w_plus: 0.5 }, false)
            .is_err());
        assert!(matches!(
            point_coefficients(&[], Weighting::Uniform, false),
            Err(RermError::EmptyDataset)
        ));
    }

    fn finite_difference_check<F: DiffFunction>(f: &F, x: &[f64]) {
        let (_, gradient) = f.evaluate(x);
        let h = 1e-6;
        for i in 0..x.len() {
            let mut plus = x.to_vec();
            let mut minus = x.to_vec();
            plus[i] += h;
            minus[i] -= h;
            let numeric = (f.evaluate(&plus).0 - f.evaluate(&minus).0) / (2.0 * h);
            assert!(
                (gradient[i] - numeric).abs() < 1e-5 * (1.0 + numeric.abs()),
                "coordinate {i}: analytic {} numeric {numeric}",
                gradient[i]
            );
        }
    }

    #[test]
    fn test_primal_gradient_matches_finite_differences() {
        let pts = points();
        let eps = [0.5, 2.0];
        let objective = PrimalObjective {
            points: &pts,
            coefficients: point_coefficients(&pts, Weighting::Uniform, true).unwrap(),
            loss: &LogisticRegression,
            data_scale: 0.8,
            lambda2: 0.15,
            epsilon: Some(&eps),
            num_features: 2,
        };
        finite_difference_check(&objective, &[0.3, -0.7, 0.2]);
    }

    #[test]
    fn test_dual_exact_gradient_matches_finite_differences() {
        let pts = points();
        let vectors: Vec<Vec<f64>> = pts.iter().map(|p| p.features().to_vec()).collect();
        let gram = GramMatrix::compute(&LinearKernel::new(), &vectors);
        let objective = DualObjective {
            gram: &gram,
            points: &pts,
            coefficients: point_coefficients(&pts, Weighting::Uniform, false).unwrap(),
            loss: &SquaredError,
            data_scale: 0.9,
            lambda2: 0.1,
            gradient: DualGradient::Exact,
        };
        finite_difference_check(&objective, &[0.1, -0.2, 0.05, 0.3, 0.4]);
    }

    #[test]
    fn test_dual_preconditioned_gradient_vanishes_at_exact_stationary_point() {
        let pts = points();
        let vectors: Vec<Vec<f64>> = pts.iter().map(|p| p.features().to_vec()).collect();
        let gram = GramMatrix::compute(&LinearKernel::new(), &vectors);
        let make = |gradient| DualObjective {
            gram: &gram,
            points: &pts,
            coefficients: vec![0.25; 4],
            loss: &SquaredError,
            data_scale: 0.9,
            lambda2: 0.1,
            gradient,
        };
        let x = [0.1, -0.2, 0.05, 0.3, 0.4];
        let (v1, exact) = make(DualGradient::Exact).evaluate(&x);
        let (v2, pre) = make(DualGradient::Preconditioned).evaluate(&x);
        assert_relative_eq!(v1, v2);
        // exact = 2 lambda2 K pre on the alpha block
        let k_pre = gram.multiply(&pre[..4]);
        for i in 0..4 {
            assert_relative_eq!(exact[i], 0.2 * k_pre[i], epsilon = 1e-12);
        }
        assert_relative_eq!(exact[4], 0.2 * pre[4], epsilon = 1e-12);
    }
}
