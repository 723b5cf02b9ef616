//! Margin-based classification losses
//!
//! All of them read the point's group sign (see [`Datapoint::margin_sign`]).

use crate::core::Datapoint;
use crate::loss::{LossFunction, LossKind};

/// `max(z, 0) + ln(1 + e^-|z|)`, finite for any z
fn softplus(z: f64) -> f64 {
    z.max(0.0) + (-z.abs()).exp().ln_1p()
}

/// Logistic function evaluated without overflow
fn logistic(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// 0/1 misclassification indicator around a threshold.
///
/// Its derivative is zero almost everywhere, so it is meant for error
/// estimation rather than training.
#[derive(Debug, Clone, Copy, Default)]
pub struct HardStep {
    pub threshold: f64,
}

impl HardStep {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl LossFunction for HardStep {
    fn loss(&self, prediction: f64, _target: f64, point: &Datapoint) -> f64 {
        if point.margin_sign() * (prediction - self.threshold) > 0.0 {
            0.0
        } else {
            1.0
        }
    }

    fn derivative(&self, _prediction: f64, _target: f64, _point: &Datapoint) -> f64 {
        0.0
    }

    fn kind(&self) -> LossKind {
        LossKind::HardStep {
            threshold: self.threshold,
        }
    }
}

/// Binomial negative log-likelihood with a unit margin:
/// `ln(1 + exp(g * (m - x - g)))`
#[derive(Debug, Clone, Copy, Default)]
pub struct Bnll;

impl LossFunction for Bnll {
    fn loss(&self, prediction: f64, target: f64, point: &Datapoint) -> f64 {
        let g = point.margin_sign();
        softplus(g * (target - prediction - g))
    }

    fn derivative(&self, prediction: f64, target: f64, point: &Datapoint) -> f64 {
        let g = point.margin_sign();
        -g * logistic(g * (target - prediction - g))
    }

    fn kind(&self) -> LossKind {
        LossKind::Bnll
    }
}

/// `ln(1 + exp(-g * f))`
#[derive(Debug, Clone, Copy, Default)]
pub struct LogisticRegression;

impl LossFunction for LogisticRegression {
    fn loss(&self, prediction: f64, _target: f64, point: &Datapoint) -> f64 {
        softplus(-point.margin_sign() * prediction)
    }

    fn derivative(&self, prediction: f64, _target: f64, point: &Datapoint) -> f64 {
        let g = point.margin_sign();
        -g * logistic(-g * prediction)
    }

    fn kind(&self) -> LossKind {
        LossKind::LogisticRegression
    }
}

/// Smoothed step: `1 / (1 + exp(g * sigma * (x - m + g)))`
#[derive(Debug, Clone, Copy)]
pub struct Sigmoidal {
    sigma: f64,
}

impl Sigmoidal {
    /// # Panics
    /// Panics if sigma is not positive
    pub fn new(sigma: f64) -> Self {
        assert!(sigma > 0.0, "Sigma must be positive, got: {}", sigma);
        Self { sigma }
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }
}

impl Default for Sigmoidal {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl LossFunction for Sigmoidal {
    fn loss(&self, prediction: f64, target: f64, point: &Datapoint) -> f64 {
        let g = point.margin_sign();
        logistic(-g * self.sigma * (prediction - target + g))
    }

    fn derivative(&self, prediction: f64, target: f64, point: &Datapoint) -> f64 {
        let g = point.margin_sign();
        let u = g * self.sigma * (prediction - target + g);
        -g * self.sigma * logistic(u) * logistic(-u)
    }

    fn kind(&self) -> LossKind {
        LossKind::Sigmoidal { sigma: self.sigma }
    }
}

/// Linear below `g*m - 1`, quadratic up to `g*m`, zero beyond
#[derive(Debug, Clone, Copy, Default)]
pub struct SmoothHinge;

impl LossFunction for SmoothHinge {
    fn loss(&self, prediction: f64, target: f64, point: &Datapoint) -> f64 {
        let g = point.margin_sign();
        let margin = g * prediction;
        if margin <= g * target - 1.0 {
            0.5 - margin
        } else if margin < g * target {
            0.5 * (target - prediction).powi(2)
        } else {
            0.0
        }
    }

    fn derivative(&self, prediction: f64, target: f64, point: &Datapoint) -> f64 {
        let g = point.margin_sign();
        let margin = g * prediction;
        if margin <= g * target - 1.0 {
            -g
        } else if margin < g * target {
            prediction - target
        } else {
            0.0
        }
    }

    fn kind(&self) -> LossKind {
        LossKind::SmoothHinge
    }
}

/// Squared error counted only on the wrong side of the target
#[derive(Debug, Clone, Copy, Default)]
pub struct SidedQuadratic;

impl LossFunction for SidedQuadratic {
    fn loss(&self, prediction: f64, target: f64, point: &Datapoint) -> f64 {
        let g = point.margin_sign();
        if g * prediction < g * target {
            (prediction - target).powi(2)
        } else {
            0.0
        }
    }

    fn derivative(&self, prediction: f64, target: f64, point: &Datapoint) -> f64 {
        let g = point.margin_sign();
        if g * prediction < g * target {
            2.0 * (prediction - target)
        } else {
            0.0
        }
    }

    fn kind(&self) -> LossKind {
        LossKind::SidedQuadratic
    }
}

/// Lorentzian loss counted only on the wrong side of the target
#[derive(Debug, Clone, Copy, Default)]
pub struct SidedLorentzian;

impl LossFunction for SidedLorentzian {
    fn loss(&self, prediction: f64, target: f64, point: &Datapoint) -> f64 {
        let g = point.margin_sign();
        if g * prediction < g * target {
            (prediction - target).powi(2).ln_1p()
        } else {
            0.0
        }
    }

    fn derivative(&self, prediction: f64, target: f64, point: &Datapoint) -> f64 {
        let g = point.margin_sign();
        if g * prediction < g * target {
            let r = prediction - target;
            2.0 * r / (r * r + 1.0)
        } else {
            0.0
        }
    }

    fn kind(&self) -> LossKind {
        LossKind::SidedLorentzian
    }
}
