//! Losses on the raw residual

use crate::core::Datapoint;
use crate::loss::{LossFunction, LossKind};

/// `(x - m)²`
#[derive(Debug, Clone, Copy, Default)]
pub struct SquaredError;

impl LossFunction for SquaredError {
    fn loss(&self, prediction: f64, target: f64, _point: &Datapoint) -> f64 {
        (prediction - target).powi(2)
    }

    fn derivative(&self, prediction: f64, target: f64, _point: &Datapoint) -> f64 {
        2.0 * (prediction - target)
    }

    fn kind(&self) -> LossKind {
        LossKind::SquaredError
    }
}

/// `ln((x - m)² + 1)`, a residual loss that grows slowly for outliers
#[derive(Debug, Clone, Copy, Default)]
pub struct Lorentzian;

impl LossFunction for Lorentzian {
    fn loss(&self, prediction: f64, target: f64, _point: &Datapoint) -> f64 {
        (prediction - target).powi(2).ln_1p()
    }

    fn derivative(&self, prediction: f64, target: f64, _point: &Datapoint) -> f64 {
        let r = prediction - target;
        2.0 * r / (r * r + 1.0)
    }

    fn kind(&self) -> LossKind {
        LossKind::Lorentzian
    }
}

/// Cross-entropy of a probability prediction against a 0/1 target.
///
/// Predictions are clipped to `[eps, 1 - eps]`; outside that range the loss is
/// flat, so the derivative is zero there.
#[derive(Debug, Clone, Copy)]
pub struct LogLoss {
    eps: f64,
}

impl LogLoss {
    /// # Panics
    /// Panics unless `0 < eps < 0.5`
    pub fn new(eps: f64) -> Self {
        assert!(eps > 0.0 && eps < 0.5, "Eps must lie in (0, 0.5), got: {}", eps);
        Self { eps }
    }

    pub fn eps(&self) -> f64 {
        self.eps
    }
}

impl Default for LogLoss {
    fn default() -> Self {
        Self::new(1e-5)
    }
}

impl LossFunction for LogLoss {
    fn loss(&self, prediction: f64, target: f64, _point: &Datapoint) -> f64 {
        let f = prediction.clamp(self.eps, 1.0 - self.eps);
        -(target * f.ln() + (1.0 - target) * (1.0 - f).ln())
    }

    fn derivative(&self, prediction: f64, target: f64, _point: &Datapoint) -> f64 {
        if prediction < self.eps || prediction > 1.0 - self.eps {
            return 0.0;
        }
        -target / prediction + (1.0 - target) / (1.0 - prediction)
    }

    fn kind(&self) -> LossKind {
        LossKind::LogLoss { eps: self.eps }
    }
}
